//! DATA, BDAT and message completion.

use bytes::Bytes;
use chrono::Utc;
use postwire_smtp::{Command, EnhancedStatusCode, ReplyCode, Response, Verb};

use super::{CommandResult, Connection};
use crate::error::CommandError;
use crate::flags::SessionFlags;
use crate::handler::{Handler, Mail, TransferMethod};
use crate::session::BodyType;

impl<H: Handler> Connection<H> {
    pub(super) fn data(&mut self, command: &Command) -> CommandResult {
        super::no_args(command)?;

        let flags = self.session.flags;
        if !flags.is_introduced() || !flags.has_from() || !flags.has_to() {
            return Err(CommandError::BadSequence("need RCPT before DATA".into()));
        }
        if flags.is_binary_transfer() || flags.is_data_transfered() {
            return Err(CommandError::BadSequence("BDAT transfer in progress".into()));
        }
        if self.session.body == BodyType::BinaryMime {
            return Err(CommandError::BadSequence(
                "DATA is not allowed with BODY=BINARYMIME".into(),
            ));
        }

        self.session.flags.insert(SessionFlags::REGULAR_TRANSFER);
        self.framer.enter_data();
        self.reply(Response::new(
            ReplyCode::START_DATA,
            "End data with <CR><LF>.<CR><LF>",
        ));
        Ok(())
    }

    pub(super) fn complete_data(&mut self, block: Bytes) -> CommandResult {
        self.deliver(block, TransferMethod::Data, "Message accepted for delivery".into())
    }

    pub(super) fn bdat(&mut self, command: &Command) -> CommandResult {
        // Without CHUNKING the chunk that follows is read as command lines.
        if !self.config.chunking {
            return Err(CommandError::Disabled(Verb::Bdat));
        }

        let (size, last) = match command.args() {
            [size] => (size, false),
            [size, last] if last.eq_ignore_ascii_case("LAST") => (size, true),
            _ => {
                return Err(CommandError::InvalidArguments(
                    "expected BDAT <size> [LAST]".into(),
                ));
            }
        };
        let size: usize = size
            .parse()
            .map_err(|_| CommandError::InvalidArguments(format!("invalid chunk size {size}")))?;

        // Refused chunks are buffered before being discarded, so the limit
        // applies to them too.
        let total = u64::try_from(self.session.data.len().saturating_add(size)).unwrap_or(u64::MAX);
        if let Some(max) = self.config.max_message_size
            && total > max
        {
            tracing::warn!(total, max, "BDAT exceeds maximum message size, closing connection");
            self.reply(Response::enhanced(
                ReplyCode::EXCEEDED_STORAGE,
                EnhancedStatusCode::PERMANENT + EnhancedStatusCode::MESSAGE_TOO_BIG,
                "Message size exceeds fixed maximum message size",
            ));
            self.close();
            return Ok(());
        }

        let flags = self.session.flags;
        let refusal = if !flags.is_introduced() || !flags.has_from() || !flags.has_to() {
            Some("need RCPT before BDAT")
        } else if flags.is_regular_transfer() || flags.is_data_transfered() {
            Some("DATA transfer in progress")
        } else {
            None
        };
        if let Some(reason) = refusal {
            // The client sends the chunk regardless; swallow it.
            self.discard_chunk = true;
            self.framer.enter_binary(size);
            return Err(CommandError::BadSequence(reason.into()));
        }

        self.session.flags.insert(SessionFlags::BINARY_TRANSFER);
        if last {
            self.session.flags.insert(SessionFlags::BINARY_LAST);
        }
        self.framer.enter_binary(size);
        Ok(())
    }

    pub(super) fn complete_chunk(&mut self, chunk: Bytes) -> CommandResult {
        if std::mem::take(&mut self.discard_chunk) {
            return Ok(());
        }

        let received = chunk.len();
        tracing::trace!(received, total = self.session.data.len() + received, "BDAT chunk");
        self.session.data.extend_from_slice(&chunk);

        if self.session.flags.is_binary_last() {
            let content = self.session.data.split().freeze();
            return self.deliver(
                content,
                TransferMethod::Bdat,
                format!("{received} octets received, message accepted"),
            );
        }

        self.ok(
            EnhancedStatusCode::UNDEFINED,
            format!("{received} octets received"),
        );
        Ok(())
    }

    /// Hands the message to the mail hook exactly once, resets the
    /// transaction and acknowledges.
    fn deliver(&mut self, content: Bytes, transfer: TransferMethod, message: String) -> CommandResult {
        self.session.flags.insert(SessionFlags::DATA_TRANSFERED);

        let session = &self.session;
        let mail = Mail {
            content,
            from: session.from.clone(),
            to: session.to.clone(),
            domain: session.domain.clone().unwrap_or_default(),
            connection: *session.connection(),
            user: session.user.clone(),
            transfer,
            body: session.body,
            smtputf8: session.smtputf8,
            received_at: Utc::now(),
        };
        let size = mail.content.len();
        let recipients = mail.to.len();

        let result = self.handler.handle_mail(&self.session, mail);
        self.session.soft_reset();
        result?;

        tracing::info!(
            peer = %self.session.connection().peer,
            size,
            recipients,
            ?transfer,
            "message accepted"
        );
        self.ok(EnhancedStatusCode::UNDEFINED, message);
        Ok(())
    }
}
