//! MAIL and RCPT.

use postwire_smtp::{Address, Command, EnhancedStatusCode, Parameter, PathArgs, ReplyCode};

use super::{CommandResult, Connection, reply};
use crate::error::CommandError;
use crate::flags::SessionFlags;
use crate::handler::Handler;
use crate::session::BodyType;

fn unsupported(param: &Parameter) -> CommandError {
    reply(
        ReplyCode::PARAMETERS_NOT_RECOGNIZED,
        EnhancedStatusCode::PERMANENT + EnhancedStatusCode::INVALID_ARGUMENTS,
        &format!("{} parameter not supported", param.keyword),
    )
}

impl<H: Handler> Connection<H> {
    pub(super) fn mail(&mut self, command: &Command) -> CommandResult {
        let flags = self.session.flags;
        if !flags.is_introduced() {
            return Err(CommandError::BadSequence("send HELO/EHLO first".into()));
        }
        if flags.has_from() {
            return Err(CommandError::BadSequence("sender already specified".into()));
        }
        if self.config.require_auth && !flags.is_authenticated() {
            return Err(reply(
                ReplyCode::AUTH_REQUIRED,
                EnhancedStatusCode::PERMANENT + EnhancedStatusCode::OTHER_SECURITY,
                "Authentication required",
            ));
        }

        let raw = command
            .raw_args()
            .ok_or_else(|| CommandError::InvalidArguments("expected FROM:<address>".into()))?;
        let path = PathArgs::parse(raw, "FROM").map_err(|error| match error {
            postwire_smtp::Error::InvalidAddress(_) => reply(
                ReplyCode::PARAMETER_ERROR,
                EnhancedStatusCode::PERMANENT + EnhancedStatusCode::BAD_SENDER_SYNTAX,
                "Bad sender address syntax",
            ),
            other => CommandError::InvalidArguments(other.to_string()),
        })?;

        let mut declared_size = None;
        let mut body = BodyType::default();
        let mut smtputf8 = false;

        for param in &path.params {
            match (param.keyword.as_str(), param.value.as_deref()) {
                ("SIZE", Some(value)) => {
                    let size: u64 = value.parse().map_err(|_| {
                        CommandError::InvalidArguments(format!("invalid SIZE value {value}"))
                    })?;
                    if let Some(max) = self.config.max_message_size
                        && size > max
                    {
                        return Err(reply(
                            ReplyCode::EXCEEDED_STORAGE,
                            EnhancedStatusCode::PERMANENT + EnhancedStatusCode::MESSAGE_TOO_BIG,
                            "Message size exceeds fixed maximum message size",
                        ));
                    }
                    declared_size = Some(size);
                }
                ("BODY", Some(value)) => {
                    body = match BodyType::parse(value) {
                        Some(BodyType::SevenBit) => BodyType::SevenBit,
                        Some(BodyType::EightBitMime) if self.config.eight_bit_mime => {
                            BodyType::EightBitMime
                        }
                        Some(BodyType::BinaryMime) if self.config.binary_mime_enabled() => {
                            BodyType::BinaryMime
                        }
                        Some(_) => return Err(unsupported(param)),
                        None => {
                            return Err(CommandError::InvalidArguments(format!(
                                "invalid BODY value {value}"
                            )));
                        }
                    };
                }
                ("SMTPUTF8", None) => smtputf8 = true,
                _ => return Err(unsupported(param)),
            }
        }

        self.handler
            .validate_from(&self.session, path.address.as_ref())?;

        tracing::debug!(
            from = path.address.as_ref().map_or("<>", Address::as_str),
            size = declared_size,
            "sender accepted"
        );
        self.session.from = path.address;
        self.session.declared_size = declared_size;
        self.session.body = body;
        self.session.smtputf8 = smtputf8;
        self.session.flags.insert(SessionFlags::FROM);
        self.ok(EnhancedStatusCode::OTHER_ADDRESS, "Sender OK");
        Ok(())
    }

    pub(super) fn rcpt(&mut self, command: &Command) -> CommandResult {
        let flags = self.session.flags;
        if !flags.is_introduced() || !flags.has_from() {
            return Err(CommandError::BadSequence("need MAIL before RCPT".into()));
        }

        let bad_recipient = || {
            reply(
                ReplyCode::PARAMETER_ERROR,
                EnhancedStatusCode::PERMANENT + EnhancedStatusCode::BAD_DESTINATION_SYNTAX,
                "Bad recipient address syntax",
            )
        };

        let raw = command
            .raw_args()
            .ok_or_else(|| CommandError::InvalidArguments("expected TO:<address>".into()))?;
        let path = PathArgs::parse(raw, "TO").map_err(|error| match error {
            postwire_smtp::Error::InvalidAddress(_) => bad_recipient(),
            other => CommandError::InvalidArguments(other.to_string()),
        })?;

        if path.is_relay() {
            tracing::warn!(
                peer = %self.session.connection().peer,
                "relay attempt refused"
            );
            return Err(CommandError::Policy("Relaying denied".into()));
        }
        let Some(address) = path.address.as_ref() else {
            return Err(bad_recipient());
        };
        if let Some(param) = path.params.first() {
            return Err(unsupported(param));
        }
        if let Some(max) = self.config.max_recipients
            && self.session.to.len() >= max
        {
            return Err(reply(
                ReplyCode::INSUFFICIENT_STORAGE,
                EnhancedStatusCode::TRANSIENT + EnhancedStatusCode::TOO_MANY_RECIPIENTS,
                "Too many recipients",
            ));
        }

        let address = self.handler.validate_rcpt(&self.session, address)?;
        if self.session.to.contains(&address) {
            return Err(CommandError::InvalidArguments(format!(
                "<{address}> is already a recipient"
            )));
        }

        tracing::debug!(to = %address, "recipient accepted");
        self.session.to.push(address);
        self.session.flags.insert(SessionFlags::TO);
        self.ok(EnhancedStatusCode::DESTINATION_VALID, "Recipient OK");
        Ok(())
    }
}
