//! Sans-I/O SMTP server connection.
//!
//! A [`Connection`] owns the framer and the [`Session`] of one client. It
//! is a pure state machine, completely separated from I/O operations:
//!
//! - Receives bytes via [`handle_input()`](Connection::handle_input)
//! - Produces bytes to send via [`poll_transmit()`](Connection::poll_transmit)
//! - Reports the end of the session via [`is_closed()`](Connection::is_closed)
//!
//! Frames are processed strictly in arrival order, so pipelined commands
//! are answered one at a time and in order.
//!
//! # Example
//!
//! ```ignore
//! let mut connection = Connection::with_config(config, NoopHandler, info);
//! connection.greeting();
//!
//! loop {
//!     while let Some(transmit) = connection.poll_transmit() {
//!         send_to_client(&transmit.data);
//!     }
//!     if connection.is_closed() {
//!         break;
//!     }
//!     connection.handle_input(&read_from_client())?;
//! }
//! ```

mod auth;
mod envelope;
mod query;
mod transfer;

use std::collections::VecDeque;
use std::sync::Arc;

use postwire_smtp::framer::Mode;
use postwire_smtp::{
    Capability, Command, EnhancedStatusCode, Frame, MultilineWriter, ReplyCode, Response,
    ServerFramer, Transmit, Verb,
};

use crate::config::ServerConfig;
use crate::error::{CommandError, Result, ServerError};
use crate::flags::SessionFlags;
use crate::handler::Handler;
use crate::session::{ConnectionInfo, Session};

type CommandResult = std::result::Result<(), CommandError>;

/// Server side of one SMTP connection.
#[derive(Debug)]
pub struct Connection<H> {
    config: Arc<ServerConfig>,
    capabilities: Arc<[Capability]>,
    handler: H,
    session: Session,
    framer: ServerFramer,
    transmits: VecDeque<Transmit>,
    pending_auth: Option<auth::Pending>,
    /// The next BDAT chunk belongs to a refused command.
    discard_chunk: bool,
    line_id: u32,
    closed: bool,
}

impl<H: Handler> Connection<H> {
    /// Creates a connection sharing configuration and capability list with
    /// the other connections of a server.
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        capabilities: Arc<[Capability]>,
        handler: H,
        info: ConnectionInfo,
    ) -> Self {
        let max_message_size = config
            .max_message_size
            .map(|size| usize::try_from(size).unwrap_or(usize::MAX));
        let framer = ServerFramer::new(config.max_line_length, max_message_size);

        Self {
            config,
            capabilities,
            handler,
            session: Session::new(info),
            framer,
            transmits: VecDeque::new(),
            pending_auth: None,
            discard_chunk: false,
            line_id: 0,
            closed: false,
        }
    }

    /// Creates a standalone connection.
    #[must_use]
    pub fn with_config(config: ServerConfig, handler: H, info: ConnectionInfo) -> Self {
        let capabilities = config.capabilities().into();
        Self::new(Arc::new(config), capabilities, handler, info)
    }

    /// Queues the 220 greeting.
    pub fn greeting(&mut self) {
        let text = format!("{} ESMTP {}", self.config.hostname, self.config.banner);
        self.reply(Response::new(ReplyCode::SERVICE_READY, text));
    }

    /// Processes bytes received from the client.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Hook`] when a hook fails internally. A 421 is
    /// queued and the connection is closed before returning.
    pub fn handle_input(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.framer.write(data);

        while !self.closed {
            let frame = match self.framer.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(error) => {
                    self.handle_framing_error(error);
                    continue;
                }
            };
            self.handle_frame(frame)?;
        }

        Ok(())
    }

    /// Returns the next bytes to send, if any.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.transmits.pop_front()
    }

    /// Returns true once the connection must be closed (after flushing).
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Handles expiry of the I/O timeout: queues a 421 and closes.
    pub fn handle_timeout(&mut self) {
        let text = format!(
            "{} Timeout exceeded, closing transmission channel",
            self.config.hostname
        );
        self.reply(Response::enhanced(
            ReplyCode::SERVICE_UNAVAILABLE,
            EnhancedStatusCode::new(4, 4, 2),
            text,
        ));
        self.close();
    }

    /// Returns the session state.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the hook handler.
    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Returns the hook handler mutably.
    pub const fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consumes the connection, returning the hook handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    fn handle_frame(&mut self, frame: Frame) -> Result<()> {
        let result = match frame {
            Frame::Command(line) => match Command::decode(&line) {
                Ok(command) => self.execute(&command),
                Err(error) => {
                    self.invalid_command(error.into());
                    Ok(())
                }
            },
            Frame::Data(block) => self.complete_data(block),
            Frame::Binary(chunk) => self.complete_chunk(chunk),
            Frame::Line { text, id } => self.auth_response(&text, id),
        };

        self.finish(result)
    }

    fn execute(&mut self, command: &Command) -> CommandResult {
        tracing::debug!(
            peer = %self.session.connection().peer,
            verb = %command.verb(),
            "command"
        );

        match command.verb() {
            Verb::Helo | Verb::Ehlo => self.helo(command),
            Verb::Mail => self.mail(command),
            Verb::Rcpt => self.rcpt(command),
            Verb::Data => self.data(command),
            Verb::Bdat => self.bdat(command),
            Verb::Rset => self.rset(command),
            Verb::Noop => self.noop(command),
            Verb::Vrfy => self.vrfy(command),
            Verb::Expn => self.expn(command),
            Verb::Help => self.help(command),
            Verb::Auth => self.auth(command),
            Verb::Quit => self.quit(command),
            verb => Err(CommandError::Disabled(verb)),
        }
    }

    /// Turns a refused command into its reply; internal hook failures end
    /// the connection.
    fn finish(&mut self, result: CommandResult) -> Result<()> {
        let Err(error) = result else {
            return Ok(());
        };

        let response = error.to_response();
        self.reply(response);

        if let CommandError::Internal(source) = error {
            tracing::error!(error = %source, "hook failed, closing connection");
            self.close();
            return Err(ServerError::Hook(source));
        }
        Ok(())
    }

    fn handle_framing_error(&mut self, error: postwire_smtp::Error) {
        match error {
            postwire_smtp::Error::MaxSizeExceeded(max) => {
                tracing::warn!(max, "message too big, closing connection");
                self.reply(Response::enhanced(
                    ReplyCode::EXCEEDED_STORAGE,
                    EnhancedStatusCode::PERMANENT + EnhancedStatusCode::MESSAGE_TOO_BIG,
                    "Message size exceeds fixed maximum message size",
                ));
                self.close();
            }
            error if matches!(self.framer.mode(), Mode::Line(_)) => {
                self.pending_auth = None;
                self.framer.enter_command();
                self.reply(CommandError::InvalidArguments(error.to_string()).to_response());
            }
            error => self.invalid_command(error.into()),
        }
    }

    fn invalid_command(&mut self, error: CommandError) {
        self.session.invalid_commands += 1;

        if self.session.invalid_commands > self.config.max_invalid_commands {
            tracing::warn!(
                peer = %self.session.connection().peer,
                count = self.session.invalid_commands,
                "too many invalid commands, closing connection"
            );
            self.reply(Response::enhanced(
                ReplyCode::SERVICE_UNAVAILABLE,
                EnhancedStatusCode::TRANSIENT + EnhancedStatusCode::OTHER_SECURITY,
                "Too many invalid commands, closing transmission channel",
            ));
            self.close();
            return;
        }

        self.reply(error.to_response());
    }

    fn helo(&mut self, command: &Command) -> CommandResult {
        let verb = command.verb();
        let [domain] = command.args() else {
            self.reply(
                CommandError::InvalidArguments(format!("{verb} requires exactly one domain"))
                    .to_response(),
            );
            self.close();
            return Ok(());
        };
        let domain = domain.clone();

        self.session.hard_reset();
        self.session.flags.insert(SessionFlags::INTRODUCED);
        self.session.domain = Some(domain.clone());
        tracing::debug!(%domain, %verb, "client introduced");

        let greeting = format!("{} Hello {domain}", self.config.hostname);
        if verb == Verb::Helo {
            self.reply(Response::new(ReplyCode::OK, greeting));
            return Ok(());
        }

        let lines = std::iter::once(greeting).chain(self.capabilities.iter().map(Capability::encode));
        let mut data = Vec::new();
        MultilineWriter::new(ReplyCode::OK, None).write(lines, &mut data);
        self.transmits.push_back(Transmit::new(data));
        Ok(())
    }

    fn rset(&mut self, command: &Command) -> CommandResult {
        no_args(command)?;
        self.session.soft_reset();
        self.ok(EnhancedStatusCode::UNDEFINED, "Flushed");
        Ok(())
    }

    fn noop(&mut self, command: &Command) -> CommandResult {
        no_args(command)?;
        self.ok(EnhancedStatusCode::UNDEFINED, "OK");
        Ok(())
    }

    fn quit(&mut self, command: &Command) -> CommandResult {
        no_args(command)?;
        let text = format!("{} Service closing transmission channel", self.config.hostname);
        self.reply(Response::enhanced(
            ReplyCode::CLOSING,
            EnhancedStatusCode::SUCCESS,
            text,
        ));
        self.close();
        Ok(())
    }

    fn ok(&mut self, subject: EnhancedStatusCode, message: impl Into<String>) {
        self.reply(Response::enhanced(
            ReplyCode::OK,
            EnhancedStatusCode::SUCCESS + subject,
            message,
        ));
    }

    fn reply(&mut self, response: Response) {
        tracing::trace!(code = response.code.as_u16(), "reply");
        self.transmits.push_back(Transmit::from(&response));
    }

    const fn close(&mut self) {
        self.closed = true;
    }
}

fn no_args(command: &Command) -> CommandResult {
    if command.has_no_args() {
        Ok(())
    } else {
        Err(CommandError::InvalidArguments(format!(
            "{} takes no arguments",
            command.verb()
        )))
    }
}

fn reply(code: ReplyCode, enhanced: EnhancedStatusCode, message: &str) -> CommandError {
    CommandError::Reply(Response::enhanced(code, enhanced, message))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::handler::NoopHandler;

    fn connection(config: ServerConfig) -> Connection<NoopHandler> {
        Connection::with_config(
            config,
            NoopHandler,
            ConnectionInfo::new(
                "192.0.2.1:40000".parse().unwrap(),
                "192.0.2.2:25".parse().unwrap(),
            ),
        )
    }

    fn output(connection: &mut Connection<NoopHandler>) -> String {
        let mut out = String::new();
        while let Some(transmit) = connection.poll_transmit() {
            out.push_str(transmit.as_str().unwrap());
        }
        out
    }

    #[test]
    fn test_greeting() {
        let mut connection = connection(ServerConfig::new("mx.example.com"));
        connection.greeting();
        assert_eq!(output(&mut connection), "220 mx.example.com ESMTP Service ready\r\n");
    }

    #[test]
    fn test_ehlo_lists_capabilities() {
        let config = ServerConfig::builder("mx.example.com")
            .max_message_size(Some(1000))
            .chunking(false)
            .help(false)
            .build();
        let mut connection = connection(config);
        connection.handle_input(b"EHLO client.example.com\r\n").unwrap();

        assert_eq!(
            output(&mut connection),
            "250-mx.example.com Hello client.example.com\r\n\
             250-ENHANCEDSTATUSCODES\r\n\
             250-SMTPUTF8\r\n\
             250-PIPELINING\r\n\
             250-SIZE 1000\r\n\
             250 8BITMIME\r\n"
        );
        assert!(connection.session().flags().is_introduced());
        assert_eq!(connection.session().domain(), Some("client.example.com"));
    }

    #[test]
    fn test_helo_without_domain_closes() {
        let mut connection = connection(ServerConfig::default());
        connection.handle_input(b"HELO\r\nNOOP\r\n").unwrap();

        assert!(output(&mut connection).starts_with("501 5.5.4"));
        assert!(connection.is_closed());
    }

    #[test]
    fn test_disabled_verbs() {
        let mut connection = connection(ServerConfig::default());
        connection.handle_input(b"STARTTLS\r\nTURN\r\nVRFY x\r\n").unwrap();

        let out = output(&mut connection);
        assert_eq!(out.matches("502 5.5.1").count(), 3, "{out}");
    }

    #[test]
    fn test_invalid_command_limit() {
        let config = ServerConfig::builder("mx").max_invalid_commands(2).build();
        let mut connection = connection(config);
        connection.handle_input(b"FOO\r\nBAR\r\nBAZ\r\nNOOP\r\n").unwrap();

        let out = output(&mut connection);
        assert_eq!(
            out,
            "500 5.5.1 Syntax error, command unrecognized\r\n\
             500 5.5.1 Syntax error, command unrecognized\r\n\
             421 4.7.0 Too many invalid commands, closing transmission channel\r\n"
        );
        assert!(connection.is_closed());
    }

    #[test]
    fn test_no_args_commands() {
        let mut connection = connection(ServerConfig::default());
        connection.handle_input(b"NOOP\r\nRSET now\r\nQUIT\r\n").unwrap();

        let out = output(&mut connection);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "250 2.0.0 OK");
        assert!(lines[1].starts_with("501 5.5.4"));
        assert_eq!(lines[2], "221 2.0.0 localhost Service closing transmission channel");
        assert!(connection.is_closed());
    }

    #[test]
    fn test_input_after_close_is_ignored() {
        let mut connection = connection(ServerConfig::default());
        connection.handle_input(b"QUIT\r\n").unwrap();
        let _ = output(&mut connection);

        connection.handle_input(b"NOOP\r\n").unwrap();
        assert!(connection.poll_transmit().is_none());
    }

    #[test]
    fn test_timeout() {
        let mut connection = connection(ServerConfig::new("mx"));
        connection.handle_timeout();
        assert_eq!(
            output(&mut connection),
            "421 4.4.2 mx Timeout exceeded, closing transmission channel\r\n"
        );
        assert!(connection.is_closed());
    }
}
