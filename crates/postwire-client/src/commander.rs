//! Sans-I/O SMTP client transaction state machine.
//!
//! The [`Commander`] owns a queue of [`Assignment`]s and walks each one
//! through `RSET`, `MAIL FROM`, `RCPT TO`, `DATA` and the content, one
//! round trip at a time. With nothing queued it keeps the connection
//! alive with `NOOP`s.
//!
//! - Receives bytes via [`handle_input()`](Commander::handle_input)
//! - Produces bytes to send via [`poll_transmit()`](Commander::poll_transmit)
//! - Reports the keep-alive deadline via [`poll_timeout()`](Commander::poll_timeout)
//! - Handles it via [`handle_timeout()`](Commander::handle_timeout)
//!
//! # Example
//!
//! ```ignore
//! let mut commander = Commander::new(ClientConfig::new("relay.example.com"));
//! commander.enqueue(assignment);
//!
//! loop {
//!     while let Some(transmit) = commander.poll_transmit() {
//!         send_to_server(&transmit.data);
//!     }
//!     commander.handle_input(&read_from_server())?;
//! }
//! ```

use std::collections::VecDeque;

use postwire_smtp::{
    Address, Capability, ClientFramer, Command, ReplyCode, Response, ServerOpts, Transmit, Verb,
    dot_stuff,
};
use tokio::time::Instant;

use crate::assignment::{Assignment, Outcome};
use crate::config::ClientConfig;
use crate::error::{Error, Result, Stage, TransactionError};

/// Protocol flavour announced in the greeting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain SMTP: HELO and no extensions.
    #[default]
    Smtp,
    /// ESMTP: EHLO and capability negotiation.
    Esmtp,
}

impl Protocol {
    /// Detects the flavour from the greeting text.
    fn detect(greeting: &Response) -> Self {
        let esmtp = greeting
            .message
            .iter()
            .flat_map(|line| line.split_whitespace())
            .any(|token| token.eq_ignore_ascii_case("ESMTP"));
        if esmtp { Self::Esmtp } else { Self::Smtp }
    }
}

/// Client side of one SMTP connection.
#[derive(Debug)]
pub struct Commander {
    config: ClientConfig,
    framer: ClientFramer,
    transmits: VecDeque<Transmit>,
    queue: VecDeque<Assignment>,
    stage: Stage,
    protocol: Protocol,
    server_opts: ServerOpts,
    keep_alive_at: Option<Instant>,
    /// Index of the recipient whose RCPT TO is outstanding.
    recipient: usize,
    shutting_down: bool,
}

impl Commander {
    /// Creates a commander waiting for the server greeting.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let framer = ClientFramer::new(config.max_line_length);
        Self {
            config,
            framer,
            transmits: VecDeque::new(),
            queue: VecDeque::new(),
            stage: Stage::Greeting,
            protocol: Protocol::default(),
            server_opts: ServerOpts::default(),
            keep_alive_at: None,
            recipient: 0,
            shutting_down: false,
        }
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Flavour negotiated with the server.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// What the server advertised in its EHLO reply.
    #[must_use]
    pub const fn server_opts(&self) -> &ServerOpts {
        &self.server_opts
    }

    /// Number of assignments not yet acknowledged, including the one in flight.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Returns true once the session is over.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.stage == Stage::Closed
    }

    /// Returns the next bytes to send, if any.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.transmits.pop_front()
    }

    /// Returns when the next keep-alive NOOP is due, while idle.
    #[must_use]
    pub const fn poll_timeout(&self) -> Option<Instant> {
        self.keep_alive_at
    }

    /// Sends a NOOP if the keep-alive deadline has passed.
    pub fn handle_timeout(&mut self, now: Instant) {
        if self.stage != Stage::Idle || self.keep_alive_at.is_none_or(|at| now < at) {
            return;
        }
        tracing::trace!("keep-alive");
        self.keep_alive_at = None;
        self.send(&Command::bare(Verb::Noop), Stage::Noop);
    }

    /// Queues an assignment, starting it right away when idle.
    pub fn enqueue(&mut self, assignment: Assignment) {
        self.queue.push_back(assignment);
        if self.stage == Stage::Idle {
            self.dispatch();
        }
    }

    /// Requests a graceful end: QUIT once the queue has drained.
    pub fn shutdown(&mut self) {
        self.shutting_down = true;
        if self.stage == Stage::Idle {
            self.dispatch();
        }
    }

    /// Removes every unacknowledged assignment, including the one in flight.
    pub fn take_pending(&mut self) -> Vec<Assignment> {
        self.queue.drain(..).collect()
    }

    /// Processes bytes received from the server.
    ///
    /// # Errors
    ///
    /// Returns a fatal error; the commander is closed afterwards and the
    /// unacknowledged assignments can be recovered with
    /// [`take_pending()`](Self::take_pending).
    pub fn handle_input(&mut self, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.framer.write(data);

        while !self.is_closed() {
            let response = match self.framer.next_response() {
                Ok(Some(response)) => response,
                Ok(None) => break,
                Err(error) => return Err(self.fail(error.into())),
            };
            tracing::debug!(
                stage = %self.stage,
                code = response.code.as_u16(),
                "reply"
            );
            if let Err(error) = self.handle_response(response) {
                return Err(self.fail(error));
            }
        }

        Ok(())
    }

    fn handle_response(&mut self, response: Response) -> Result<()> {
        if response.code == ReplyCode::SERVICE_UNAVAILABLE && self.stage != Stage::Quit {
            return Err(Error::ServiceClosing(response));
        }

        match self.stage {
            Stage::Greeting => self.greeting(response),
            Stage::Ehlo => self.ehlo(response),
            Stage::Helo => {
                if response.code != ReplyCode::OK {
                    return Err(Error::Negotiation(response));
                }
                self.dispatch();
                Ok(())
            }
            Stage::Idle => Err(Error::UnexpectedReply(response)),
            Stage::Noop => {
                if response.code != ReplyCode::OK {
                    return Err(Error::KeepAlive(response));
                }
                self.dispatch();
                Ok(())
            }
            Stage::Rset | Stage::MailFrom | Stage::RcptTo | Stage::Data | Stage::Message => {
                self.transaction(response);
                Ok(())
            }
            Stage::Quit => {
                tracing::debug!("session closed");
                self.stage = Stage::Closed;
                Ok(())
            }
            Stage::Closed => Ok(()),
        }
    }

    fn greeting(&mut self, response: Response) -> Result<()> {
        if response.code != ReplyCode::SERVICE_READY {
            return Err(Error::Greeting(response));
        }

        self.protocol = Protocol::detect(&response);
        tracing::debug!(protocol = ?self.protocol, "greeting");
        let (verb, stage) = match self.protocol {
            Protocol::Esmtp => (Verb::Ehlo, Stage::Ehlo),
            Protocol::Smtp => (Verb::Helo, Stage::Helo),
        };
        let hello = Command::with_args(verb, self.config.hostname.clone());
        self.send(&hello, stage);
        Ok(())
    }

    fn ehlo(&mut self, response: Response) -> Result<()> {
        if !response.is_success() {
            tracing::debug!(code = response.code.as_u16(), "EHLO refused, falling back to HELO");
            self.protocol = Protocol::Smtp;
            let hello = Command::with_args(Verb::Helo, self.config.hostname.clone());
            self.send(&hello, Stage::Helo);
            return Ok(());
        }

        let capabilities = Capability::decode_all(&response.message).map_err(Error::Capabilities)?;
        self.server_opts = ServerOpts::from_capabilities(&capabilities);
        tracing::debug!(
            max_message_size = self.server_opts.max_message_size,
            pipelining = self.server_opts.supports_pipelining(),
            "capabilities negotiated"
        );
        self.dispatch();
        Ok(())
    }

    /// Starts the next assignment, or idles (or quits) when there is none.
    fn dispatch(&mut self) {
        loop {
            let Some(assignment) = self.queue.front() else {
                if self.shutting_down {
                    self.keep_alive_at = None;
                    self.send(&Command::bare(Verb::Quit), Stage::Quit);
                } else {
                    self.stage = Stage::Idle;
                    self.keep_alive_at = Some(Instant::now() + self.config.keep_alive);
                }
                return;
            };

            let refusal = if assignment.to().is_empty() {
                Some(TransactionError::NoRecipients)
            } else if self.protocol == Protocol::Esmtp
                && let Some(max) = self.server_opts.max_message_size
                && max > 0
                && assignment.size() > max
            {
                Some(TransactionError::MessageTooLarge {
                    size: assignment.size(),
                    max,
                })
            } else {
                None
            };

            match refusal {
                Some(error) => self.acknowledge(Err(error)),
                None => break,
            }
        }

        self.keep_alive_at = None;
        self.recipient = 0;
        self.send(&Command::bare(Verb::Rset), Stage::Rset);
    }

    fn transaction(&mut self, response: Response) {
        let expected = match self.stage {
            Stage::Data => response.code == ReplyCode::START_DATA,
            Stage::RcptTo => response.is_success(),
            _ => response.code == ReplyCode::OK,
        };
        if !expected {
            let error = TransactionError::Rejected {
                stage: self.stage,
                reply: response,
            };
            tracing::warn!(%error, "transaction failed");
            self.acknowledge(Err(error));
            self.dispatch();
            return;
        }

        let Some(assignment) = self.queue.front() else {
            self.dispatch();
            return;
        };

        match self.stage {
            Stage::Rset => {
                let command = self.mail_from(assignment);
                self.send(&command, Stage::MailFrom);
            }
            Stage::MailFrom | Stage::RcptTo => {
                if self.stage == Stage::RcptTo {
                    self.recipient += 1;
                }
                match assignment.to().get(self.recipient) {
                    Some(to) => {
                        let command = rcpt_to(to);
                        self.send(&command, Stage::RcptTo);
                    }
                    None => self.send(&Command::bare(Verb::Data), Stage::Data),
                }
            }
            Stage::Data => {
                let content = dot_stuff(assignment.data());
                tracing::trace!(len = content.len(), "C: <message content>");
                self.transmits.push_back(Transmit::new(content));
                self.stage = Stage::Message;
            }
            _ => {
                tracing::info!(
                    recipients = assignment.to().len(),
                    size = assignment.size(),
                    "message delivered"
                );
                self.acknowledge(Ok(response));
                self.dispatch();
            }
        }
    }

    fn mail_from(&self, assignment: &Assignment) -> Command {
        let mut args = format!("FROM:<{}>", assignment.from().map_or("", Address::as_str));
        if self.protocol == Protocol::Esmtp {
            if self.server_opts.max_message_size.is_some() {
                args.push_str(&format!(" SIZE={}", assignment.size()));
            }
            if self.server_opts.supports_8bitmime() && assignment.is_eight_bit() {
                args.push_str(" BODY=8BITMIME");
            }
        }
        Command::with_args(Verb::Mail, args)
    }

    /// Completes the head assignment.
    fn acknowledge(&mut self, outcome: Outcome) {
        if let Some(assignment) = self.queue.pop_front() {
            assignment.complete(outcome);
        }
    }

    fn send(&mut self, command: &Command, stage: Stage) {
        tracing::trace!(command = %command.encode(false), "C:");
        self.transmits.push_back(Transmit::from(command));
        self.stage = stage;
    }

    fn fail(&mut self, error: Error) -> Error {
        tracing::warn!(%error, stage = %self.stage, "session failed");
        self.stage = Stage::Closed;
        self.keep_alive_at = None;
        error
    }
}

fn rcpt_to(to: &Address) -> Command {
    Command::with_args(Verb::Rcpt, format!("TO:<{to}>"))
}
