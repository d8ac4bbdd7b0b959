//! Error types for the client.

use std::fmt;

use postwire_smtp::Response;
use thiserror::Error;

use crate::assignment::Assignment;

/// Where the client is in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Waiting for the 220 greeting.
    Greeting,
    /// Waiting for the EHLO reply.
    Ehlo,
    /// Waiting for the HELO reply.
    Helo,
    /// Connected with nothing to send.
    Idle,
    /// Waiting for a keep-alive NOOP reply.
    Noop,
    /// Waiting for the RSET reply that opens a transaction.
    Rset,
    /// Waiting for the MAIL FROM reply.
    MailFrom,
    /// Waiting for a RCPT TO reply.
    RcptTo,
    /// Waiting for the 354 DATA reply.
    Data,
    /// Waiting for the reply to the message content.
    Message,
    /// Waiting for the QUIT reply.
    Quit,
    /// Session over.
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Greeting => "greeting",
            Self::Ehlo => "EHLO",
            Self::Helo => "HELO",
            Self::Idle => "idle",
            Self::Noop => "NOOP",
            Self::Rset => "RSET",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Message => "message content",
            Self::Quit => "QUIT",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Failure of a single assignment. The session carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// The server refused a step of the transaction.
    #[error("{stage} rejected: {reply}")]
    Rejected {
        /// Step that was refused.
        stage: Stage,
        /// The refusing reply.
        reply: Response,
    },

    /// The message is larger than the SIZE the server announced.
    #[error("message of {size} octets exceeds the server limit of {max}")]
    MessageTooLarge {
        /// Message size.
        size: u64,
        /// Announced limit.
        max: u64,
    },

    /// The assignment has no recipients.
    #[error("assignment has no recipients")]
    NoRecipients,
}

impl TransactionError {
    /// Returns the refusing reply, if the server sent one.
    #[must_use]
    pub const fn reply(&self) -> Option<&Response> {
        match self {
            Self::Rejected { reply, .. } => Some(reply),
            _ => None,
        }
    }
}

/// Errors that end a client session.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Host name is not usable for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(String),

    /// Reply could not be framed or decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] postwire_smtp::Error),

    /// Greeting was not a 220.
    #[error("Server rejected the connection: {0}")]
    Greeting(Response),

    /// EHLO capabilities could not be decoded.
    #[error("Invalid capabilities: {0}")]
    Capabilities(#[source] postwire_smtp::Error),

    /// HELO was refused.
    #[error("Negotiation failed: {0}")]
    Negotiation(Response),

    /// A keep-alive NOOP was refused.
    #[error("Keep-alive failed: {0}")]
    KeepAlive(Response),

    /// The server announced it is closing the channel (421).
    #[error("Service not available: {0}")]
    ServiceClosing(Response),

    /// A reply arrived while nothing was outstanding.
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(Response),

    /// The server closed the stream.
    #[error("Connection closed by server")]
    ConnectionClosed,
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A fatal error together with every assignment that was not acknowledged.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Fatal {
    /// Why the session ended.
    #[source]
    pub error: Error,
    /// Assignments to hand to another connection.
    pub pending: Vec<Assignment>,
}
