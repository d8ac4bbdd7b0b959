//! Error types for the server.

use std::time::Duration;

use postwire_smtp::{EnhancedStatusCode, ReplyCode, Response, Verb};
use thiserror::Error;

/// Boxed error returned by hook implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a [`Handler`](crate::Handler) hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// Refuse the request with the given reply; the session continues.
    #[error("rejected: {0}")]
    Reject(Response),

    /// Internal failure; the connection is terminated.
    #[error("hook failed: {0}")]
    Internal(#[source] BoxError),
}

impl HookError {
    /// Creates a rejection with a reply code, enhanced code and text.
    #[must_use]
    pub fn reject(code: ReplyCode, enhanced: EnhancedStatusCode, message: impl Into<String>) -> Self {
        Self::Reject(Response::enhanced(code, enhanced, message))
    }

    /// Wraps an internal error.
    pub fn internal(error: impl Into<BoxError>) -> Self {
        Self::Internal(error.into())
    }
}

/// Result type for hooks.
pub type HookResult<T> = std::result::Result<T, HookError>;

/// Why a single command was refused.
///
/// Every variant except [`Internal`](Self::Internal) turns into a reply and
/// the session continues.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command line could not be parsed.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Unknown command verb.
    #[error("unrecognized command: {0}")]
    InvalidCommand(String),

    /// Arguments missing, superfluous or malformed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Command not allowed in the current session state.
    #[error("bad sequence: {0}")]
    BadSequence(String),

    /// Refused by local policy.
    #[error("policy: {0}")]
    Policy(String),

    /// Known command that is not enabled.
    #[error("command disabled: {0}")]
    Disabled(Verb),

    /// Specific reply, e.g. a hook rejection.
    #[error("{0}")]
    Reply(Response),

    /// Hook failed internally.
    #[error("hook failed: {0}")]
    Internal(#[source] BoxError),
}

impl CommandError {
    /// Returns the reply sent to the client.
    ///
    /// [`Internal`](Self::Internal) maps to a 421 since the connection is
    /// closed right after.
    #[must_use]
    pub fn to_response(&self) -> Response {
        let (code, subject, message) = match self {
            Self::Syntax(message) => (
                ReplyCode::SYNTAX_ERROR,
                EnhancedStatusCode::SYNTAX_ERROR,
                format!("Syntax error, {message}"),
            ),
            Self::InvalidCommand(_) => (
                ReplyCode::SYNTAX_ERROR,
                EnhancedStatusCode::INVALID_COMMAND,
                "Syntax error, command unrecognized".to_string(),
            ),
            Self::InvalidArguments(message) => (
                ReplyCode::PARAMETER_ERROR,
                EnhancedStatusCode::INVALID_ARGUMENTS,
                format!("Syntax error in parameters or arguments, {message}"),
            ),
            Self::BadSequence(message) => (
                ReplyCode::BAD_SEQUENCE,
                EnhancedStatusCode::INVALID_COMMAND,
                format!("Bad sequence of commands, {message}"),
            ),
            Self::Policy(message) => (
                ReplyCode::MAILBOX_UNAVAILABLE,
                EnhancedStatusCode::DELIVERY_NOT_AUTHORIZED,
                message.clone(),
            ),
            Self::Disabled(verb) => (
                ReplyCode::NOT_IMPLEMENTED,
                EnhancedStatusCode::INVALID_COMMAND,
                format!("{verb} command not implemented"),
            ),
            Self::Reply(response) => return response.clone(),
            Self::Internal(_) => {
                return Response::enhanced(
                    ReplyCode::SERVICE_UNAVAILABLE,
                    EnhancedStatusCode::TRANSIENT + EnhancedStatusCode::OTHER_MAIL_SYSTEM,
                    "Local error, closing transmission channel",
                );
            }
        };

        let class = if code.is_transient() {
            EnhancedStatusCode::TRANSIENT
        } else {
            EnhancedStatusCode::PERMANENT
        };
        Response::enhanced(code, class + subject, message)
    }
}

impl From<HookError> for CommandError {
    fn from(error: HookError) -> Self {
        match error {
            HookError::Reject(response) => Self::Reply(response),
            HookError::Internal(error) => Self::Internal(error),
        }
    }
}

impl From<postwire_smtp::Error> for CommandError {
    fn from(error: postwire_smtp::Error) -> Self {
        use postwire_smtp::Error as Wire;

        match error {
            Wire::InvalidCommand(verb) => Self::InvalidCommand(verb),
            Wire::InvalidAddress(message) => Self::InvalidArguments(message),
            other => Self::Syntax(other.to_string()),
        }
    }
}

/// Errors that terminate a connection.
#[derive(Debug, Error)]
pub enum ServerError {
    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A hook failed internally.
    #[error("hook failed: {0}")]
    Hook(#[source] BoxError),

    /// The client was idle for too long.
    #[error("Client timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
