//! Error types for the SMTP wire layer.

/// Result type alias for wire-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while framing, decoding or encoding SMTP data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Line is malformed (empty, not UTF-8, missing fields).
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Command verb is not one of the known SMTP verbs.
    #[error("Unrecognized command: {0}")]
    InvalidCommand(String),

    /// Reply line could not be parsed.
    #[error("Invalid reply line: {0}")]
    InvalidResponse(String),

    /// Lines of a multi-line reply carried different codes.
    #[error("Reply code mismatch: expected {expected}, got {actual}")]
    ResponseCodeMismatch {
        /// Code of the first line.
        expected: u16,
        /// Code of the offending line.
        actual: u16,
    },

    /// Enhanced status code is not of the strict `D.D.D` form.
    #[error("Invalid enhanced status code: {0}")]
    InvalidEnhancedCode(String),

    /// EHLO capability line is malformed.
    #[error("Invalid capability: {0}")]
    InvalidCapability(String),

    /// Mailbox address failed syntax validation.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// A line exceeded the configured limit before its terminator arrived.
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// A data block exceeded the configured limit before its terminator arrived.
    #[error("Message exceeds maximum size of {0} bytes")]
    MaxSizeExceeded(usize),
}

impl Error {
    /// Returns true for errors that mean the peer sent an unusable command line.
    #[must_use]
    pub const fn is_command_error(&self) -> bool {
        matches!(self, Self::Syntax(_) | Self::InvalidCommand(_))
    }
}
