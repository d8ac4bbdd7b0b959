//! Outgoing bytes produced by the sans-I/O state machines.

use crate::codec::{Command, Response};

/// Bytes to write to the peer.
///
/// The protocol layer produces these; the I/O layer is responsible for
/// actually sending them, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    /// Raw bytes to send.
    pub data: Vec<u8>,
}

impl Transmit {
    /// Creates a new transmit from bytes.
    #[must_use]
    pub const fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Returns the data as a string slice, if valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Returns the length of the data.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the transmit is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<&Response> for Transmit {
    fn from(response: &Response) -> Self {
        Self::new(response.encode_multiline().into_bytes())
    }
}

impl From<&Command> for Transmit {
    fn from(command: &Command) -> Self {
        Self::new(command.serialize())
    }
}

impl From<Vec<u8>> for Transmit {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl AsRef<[u8]> for Transmit {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
