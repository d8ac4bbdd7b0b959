//! Outbound message jobs.

use bytes::Bytes;
use postwire_smtp::{Address, Response};
use tokio::sync::oneshot;

use crate::error::TransactionError;

/// Result of one assignment: the final 250 reply, or why it failed.
pub type Outcome = std::result::Result<Response, TransactionError>;

/// Receiving side of an assignment's completion.
pub type Receipt = oneshot::Receiver<Outcome>;

/// One outbound message: envelope, content and completion callback.
#[derive(Debug)]
pub struct Assignment {
    from: Option<Address>,
    to: Vec<Address>,
    data: Bytes,
    reply: Option<oneshot::Sender<Outcome>>,
}

impl Assignment {
    /// Creates an assignment and the receipt on which its outcome arrives.
    ///
    /// `from` is `None` for the null reverse path (bounces).
    #[must_use]
    pub fn new(from: Option<Address>, to: Vec<Address>, data: impl Into<Bytes>) -> (Self, Receipt) {
        let (tx, rx) = oneshot::channel();
        let assignment = Self {
            from,
            to,
            data: data.into(),
            reply: Some(tx),
        };
        (assignment, rx)
    }

    /// Creates an assignment nobody waits on.
    #[must_use]
    pub fn detached(from: Option<Address>, to: Vec<Address>, data: impl Into<Bytes>) -> Self {
        Self {
            from,
            to,
            data: data.into(),
            reply: None,
        }
    }

    /// Reverse path.
    #[must_use]
    pub const fn from(&self) -> Option<&Address> {
        self.from.as_ref()
    }

    /// Recipients, in the order they are sent.
    #[must_use]
    pub fn to(&self) -> &[Address] {
        &self.to
    }

    /// Message content, not yet dot-stuffed.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Content size in octets.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::try_from(self.data.len()).unwrap_or(u64::MAX)
    }

    /// Returns true if the content has octets above 127.
    #[must_use]
    pub fn is_eight_bit(&self) -> bool {
        self.data.iter().any(|&b| b >= 0x80)
    }

    /// Delivers the outcome. A dropped receipt is not an error.
    pub(crate) fn complete(mut self, outcome: Outcome) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(outcome);
        }
    }
}
