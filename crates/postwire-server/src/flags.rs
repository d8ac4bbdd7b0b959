//! Session progress flags.

use std::fmt;
use std::ops::BitOr;

/// Bitset of what has happened in the current session and transaction.
///
/// Several flags can be set at once (an authenticated session with a
/// sender and recipients), so this is a set rather than a linear state.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SessionFlags(u8);

impl SessionFlags {
    /// No flags.
    pub const EMPTY: Self = Self(0);
    /// HELO/EHLO accepted.
    pub const INTRODUCED: Self = Self(1);
    /// AUTH completed.
    pub const AUTHENTICATED: Self = Self(1 << 1);
    /// MAIL FROM accepted.
    pub const FROM: Self = Self(1 << 2);
    /// At least one RCPT TO accepted.
    pub const TO: Self = Self(1 << 3);
    /// DATA started.
    pub const REGULAR_TRANSFER: Self = Self(1 << 4);
    /// BDAT started.
    pub const BINARY_TRANSFER: Self = Self(1 << 5);
    /// Message content fully received.
    pub const DATA_TRANSFERED: Self = Self(1 << 6);
    /// The last BDAT chunk was announced.
    pub const BINARY_LAST: Self = Self(1 << 7);

    /// Flags cleared by a transaction reset.
    pub const TRANSACTION: Self = Self(
        Self::FROM.0
            | Self::TO.0
            | Self::REGULAR_TRANSFER.0
            | Self::BINARY_TRANSFER.0
            | Self::DATA_TRANSFERED.0
            | Self::BINARY_LAST.0,
    );

    /// Returns true if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the flags in `other`.
    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears the flags in `other`.
    pub const fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Returns true if HELO/EHLO was accepted.
    #[must_use]
    pub const fn is_introduced(self) -> bool {
        self.contains(Self::INTRODUCED)
    }

    /// Returns true if the client authenticated.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        self.contains(Self::AUTHENTICATED)
    }

    /// Returns true if a sender was accepted.
    #[must_use]
    pub const fn has_from(self) -> bool {
        self.contains(Self::FROM)
    }

    /// Returns true if a recipient was accepted.
    #[must_use]
    pub const fn has_to(self) -> bool {
        self.contains(Self::TO)
    }

    /// Returns true if DATA was started.
    #[must_use]
    pub const fn is_regular_transfer(self) -> bool {
        self.contains(Self::REGULAR_TRANSFER)
    }

    /// Returns true if BDAT was started.
    #[must_use]
    pub const fn is_binary_transfer(self) -> bool {
        self.contains(Self::BINARY_TRANSFER)
    }

    /// Returns true if the message content was fully received.
    #[must_use]
    pub const fn is_data_transfered(self) -> bool {
        self.contains(Self::DATA_TRANSFERED)
    }

    /// Returns true if the last BDAT chunk was announced.
    #[must_use]
    pub const fn is_binary_last(self) -> bool {
        self.contains(Self::BINARY_LAST)
    }
}

impl BitOr for SessionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for SessionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(SessionFlags, &str); 8] = [
            (SessionFlags::INTRODUCED, "Introduced"),
            (SessionFlags::AUTHENTICATED, "Authenticated"),
            (SessionFlags::FROM, "From"),
            (SessionFlags::TO, "To"),
            (SessionFlags::REGULAR_TRANSFER, "RegularTransferMethod"),
            (SessionFlags::BINARY_TRANSFER, "BinaryDataTransferMethod"),
            (SessionFlags::DATA_TRANSFERED, "DataTransfered"),
            (SessionFlags::BINARY_LAST, "BinaryDataTransferLast"),
        ];

        f.debug_set()
            .entries(
                NAMES
                    .iter()
                    .filter(|(flag, _)| self.contains(*flag))
                    .map(|(_, name)| name),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut flags = SessionFlags::EMPTY;
        flags.insert(SessionFlags::INTRODUCED | SessionFlags::FROM);
        assert!(flags.is_introduced());
        assert!(flags.has_from());
        assert!(!flags.has_to());

        flags.remove(SessionFlags::TRANSACTION);
        assert!(flags.is_introduced());
        assert!(!flags.has_from());
    }

    #[test]
    fn test_debug_names() {
        let flags = SessionFlags::INTRODUCED | SessionFlags::AUTHENTICATED;
        assert_eq!(format!("{flags:?}"), r#"{"Introduced", "Authenticated"}"#);
    }
}
