//! Enhanced mail system status codes (RFC 3463).
//!
//! A code is composed from a class base (`2.0.0`, `4.0.0`, `5.0.0`) and a
//! class-less subject/detail pair, e.g.
//! `EnhancedStatusCode::PERMANENT + EnhancedStatusCode::INVALID_COMMAND`
//! gives `5.5.1`.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use crate::error::Error;

/// RFC 3463 `class.subject.detail` status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnhancedStatusCode {
    /// 2 (success), 4 (persistent transient failure) or 5 (permanent failure).
    pub class: u16,
    /// Subject sub-code.
    pub subject: u16,
    /// Detail sub-code.
    pub detail: u16,
}

impl EnhancedStatusCode {
    /// Creates a code from its three components.
    #[must_use]
    pub const fn new(class: u16, subject: u16, detail: u16) -> Self {
        Self {
            class,
            subject,
            detail,
        }
    }

    /// Returns true for class 2.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.class == 2
    }

    /// Returns true for class 4.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.class == 4
    }

    /// Returns true for class 5.
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.class == 5
    }

    /// Splits a leading enhanced code off a reply text.
    ///
    /// Returns the code and the remaining text when the first token is a
    /// strict `D.D.D` code.
    #[must_use]
    pub fn split_prefix(text: &str) -> Option<(Self, &str)> {
        let (token, rest) = text.split_once(' ').unwrap_or((text, ""));
        let code = token.parse().ok()?;
        Some((code, rest))
    }
}

// Class bases
impl EnhancedStatusCode {
    /// `2.0.0`
    pub const SUCCESS: Self = Self::new(2, 0, 0);
    /// `4.0.0`
    pub const TRANSIENT: Self = Self::new(4, 0, 0);
    /// `5.0.0`
    pub const PERMANENT: Self = Self::new(5, 0, 0);
}

// Subject and detail parts, meant to be added to a class base
impl EnhancedStatusCode {
    /// `x.0.0` Other undefined status
    pub const UNDEFINED: Self = Self::new(0, 0, 0);
    /// `x.1.0` Other address status
    pub const OTHER_ADDRESS: Self = Self::new(0, 1, 0);
    /// `x.1.1` Bad destination mailbox address
    pub const BAD_DESTINATION_MAILBOX: Self = Self::new(0, 1, 1);
    /// `x.1.3` Bad destination mailbox address syntax
    pub const BAD_DESTINATION_SYNTAX: Self = Self::new(0, 1, 3);
    /// `x.1.4` Destination mailbox address ambiguous
    pub const DESTINATION_AMBIGUOUS: Self = Self::new(0, 1, 4);
    /// `x.1.5` Destination address valid
    pub const DESTINATION_VALID: Self = Self::new(0, 1, 5);
    /// `x.1.7` Bad sender's mailbox address syntax
    pub const BAD_SENDER_SYNTAX: Self = Self::new(0, 1, 7);
    /// `x.2.0` Other or undefined mailbox status
    pub const OTHER_MAILBOX: Self = Self::new(0, 2, 0);
    /// `x.3.0` Other or undefined mail system status
    pub const OTHER_MAIL_SYSTEM: Self = Self::new(0, 3, 0);
    /// `x.3.4` Message too big for system
    pub const MESSAGE_TOO_BIG: Self = Self::new(0, 3, 4);
    /// `x.4.0` Other or undefined network or routing status
    pub const OTHER_NETWORK: Self = Self::new(0, 4, 0);
    /// `x.5.0` Other or undefined protocol status
    pub const OTHER_PROTOCOL: Self = Self::new(0, 5, 0);
    /// `x.5.1` Invalid command
    pub const INVALID_COMMAND: Self = Self::new(0, 5, 1);
    /// `x.5.2` Syntax error
    pub const SYNTAX_ERROR: Self = Self::new(0, 5, 2);
    /// `x.5.3` Too many recipients
    pub const TOO_MANY_RECIPIENTS: Self = Self::new(0, 5, 3);
    /// `x.5.4` Invalid command arguments
    pub const INVALID_ARGUMENTS: Self = Self::new(0, 5, 4);
    /// `x.6.0` Other or undefined media error
    pub const OTHER_MEDIA: Self = Self::new(0, 6, 0);
    /// `x.7.0` Other or undefined security status
    pub const OTHER_SECURITY: Self = Self::new(0, 7, 0);
    /// `x.7.1` Delivery not authorized, message refused
    pub const DELIVERY_NOT_AUTHORIZED: Self = Self::new(0, 7, 1);
    /// `x.7.8` Authentication credentials invalid (RFC 4954)
    pub const AUTH_CREDENTIALS_INVALID: Self = Self::new(0, 7, 8);
}

impl Add for EnhancedStatusCode {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.class.saturating_add(rhs.class),
            self.subject.saturating_add(rhs.subject),
            self.detail.saturating_add(rhs.detail),
        )
    }
}

impl fmt::Display for EnhancedStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.class, self.subject, self.detail)
    }
}

impl FromStr for EnhancedStatusCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidEnhancedCode(s.to_string());
        let component = |part: &str| -> Result<u16, Error> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };

        let mut parts = s.split('.');
        let (Some(class), Some(subject), Some(detail), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        Ok(Self::new(
            component(class)?,
            component(subject)?,
            component(detail)?,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_compose() {
        let code = EnhancedStatusCode::PERMANENT + EnhancedStatusCode::INVALID_COMMAND;
        assert_eq!(code, EnhancedStatusCode::new(5, 5, 1));
        assert!(code.is_permanent());
    }

    #[test]
    fn test_display() {
        assert_eq!(EnhancedStatusCode::new(2, 1, 5).to_string(), "2.1.5");
        assert_eq!(EnhancedStatusCode::SUCCESS.to_string(), "2.0.0");
    }

    #[test]
    fn test_parse_strict() {
        assert_eq!(
            "4.7.0".parse::<EnhancedStatusCode>().unwrap(),
            EnhancedStatusCode::new(4, 7, 0)
        );
        assert_eq!(
            "5.1.10".parse::<EnhancedStatusCode>().unwrap(),
            EnhancedStatusCode::new(5, 1, 10)
        );
        assert!("5.1".parse::<EnhancedStatusCode>().is_err());
        assert!("5.1.1.1".parse::<EnhancedStatusCode>().is_err());
        assert!("5..1".parse::<EnhancedStatusCode>().is_err());
        assert!("a.b.c".parse::<EnhancedStatusCode>().is_err());
        assert!("-5.1.1".parse::<EnhancedStatusCode>().is_err());
    }

    #[test]
    fn test_split_prefix() {
        let (code, rest) = EnhancedStatusCode::split_prefix("2.1.0 Sender ok").unwrap();
        assert_eq!(code, EnhancedStatusCode::new(2, 1, 0));
        assert_eq!(rest, "Sender ok");

        assert!(EnhancedStatusCode::split_prefix("mail.example.com ESMTP").is_none());
        assert!(EnhancedStatusCode::split_prefix("SIZE 1000").is_none());
    }
}
