//! Per-connection session state.

use std::net::SocketAddr;

use bytes::BytesMut;
use postwire_smtp::Address;

use crate::flags::SessionFlags;

/// Address family of the accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// IPv4
    Ipv4,
    /// IPv6
    Ipv6,
}

/// Transport metadata of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Remote address.
    pub peer: SocketAddr,
    /// Local address the connection was accepted on.
    pub local: SocketAddr,
}

impl ConnectionInfo {
    /// Creates connection metadata.
    #[must_use]
    pub const fn new(peer: SocketAddr, local: SocketAddr) -> Self {
        Self { peer, local }
    }

    /// Address family of the peer.
    #[must_use]
    pub const fn family(&self) -> Family {
        match self.peer {
            SocketAddr::V4(_) => Family::Ipv4,
            SocketAddr::V6(_) => Family::Ipv6,
        }
    }
}

/// Authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    /// User name as established by AUTH.
    pub name: String,
}

impl User {
    /// Creates a user.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Message body type declared with the `BODY=` MAIL parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BodyType {
    /// `7BIT` (the default)
    #[default]
    SevenBit,
    /// `8BITMIME`
    EightBitMime,
    /// `BINARYMIME`
    BinaryMime,
}

impl BodyType {
    /// Parses a `BODY=` value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "7BIT" => Some(Self::SevenBit),
            "8BITMIME" => Some(Self::EightBitMime),
            "BINARYMIME" => Some(Self::BinaryMime),
            _ => None,
        }
    }
}

/// State of one SMTP session.
///
/// A *hard reset* (HELO/EHLO) clears the remote domain and the current
/// transaction. A *soft reset* (RSET, or a completed transfer) clears only
/// the transaction: sender, recipients, transfer flags and buffered data.
/// Authentication survives both.
#[derive(Debug)]
pub struct Session {
    pub(crate) flags: SessionFlags,
    pub(crate) from: Option<Address>,
    pub(crate) to: Vec<Address>,
    pub(crate) domain: Option<String>,
    pub(crate) data: BytesMut,
    pub(crate) user: Option<User>,
    pub(crate) invalid_commands: u32,
    pub(crate) declared_size: Option<u64>,
    pub(crate) body: BodyType,
    pub(crate) smtputf8: bool,
    connection: ConnectionInfo,
}

impl Session {
    /// Creates the state of a freshly accepted connection.
    #[must_use]
    pub fn new(connection: ConnectionInfo) -> Self {
        Self {
            flags: SessionFlags::EMPTY,
            from: None,
            to: Vec::new(),
            domain: None,
            data: BytesMut::new(),
            user: None,
            invalid_commands: 0,
            declared_size: None,
            body: BodyType::default(),
            smtputf8: false,
            connection,
        }
    }

    /// Current flags.
    #[must_use]
    pub const fn flags(&self) -> SessionFlags {
        self.flags
    }

    /// Reverse path of the current transaction; `None` before MAIL or for `<>`.
    #[must_use]
    pub const fn from(&self) -> Option<&Address> {
        self.from.as_ref()
    }

    /// Accepted recipients, in order.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.to
    }

    /// Domain announced with HELO/EHLO.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Authenticated user.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Number of undecodable command lines received so far.
    #[must_use]
    pub const fn invalid_commands(&self) -> u32 {
        self.invalid_commands
    }

    /// Size declared with `SIZE=`, if any.
    #[must_use]
    pub const fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    /// Body type declared with `BODY=`.
    #[must_use]
    pub const fn body(&self) -> BodyType {
        self.body
    }

    /// Transport metadata.
    #[must_use]
    pub const fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    /// Bytes of message content buffered so far.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.data.len()
    }

    /// Clears the domain and the transaction.
    pub fn hard_reset(&mut self) {
        self.domain = None;
        self.flags.remove(SessionFlags::INTRODUCED);
        self.soft_reset();
    }

    /// Clears the transaction.
    pub fn soft_reset(&mut self) {
        self.flags.remove(SessionFlags::TRANSACTION);
        self.from = None;
        self.to.clear();
        self.data.clear();
        self.declared_size = None;
        self.body = BodyType::default();
        self.smtputf8 = false;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(ConnectionInfo::new(
            "192.0.2.1:40000".parse().unwrap(),
            "192.0.2.2:25".parse().unwrap(),
        ))
    }

    fn populate(session: &mut Session) {
        session.flags.insert(
            SessionFlags::INTRODUCED
                | SessionFlags::AUTHENTICATED
                | SessionFlags::FROM
                | SessionFlags::TO
                | SessionFlags::REGULAR_TRANSFER,
        );
        session.domain = Some("client.example.com".into());
        session.user = Some(User::new("alice"));
        session.from = Some(Address::new("a@example.com").unwrap());
        session.to.push(Address::new("b@example.com").unwrap());
        session.data.extend_from_slice(b"partial");
        session.declared_size = Some(100);
    }

    #[test]
    fn test_soft_reset_keeps_session() {
        let mut session = session();
        populate(&mut session);
        session.soft_reset();

        assert!(session.flags().is_introduced());
        assert!(session.flags().is_authenticated());
        assert!(!session.flags().has_from());
        assert!(!session.flags().is_regular_transfer());
        assert_eq!(session.domain(), Some("client.example.com"));
        assert_eq!(session.user(), Some(&User::new("alice")));
        assert!(session.from().is_none());
        assert!(session.recipients().is_empty());
        assert_eq!(session.buffered_len(), 0);
        assert_eq!(session.declared_size(), None);
    }

    #[test]
    fn test_hard_reset_clears_domain() {
        let mut session = session();
        populate(&mut session);
        session.hard_reset();

        assert!(!session.flags().is_introduced());
        assert!(session.flags().is_authenticated());
        assert_eq!(session.domain(), None);
        assert!(session.recipients().is_empty());
    }

    #[test]
    fn test_family() {
        let info = ConnectionInfo::new(
            "[2001:db8::1]:40000".parse().unwrap(),
            "[2001:db8::2]:25".parse().unwrap(),
        );
        assert_eq!(info.family(), Family::Ipv6);
        assert_eq!(session().connection().family(), Family::Ipv4);
    }

    #[test]
    fn test_body_type_parse() {
        assert_eq!(BodyType::parse("8bitmime"), Some(BodyType::EightBitMime));
        assert_eq!(BodyType::parse("7BIT"), Some(BodyType::SevenBit));
        assert_eq!(BodyType::parse("16BIT"), None);
    }
}
