//! Hooks through which the embedding application takes part in a session.
//!
//! The session state machine decides *when* a hook runs; the hook decides
//! *whether* the request is accepted. Every hook has a default so an
//! implementation only overrides what it cares about.
//!
//! # Example
//!
//! ```ignore
//! use postwire_server::{Handler, HookError, HookResult, Mail, Session};
//!
//! struct Spool;
//!
//! impl Handler for Spool {
//!     fn handle_mail(&mut self, _session: &Session, mail: Mail) -> HookResult<()> {
//!         std::fs::write("/var/spool/mail.eml", &mail.content).map_err(HookError::internal)
//!     }
//! }
//! ```

use bytes::Bytes;
use chrono::{DateTime, Utc};
use postwire_smtp::Address;

use crate::error::HookResult;
use crate::session::{BodyType, ConnectionInfo, Session, User};

/// How the message content was transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferMethod {
    /// DATA with a dot-terminated block.
    Data,
    /// One or more BDAT chunks.
    Bdat,
}

/// A received message together with its envelope.
#[derive(Debug, Clone)]
pub struct Mail {
    /// Message content (dot-unstuffed for DATA).
    pub content: Bytes,
    /// Reverse path; `None` for the null sender `<>`.
    pub from: Option<Address>,
    /// Recipients in the order they were accepted.
    pub to: Vec<Address>,
    /// Domain announced with HELO/EHLO.
    pub domain: String,
    /// Transport metadata.
    pub connection: ConnectionInfo,
    /// Authenticated user, if any.
    pub user: Option<User>,
    /// Transfer method used.
    pub transfer: TransferMethod,
    /// Declared body type.
    pub body: BodyType,
    /// Whether `SMTPUTF8` was requested.
    pub smtputf8: bool,
    /// When the transfer completed.
    pub received_at: DateTime<Utc>,
}

/// Session hooks.
///
/// Hooks returning [`HookError::Reject`](crate::HookError::Reject) refuse
/// the request with that reply; [`HookError::Internal`](crate::HookError::Internal)
/// closes the connection with a 421 and surfaces the error to the driver.
pub trait Handler: Send {
    /// Called for `MAIL FROM` after syntax checks.
    fn validate_from(&mut self, session: &Session, from: Option<&Address>) -> HookResult<()> {
        let _ = (session, from);
        Ok(())
    }

    /// Called for `RCPT TO` after syntax and relay checks.
    ///
    /// Returns the address to record, which may differ from the one given
    /// (e.g. after alias resolution).
    fn validate_rcpt(&mut self, session: &Session, to: &Address) -> HookResult<Address> {
        let _ = session;
        Ok(to.clone())
    }

    /// Called for `VRFY user@domain`; returns the matching mailboxes.
    fn verify_mailbox(&mut self, session: &Session, address: &Address) -> HookResult<Vec<Address>> {
        let _ = (session, address);
        Ok(Vec::new())
    }

    /// Called for `VRFY name`; returns the matching mailboxes.
    fn verify_name(&mut self, session: &Session, name: &str) -> HookResult<Vec<Address>> {
        let _ = (session, name);
        Ok(Vec::new())
    }

    /// Called for `EXPN list`; returns the list members.
    fn expand_list(&mut self, session: &Session, list: &str) -> HookResult<Vec<Address>> {
        let _ = (session, list);
        Ok(Vec::new())
    }

    /// Called exactly once per completed transfer.
    fn handle_mail(&mut self, session: &Session, mail: Mail) -> HookResult<()> {
        let _ = (session, mail);
        Ok(())
    }

    /// Resolves an authorization identity to a user.
    fn lookup_user(&mut self, session: &Session, name: &str) -> HookResult<Option<User>> {
        let _ = session;
        Ok(Some(User::new(name)))
    }

    /// Checks AUTH PLAIN credentials.
    fn verify_password(
        &mut self,
        session: &Session,
        username: &str,
        password: &str,
    ) -> HookResult<Option<User>> {
        let _ = (session, username, password);
        Ok(None)
    }

    /// Checks an AUTH XOAUTH2 bearer token.
    fn verify_oauth_token(
        &mut self,
        session: &Session,
        username: &str,
        token: &str,
    ) -> HookResult<Option<User>> {
        let _ = (session, username, token);
        Ok(None)
    }
}

/// Accepts every envelope and discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl Handler for NoopHandler {}

/// Accepts everything and logs received messages using tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl Handler for LoggingHandler {
    fn handle_mail(&mut self, _session: &Session, mail: Mail) -> HookResult<()> {
        tracing::info!(
            peer = %mail.connection.peer,
            from = mail.from.as_ref().map_or("<>", Address::as_str),
            recipients = mail.to.len(),
            size = mail.content.len(),
            transfer = ?mail.transfer,
            "message received"
        );
        Ok(())
    }
}
