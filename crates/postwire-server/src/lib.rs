//! # postwire-server
//!
//! Server side of an SMTP/ESMTP session (RFC 5321).
//!
//! The core is a sans-I/O [`Connection`] state machine: feed it the bytes
//! read from a client and write out whatever it queues. Policy decisions
//! (which senders and recipients to accept, where messages go, how
//! credentials are checked) are delegated to a [`Handler`].
//!
//! ## Features
//!
//! - HELO/EHLO, MAIL, RCPT, DATA, BDAT, RSET, NOOP, VRFY, EXPN, HELP, QUIT
//! - AUTH PLAIN and XOAUTH2 (RFC 4954)
//! - SIZE, PIPELINING, 8BITMIME, SMTPUTF8, CHUNKING, BINARYMIME,
//!   ENHANCEDSTATUSCODES
//! - Tokio driver with a per-read I/O timeout
//!
//! ## Quick Start
//!
//! ```ignore
//! use postwire_server::{LoggingHandler, Server, ServerConfig};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> postwire_server::Result<()> {
//!     let server = Server::new(ServerConfig::new("mx.example.com"), |_| LoggingHandler);
//!     let listener = TcpListener::bind("0.0.0.0:2525").await?;
//!     server.run(listener).await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`connection`]: Session state machine
//! - [`handler`]: Hook trait and received mail
//! - [`config`]: Server configuration
//! - [`sasl`]: AUTH payload decoding
//! - [`server`]: Tokio listener and stream driver

#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
mod error;
pub mod flags;
pub mod handler;
pub mod sasl;
pub mod server;
pub mod session;

pub use config::{SaslMechanism, ServerConfig, ServerConfigBuilder};
pub use connection::Connection;
pub use error::{BoxError, CommandError, HookError, HookResult, Result, ServerError};
pub use flags::SessionFlags;
pub use handler::{Handler, LoggingHandler, Mail, NoopHandler, TransferMethod};
pub use server::{Server, serve};
pub use session::{BodyType, ConnectionInfo, Family, Session, User};
