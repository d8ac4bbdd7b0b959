//! # postwire-client
//!
//! Client side of an SMTP/ESMTP session (RFC 5321) for relaying a queue of
//! outbound messages over one connection.
//!
//! ## Features
//!
//! - **Negotiation**: ESMTP detection from the greeting, EHLO with HELO
//!   fallback, typed capability snapshot ([`ServerOpts`](postwire_smtp::ServerOpts))
//! - **Transactions**: RSET, MAIL FROM (with `SIZE` and `BODY=8BITMIME`
//!   when advertised), RCPT TO, DATA with dot-stuffing
//! - **Keep-alive**: NOOP on a timer while the queue is empty
//! - **Failure isolation**: a refused step fails only its assignment; a
//!   broken session hands every unacknowledged assignment back
//!
//! ## Quick Start
//!
//! ```ignore
//! use postwire_client::{Assignment, ClientConfig, run, transport};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = transport::connect("mx.example.com", 25).await?;
//!     let (tx, rx) = mpsc::channel(16);
//!     let session = tokio::spawn(run(stream, ClientConfig::new("relay.example.org"), rx));
//!
//!     let (assignment, receipt) = Assignment::new(from, vec![to], message);
//!     tx.send(assignment).await?;
//!     drop(tx);
//!
//!     let reply = receipt.await??;
//!     session.await??;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`commander`]: Sans-I/O transaction state machine
//! - [`client`]: Tokio driver
//! - [`transport`]: TCP and TLS connect helpers

#![forbid(unsafe_code)]

mod assignment;
pub mod client;
pub mod commander;
mod config;
mod error;
pub mod transport;

pub use assignment::{Assignment, Outcome, Receipt};
pub use client::run;
pub use commander::{Commander, Protocol};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, Fatal, Result, Stage, TransactionError};
