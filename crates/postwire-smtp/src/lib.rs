//! # postwire-smtp
//!
//! Wire-level core of the SMTP/ESMTP protocol (RFC 5321), shared by the
//! server and client state machines.
//!
//! ## Features
//!
//! - **Segmented buffer**: incremental extraction of delimited and
//!   fixed-length segments from fragmented reads
//! - **Codec**: command lines, single and multi-line replies, RFC 3463
//!   enhanced status codes
//! - **Capabilities**: typed EHLO capability lines and the client-side
//!   [`ServerOpts`] snapshot
//! - **Framing**: command, DATA, BDAT and continuation-line framing for
//!   servers; reply framing for clients; dot-stuffing
//!
//! No I/O happens in this crate.
//!
//! ## Example
//!
//! ```
//! use postwire_smtp::{Frame, ServerFramer};
//!
//! let mut framer = ServerFramer::default();
//! framer.write(b"EHLO client.example.com\r\nMAIL FROM:<a@b.c>\r\n");
//!
//! let frame = framer.next_frame().unwrap();
//! assert_eq!(frame, Some(Frame::Command("EHLO client.example.com".into())));
//! ```
//!
//! ## Modules
//!
//! - [`buffer`]: Segmented receive buffer
//! - [`codec`]: Commands, replies and enhanced status codes
//! - [`capability`]: EHLO capabilities
//! - [`framer`]: Stream framers and dot-stuffing
//! - [`address`]: Envelope addresses and path arguments

#![forbid(unsafe_code)]

pub mod address;
pub mod buffer;
pub mod capability;
pub mod codec;
mod error;
pub mod framer;
mod transmit;

pub use address::{Address, Parameter, PathArgs};
pub use buffer::SegmentedBuffer;
pub use capability::{AuthMechanism, Capability, Features, ServerOpts};
pub use codec::{
    Command, EnhancedStatusCode, MultilineWriter, ReplyCode, Response, ResponseDecoder, Verb,
};
pub use error::{Error, Result};
pub use framer::{ClientFramer, Frame, Mode, ServerFramer, dot_stuff, dot_unstuff};
pub use transmit::Transmit;

/// Line terminator.
pub const CRLF: &str = "\r\n";

/// Separator between verb, code and arguments.
pub const SEPARATOR: &str = " ";
