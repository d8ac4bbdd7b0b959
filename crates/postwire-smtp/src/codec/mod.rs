//! Command and reply codec.
//!
//! - [`Command`]: `VERB[ ARGS]` lines sent by clients
//! - [`Response`]: `CODE(-| )[X.Y.Z ]TEXT` replies, single and multi-line
//! - [`EnhancedStatusCode`]: RFC 3463 status codes carried in replies

mod command;
mod enhanced;
mod response;

pub use command::{Command, Verb};
pub use enhanced::EnhancedStatusCode;
pub use response::{MultilineWriter, ReplyCode, Response, ResponseDecoder};
