//! SMTP replies: codes, decoding of (multi-line) reply text and encoding.

use std::fmt;

use super::enhanced::EnhancedStatusCode;
use crate::error::{Error, Result};
use crate::{CRLF, SEPARATOR};

/// SMTP reply from a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Enhanced status code, when the reply carries one.
    pub enhanced: Option<EnhancedStatusCode>,
    /// Reply message lines; more than one means a multi-line reply.
    pub message: Vec<String>,
}

impl Response {
    /// Creates a single-line reply.
    #[must_use]
    pub fn new(code: ReplyCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code,
            enhanced: None,
            message: if message.is_empty() {
                Vec::new()
            } else {
                vec![message]
            },
        }
    }

    /// Creates a single-line reply with an enhanced status code.
    #[must_use]
    pub fn enhanced(
        code: ReplyCode,
        enhanced: EnhancedStatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            enhanced: Some(enhanced),
            ..Self::new(code, message)
        }
    }

    /// Creates a multi-line reply.
    #[must_use]
    pub fn multiline(
        code: ReplyCode,
        enhanced: Option<EnhancedStatusCode>,
        message: Vec<String>,
    ) -> Self {
        Self {
            code,
            enhanced,
            message,
        }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code.is_intermediate()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Decodes a complete reply from its wire lines.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is malformed, codes differ between lines,
    /// the last line is not terminal, or lines follow the terminal line.
    pub fn decode<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let mut decoder = ResponseDecoder::new();
        let mut lines = lines.iter();

        while let Some(line) = lines.next() {
            if let Some(response) = decoder.feed(line.as_ref())? {
                if lines.next().is_some() {
                    return Err(Error::InvalidResponse(
                        "lines after terminal reply line".into(),
                    ));
                }
                return Ok(response);
            }
        }

        Err(Error::InvalidResponse("incomplete reply".into()))
    }

    /// Encodes the reply as one wire line, joining message lines with a space.
    #[must_use]
    pub fn encode(&self, line_ending: bool) -> String {
        let mut line = self.code.to_string();
        if let Some(enhanced) = self.enhanced {
            line.push_str(SEPARATOR);
            line.push_str(&enhanced.to_string());
        }
        let text = self.message.join(SEPARATOR);
        if !text.is_empty() {
            line.push_str(SEPARATOR);
            line.push_str(&text);
        }
        if line_ending {
            line.push_str(CRLF);
        }
        line
    }

    /// Encodes the reply with one wire line per message line.
    #[must_use]
    pub fn encode_multiline(&self) -> String {
        MultilineWriter::new(self.code, self.enhanced)
            .lines(&self.message)
            .collect()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(false))
    }
}

/// Incremental decoder for single and multi-line replies.
///
/// Lines are fed one at a time; a [`Response`] is produced only once the
/// terminal line (`CODE SP text`) has been seen.
#[derive(Debug, Default)]
pub struct ResponseDecoder {
    code: Option<ReplyCode>,
    enhanced: Option<EnhancedStatusCode>,
    lines: Vec<String>,
}

impl ResponseDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if continuation lines have been consumed without a terminal line.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.code.is_some()
    }

    /// Feeds one wire line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is malformed or its code differs from
    /// the previous lines of the same reply. The decoder is reset on error.
    pub fn feed(&mut self, line: &str) -> Result<Option<Response>> {
        let result = self.feed_line(line.trim_end_matches(['\r', '\n']));
        if result.is_err() {
            *self = Self::default();
        }
        result
    }

    fn feed_line(&mut self, line: &str) -> Result<Option<Response>> {
        let code = line
            .get(..3)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u16>().ok())
            .ok_or_else(|| Error::InvalidResponse(line.to_string()))?;
        let code = ReplyCode::new(code);

        let is_last = match line.as_bytes().get(3) {
            None | Some(b' ') => true,
            Some(b'-') => false,
            Some(_) => return Err(Error::InvalidResponse(line.to_string())),
        };

        if let Some(expected) = self.code
            && expected != code
        {
            return Err(Error::ResponseCodeMismatch {
                expected: expected.as_u16(),
                actual: code.as_u16(),
            });
        }
        self.code = Some(code);

        let mut text = line.get(4..).unwrap_or_default();
        if let Some((enhanced, rest)) = EnhancedStatusCode::split_prefix(text) {
            self.enhanced.get_or_insert(enhanced);
            text = rest;
        }
        self.lines.push(text.to_string());

        if !is_last {
            return Ok(None);
        }

        let mut message = std::mem::take(&mut self.lines);
        if message.len() == 1 && message[0].is_empty() {
            message.clear();
        }
        let response = Response {
            code,
            enhanced: self.enhanced.take(),
            message,
        };
        self.code = None;

        Ok(Some(response))
    }
}

/// Writes multi-line replies, marking every line but the last with `-`.
///
/// Lines are pulled lazily from the supplied iterator so a reply can be
/// streamed while it is generated.
#[derive(Debug, Clone, Copy)]
pub struct MultilineWriter {
    code: ReplyCode,
    enhanced: Option<EnhancedStatusCode>,
}

impl MultilineWriter {
    /// Creates a writer for replies with the given codes.
    #[must_use]
    pub const fn new(code: ReplyCode, enhanced: Option<EnhancedStatusCode>) -> Self {
        Self { code, enhanced }
    }

    /// Returns the CRLF-terminated wire lines for `lines`.
    ///
    /// An empty input produces a single line carrying only the codes.
    pub fn lines<I>(self, lines: I) -> impl Iterator<Item = String>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut lines = lines.into_iter().peekable();
        let mut emitted = false;

        std::iter::from_fn(move || {
            let Some(text) = lines.next() else {
                if emitted {
                    return None;
                }
                emitted = true;
                return Some(self.line("", true));
            };
            emitted = true;
            let is_last = lines.peek().is_none();
            Some(self.line(text.as_ref(), is_last))
        })
    }

    /// Appends the wire lines for `lines` to `out`.
    pub fn write<I>(self, lines: I, out: &mut Vec<u8>)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for line in self.lines(lines) {
            out.extend_from_slice(line.as_bytes());
        }
    }

    fn line(self, text: &str, is_last: bool) -> String {
        let mut line = self.code.to_string();
        line.push(if is_last { ' ' } else { '-' });
        if let Some(enhanced) = self.enhanced {
            line.push_str(&enhanced.to_string());
            if !text.is_empty() {
                line.push_str(SEPARATOR);
            }
        }
        line.push_str(text);
        line.push_str(CRLF);
        line
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

// Common reply codes
impl ReplyCode {
    /// 211 System status
    pub const SYSTEM_STATUS: Self = Self(211);
    /// 214 Help message
    pub const HELP: Self = Self(214);
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 251 User not local; will forward
    pub const FORWARD: Self = Self(251);
    /// 252 Cannot verify user, but will accept message
    pub const CANNOT_VERIFY: Self = Self(252);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 Mailbox unavailable (busy)
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 451 Local error in processing
    pub const LOCAL_ERROR: Self = Self(451);
    /// 452 Insufficient system storage
    pub const INSUFFICIENT_STORAGE: Self = Self(452);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 501 Syntax error in parameters or arguments
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 503 Bad sequence of commands
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 504 Command parameter not implemented
    pub const PARAMETER_NOT_IMPLEMENTED: Self = Self(504);
    /// 530 Authentication required
    pub const AUTH_REQUIRED: Self = Self(530);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 551 User not local
    pub const USER_NOT_LOCAL: Self = Self(551);
    /// 552 Exceeded storage allocation
    pub const EXCEEDED_STORAGE: Self = Self(552);
    /// 553 Mailbox name not allowed
    pub const MAILBOX_NAME_INVALID: Self = Self(553);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
    /// 555 MAIL FROM/RCPT TO parameters not recognized or not implemented
    pub const PARAMETERS_NOT_RECOGNIZED: Self = Self(555);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn classes() {
            assert!(ReplyCode::OK.is_success());
            assert!(ReplyCode::START_DATA.is_intermediate());
            assert!(ReplyCode::MAILBOX_BUSY.is_transient());
            assert!(ReplyCode::BAD_SEQUENCE.is_permanent());
            assert!(!ReplyCode::OK.is_permanent());
        }

        #[test]
        fn display() {
            assert_eq!(ReplyCode::OK.to_string(), "250");
            assert_eq!(ReplyCode::new(1).to_string(), "001");
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn single_line() {
            let response = Response::decode(&["250 OK"]).unwrap();
            assert_eq!(response.code, ReplyCode::OK);
            assert_eq!(response.message, vec!["OK"]);
            assert!(response.enhanced.is_none());
        }

        #[test]
        fn multi_line() {
            let mut decoder = ResponseDecoder::new();
            assert_eq!(decoder.feed("250-A").unwrap(), None);
            assert!(decoder.is_pending());
            assert_eq!(decoder.feed("250-B").unwrap(), None);
            let response = decoder.feed("250 C").unwrap().unwrap();

            assert_eq!(response.code.as_u16(), 250);
            assert_eq!(response.message, vec!["A", "B", "C"]);
            assert!(!decoder.is_pending());
        }

        #[test]
        fn code_mismatch() {
            let mut decoder = ResponseDecoder::new();
            decoder.feed("250-A").unwrap();
            assert_eq!(
                decoder.feed("251 B"),
                Err(Error::ResponseCodeMismatch {
                    expected: 250,
                    actual: 251
                })
            );
            // Decoder starts over after an error.
            assert!(!decoder.is_pending());
        }

        #[test]
        fn enhanced_code() {
            let response = Response::decode(&["550 5.1.1 No such user"]).unwrap();
            assert_eq!(response.enhanced, Some(EnhancedStatusCode::new(5, 1, 1)));
            assert_eq!(response.message, vec!["No such user"]);
        }

        #[test]
        fn enhanced_code_on_every_line() {
            let response =
                Response::decode(&["214-2.0.0 first", "214 2.0.0 second"]).unwrap();
            assert_eq!(response.enhanced, Some(EnhancedStatusCode::new(2, 0, 0)));
            assert_eq!(response.message, vec!["first", "second"]);
        }

        #[test]
        fn bare_code() {
            let response = Response::decode(&["354"]).unwrap();
            assert_eq!(response.code, ReplyCode::START_DATA);
            assert!(response.message.is_empty());
        }

        #[test]
        fn crlf_is_ignored() {
            let response = Response::decode(&["221 Bye\r\n"]).unwrap();
            assert_eq!(response.message, vec!["Bye"]);
        }

        #[test]
        fn malformed() {
            assert!(Response::decode(&["25"]).is_err());
            assert!(Response::decode(&["ABC OK"]).is_err());
            assert!(Response::decode(&["250_OK"]).is_err());
            assert!(Response::decode::<&str>(&[]).is_err());
            assert!(Response::decode(&["250-only continuation"]).is_err());
            assert!(Response::decode(&["250 done", "250 extra"]).is_err());
        }
    }

    mod encode_tests {
        use super::*;

        #[test]
        fn single_line() {
            let response = Response::new(ReplyCode::OK, "Ok");
            assert_eq!(response.encode(true), "250 Ok\r\n");
        }

        #[test]
        fn with_enhanced() {
            let response = Response::enhanced(
                ReplyCode::BAD_SEQUENCE,
                EnhancedStatusCode::new(5, 5, 1),
                "Bad sequence of commands",
            );
            assert_eq!(response.encode(false), "503 5.5.1 Bad sequence of commands");
        }

        #[test]
        fn joins_message_lines() {
            let response = Response::multiline(
                ReplyCode::OK,
                None,
                vec!["a".into(), "b".into()],
            );
            assert_eq!(response.encode(false), "250 a b");
        }

        #[test]
        fn multiline_writer() {
            let writer = MultilineWriter::new(ReplyCode::OK, None);
            let lines: Vec<String> = writer
                .lines(["mail.example.com", "PIPELINING", "SIZE 1000"])
                .collect();
            assert_eq!(
                lines,
                vec![
                    "250-mail.example.com\r\n",
                    "250-PIPELINING\r\n",
                    "250 SIZE 1000\r\n"
                ]
            );
        }

        #[test]
        fn multiline_writer_single_and_empty() {
            let writer = MultilineWriter::new(ReplyCode::OK, Some(EnhancedStatusCode::SUCCESS));
            let mut out = Vec::new();
            writer.write(["only"], &mut out);
            assert_eq!(out, b"250 2.0.0 only\r\n");

            let lines: Vec<String> = writer.lines(Vec::<String>::new()).collect();
            assert_eq!(lines, vec!["250 2.0.0\r\n"]);
        }

        #[test]
        fn multiline_round_trip() {
            let response = Response::multiline(
                ReplyCode::HELP,
                Some(EnhancedStatusCode::SUCCESS),
                vec!["one".into(), "two".into()],
            );
            let wire = response.encode_multiline();
            let lines: Vec<&str> = wire.split_terminator("\r\n").collect();
            assert_eq!(Response::decode(&lines).unwrap(), response);
        }
    }
}
