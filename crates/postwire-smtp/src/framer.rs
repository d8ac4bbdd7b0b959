//! Incremental framing of the SMTP byte stream.
//!
//! The server side switches between command lines, dot-terminated data
//! blocks, fixed-length BDAT chunks and one-shot continuation lines
//! (SASL). The owning state machine selects the mode; the framer only
//! cuts frames out of the received bytes.

use bytes::Bytes;

use crate::buffer::SegmentedBuffer;
use crate::codec::{Response, ResponseDecoder};
use crate::error::{Error, Result};

const CRLF: &[u8] = b"\r\n";
const DATA_TERMINATOR: &[u8] = b"\r\n.\r\n";
const EMPTY_DATA: &[u8] = b".\r\n";

/// Default maximum length of a command or reply line, excluding CRLF.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// A unit cut out of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Command line without CRLF.
    Command(String),
    /// Dot-unstuffed DATA block, keeping the CRLF of its last line.
    Data(Bytes),
    /// Exactly the announced number of BDAT octets.
    Binary(Bytes),
    /// A continuation line requested with [`ServerFramer::enter_line`].
    Line {
        /// Line text without CRLF.
        text: String,
        /// Identifier passed to `enter_line`.
        id: u32,
    },
}

/// What the server framer is currently cutting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// CRLF-terminated command lines.
    Command,
    /// `CRLF.CRLF`-terminated message data.
    Data,
    /// A BDAT chunk of the given length.
    BinaryData(usize),
    /// A single CRLF-terminated line tagged with the given id.
    Line(u32),
}

/// Server-side framer.
#[derive(Debug)]
pub struct ServerFramer {
    buffer: SegmentedBuffer,
    mode: Mode,
    /// Cleared after a `Line` frame until the owner re-arms the framer.
    armed: bool,
    max_line_length: usize,
    max_message_size: Option<usize>,
}

impl Default for ServerFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH, None)
    }
}

impl ServerFramer {
    /// Creates a framer in command mode.
    #[must_use]
    pub fn new(max_line_length: usize, max_message_size: Option<usize>) -> Self {
        Self {
            buffer: SegmentedBuffer::new(),
            mode: Mode::Command,
            armed: true,
            max_line_length,
            max_message_size,
        }
    }

    /// Returns the current mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Appends received bytes.
    pub fn write(&mut self, chunk: &[u8]) {
        self.buffer.write(chunk);
    }

    /// Number of buffered bytes not yet framed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Switches to command lines.
    pub fn enter_command(&mut self) {
        self.arm(Mode::Command);
    }

    /// Switches to a dot-terminated data block.
    pub fn enter_data(&mut self) {
        self.arm(Mode::Data);
    }

    /// Switches to a BDAT chunk of `len` octets.
    pub fn enter_binary(&mut self, len: usize) {
        self.arm(Mode::BinaryData(len));
    }

    /// Switches to a single continuation line.
    pub fn enter_line(&mut self, id: u32) {
        self.arm(Mode::Line(id));
    }

    const fn arm(&mut self, mode: Mode) {
        self.mode = mode;
        self.armed = true;
    }

    /// Cuts the next frame, if enough bytes have arrived.
    ///
    /// After a `Data` or `Binary` frame the framer returns to command mode.
    /// After a `Line` frame it yields nothing until re-armed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LineTooLong`] or [`Error::MaxSizeExceeded`] when a
    /// limit is hit before the terminator arrives (the buffer is dropped),
    /// and [`Error::Syntax`] for a line that is not UTF-8.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.armed {
            return Ok(None);
        }

        match self.mode {
            Mode::Command => Ok(self.next_line()?.map(Frame::Command)),
            Mode::Line(id) => {
                let Some(text) = self.next_line()? else {
                    return Ok(None);
                };
                self.armed = false;
                Ok(Some(Frame::Line { text, id }))
            }
            Mode::Data => self.next_data(),
            Mode::BinaryData(len) => {
                let Some(chunk) = self.buffer.read(len) else {
                    return Ok(None);
                };
                tracing::trace!(len, "binary chunk complete");
                self.mode = Mode::Command;
                Ok(Some(Frame::Binary(chunk)))
            }
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let Some(line) = self.buffer.segment(CRLF) else {
            if self.buffer.len() > self.max_line_length {
                tracing::debug!(buffered = self.buffer.len(), "unterminated line over limit");
                self.buffer.clear();
                return Err(Error::LineTooLong(self.max_line_length));
            }
            return Ok(None);
        };

        if line.len() > self.max_line_length {
            return Err(Error::LineTooLong(self.max_line_length));
        }

        String::from_utf8(line.to_vec())
            .map(Some)
            .map_err(|_| Error::Syntax("line is not valid UTF-8".into()))
    }

    fn next_data(&mut self) -> Result<Option<Frame>> {
        if self.buffer.starts_with(EMPTY_DATA) {
            let _ = self.buffer.read(EMPTY_DATA.len());
            self.mode = Mode::Command;
            return Ok(Some(Frame::Data(Bytes::new())));
        }

        let Some(block) = self.buffer.segment_with(DATA_TERMINATOR, 3) else {
            if let Some(max) = self.max_message_size
                && self.buffer.len() > max
            {
                tracing::debug!(buffered = self.buffer.len(), max, "data block over limit");
                self.buffer.clear();
                return Err(Error::MaxSizeExceeded(max));
            }
            return Ok(None);
        };

        self.mode = Mode::Command;
        if let Some(max) = self.max_message_size
            && block.len() > max
        {
            return Err(Error::MaxSizeExceeded(max));
        }

        Ok(Some(Frame::Data(Bytes::from(dot_unstuff(&block)))))
    }
}

/// Client-side framer: cuts reply lines and assembles complete replies.
#[derive(Debug)]
pub struct ClientFramer {
    buffer: SegmentedBuffer,
    decoder: ResponseDecoder,
    max_line_length: usize,
}

impl Default for ClientFramer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl ClientFramer {
    /// Creates a client framer.
    #[must_use]
    pub fn new(max_line_length: usize) -> Self {
        Self {
            buffer: SegmentedBuffer::new(),
            decoder: ResponseDecoder::new(),
            max_line_length,
        }
    }

    /// Appends received bytes.
    pub fn write(&mut self, chunk: &[u8]) {
        self.buffer.write(chunk);
    }

    /// Returns the next complete reply, if one has arrived.
    ///
    /// # Errors
    ///
    /// Returns an error for an over-long, non-UTF-8 or malformed reply line.
    pub fn next_response(&mut self) -> Result<Option<Response>> {
        loop {
            let Some(line) = self.buffer.segment(CRLF) else {
                if self.buffer.len() > self.max_line_length {
                    self.buffer.clear();
                    return Err(Error::LineTooLong(self.max_line_length));
                }
                return Ok(None);
            };

            let line = std::str::from_utf8(&line)
                .map_err(|_| Error::InvalidResponse("reply is not valid UTF-8".into()))?;
            if let Some(response) = self.decoder.feed(line)? {
                return Ok(Some(response));
            }
        }
    }
}

/// Escapes a message body for DATA transfer.
///
/// Every line starting with `.` gets a second dot, each line is CRLF
/// terminated (bare LF included) and the `.CRLF` terminator is appended.
#[must_use]
pub fn dot_stuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + body.len() / 64 + 5);

    let body = body.strip_suffix(b"\n").unwrap_or(body);
    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(CRLF);
        }
    }

    out.extend_from_slice(EMPTY_DATA);
    out
}

/// Removes the leading dot of every line of a received DATA block.
#[must_use]
pub fn dot_unstuff(block: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(block.len());
    let mut line_start = true;

    for &byte in block {
        if line_start && byte == b'.' {
            line_start = false;
            continue;
        }
        line_start = byte == b'\n';
        out.push(byte);
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::ReplyCode;

    mod server_tests {
        use super::*;

        #[test]
        fn command_lines() {
            let mut framer = ServerFramer::default();
            framer.write(b"EHLO a\r\nMAIL FROM:<x@y>\r\nRC");

            assert_eq!(
                framer.next_frame().unwrap(),
                Some(Frame::Command("EHLO a".into()))
            );
            assert_eq!(
                framer.next_frame().unwrap(),
                Some(Frame::Command("MAIL FROM:<x@y>".into()))
            );
            assert_eq!(framer.next_frame().unwrap(), None);
            assert_eq!(framer.buffered(), 2);
        }

        #[test]
        fn line_too_long() {
            let mut framer = ServerFramer::new(8, None);
            framer.write(b"NOOP NOOP NOOP");
            assert_eq!(framer.next_frame(), Err(Error::LineTooLong(8)));
            assert_eq!(framer.buffered(), 0);
        }

        #[test]
        fn data_block_unstuffed() {
            let mut framer = ServerFramer::default();
            framer.enter_data();
            framer.write(b"Subject: x\r\n\r\n..hidden\r\n.\r\nQUIT\r\n");

            assert_eq!(
                framer.next_frame().unwrap(),
                Some(Frame::Data(Bytes::from_static(b"Subject: x\r\n\r\n.hidden\r\n")))
            );
            assert_eq!(framer.mode(), Mode::Command);
            assert_eq!(
                framer.next_frame().unwrap(),
                Some(Frame::Command("QUIT".into()))
            );
        }

        #[test]
        fn empty_data_block() {
            let mut framer = ServerFramer::default();
            framer.enter_data();
            framer.write(b".\r\n");
            assert_eq!(
                framer.next_frame().unwrap(),
                Some(Frame::Data(Bytes::new()))
            );
        }

        #[test]
        fn data_too_big() {
            let mut framer = ServerFramer::new(DEFAULT_MAX_LINE_LENGTH, Some(10));
            framer.enter_data();
            framer.write(b"0123456789ABCDEF");
            assert_eq!(framer.next_frame(), Err(Error::MaxSizeExceeded(10)));
        }

        #[test]
        fn binary_chunk_parks_in_command_mode() {
            let mut framer = ServerFramer::default();
            framer.enter_binary(5);
            framer.write(b"abc");
            assert_eq!(framer.next_frame().unwrap(), None);
            framer.write(b"\r\nNOOP\r\n");

            assert_eq!(
                framer.next_frame().unwrap(),
                Some(Frame::Binary(Bytes::from_static(b"abc\r\n")))
            );
            assert_eq!(framer.mode(), Mode::Command);
            assert_eq!(
                framer.next_frame().unwrap(),
                Some(Frame::Command("NOOP".into()))
            );
        }

        #[test]
        fn line_mode_is_one_shot() {
            let mut framer = ServerFramer::default();
            framer.enter_line(7);
            framer.write(b"dXNlcg==\r\nNOOP\r\n");

            assert_eq!(
                framer.next_frame().unwrap(),
                Some(Frame::Line {
                    text: "dXNlcg==".into(),
                    id: 7
                })
            );
            assert_eq!(framer.next_frame().unwrap(), None);

            framer.enter_command();
            assert_eq!(
                framer.next_frame().unwrap(),
                Some(Frame::Command("NOOP".into()))
            );
        }

        #[test]
        fn non_utf8_line() {
            let mut framer = ServerFramer::default();
            framer.write(b"HELO \xff\r\n");
            assert!(matches!(framer.next_frame(), Err(Error::Syntax(_))));
        }
    }

    mod client_tests {
        use super::*;

        #[test]
        fn assembles_multiline_reply() {
            let mut framer = ClientFramer::default();
            framer.write(b"250-mx.example.com\r\n250-PIPE");
            assert_eq!(framer.next_response().unwrap(), None);
            framer.write(b"LINING\r\n250 SIZE 100\r\n220 next");

            let response = framer.next_response().unwrap().unwrap();
            assert_eq!(response.code, ReplyCode::OK);
            assert_eq!(
                response.message,
                vec!["mx.example.com", "PIPELINING", "SIZE 100"]
            );
            assert_eq!(framer.next_response().unwrap(), None);
        }

        #[test]
        fn malformed_reply() {
            let mut framer = ClientFramer::default();
            framer.write(b"hello\r\n");
            assert!(framer.next_response().is_err());
        }
    }

    mod dot_stuffing_tests {
        use super::*;

        #[test]
        fn stuff_leading_dots() {
            assert_eq!(
                dot_stuff(b"a\r\n.\r\n.b\r\nc"),
                b"a\r\n..\r\n..b\r\nc\r\n.\r\n"
            );
        }

        #[test]
        fn stuff_normalizes_bare_lf() {
            assert_eq!(dot_stuff(b"a\nb\n"), b"a\r\nb\r\n.\r\n");
        }

        #[test]
        fn stuff_empty_body() {
            assert_eq!(dot_stuff(b""), b".\r\n");
        }

        #[test]
        fn unstuff() {
            assert_eq!(dot_unstuff(b"..a\r\nb\r\n..\r\n"), b".a\r\nb\r\n.\r\n");
        }

        #[test]
        fn stuffed_body_survives_the_server_framer() {
            let body = b"line\r\n.\r\n..two dots\r\n";
            let mut framer = ServerFramer::default();
            framer.enter_data();
            framer.write(&dot_stuff(body));

            assert_eq!(
                framer.next_frame().unwrap(),
                Some(Frame::Data(Bytes::from_static(body)))
            );
        }
    }
}
