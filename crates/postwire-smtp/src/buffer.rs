//! Append-only receive buffer with delimiter and fixed-length extraction.
//!
//! Network reads arrive in arbitrary fragments. [`SegmentedBuffer`] collects
//! them and hands out complete segments once their delimiter (or the
//! requested number of bytes) has arrived. Extracted segments are split off
//! the front of the underlying [`BytesMut`] without copying the unread tail.

use bytes::{Bytes, BytesMut};

/// Initial capacity of the receive buffer.
const DEFAULT_CAPACITY: usize = 8192;

/// Accumulates written chunks and extracts delimited or fixed-size segments.
#[derive(Debug)]
pub struct SegmentedBuffer {
    inner: BytesMut,
    /// Delimiter of the last unsuccessful scan.
    delimiter: Vec<u8>,
    /// Offset at which the next scan for `delimiter` resumes.
    resume: usize,
}

impl Default for SegmentedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentedBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(capacity),
            delimiter: Vec::new(),
            resume: 0,
        }
    }

    /// Appends a received chunk.
    pub fn write(&mut self, chunk: &[u8]) {
        self.inner.extend_from_slice(chunk);
    }

    /// Number of unconsumed bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns `true` if the unconsumed bytes begin with `prefix`.
    #[must_use]
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.inner.starts_with(prefix)
    }

    /// Removes and returns everything before the first `delimiter`.
    ///
    /// The delimiter itself is consumed but not returned. Returns `None`
    /// until the delimiter has arrived.
    pub fn segment(&mut self, delimiter: &[u8]) -> Option<Bytes> {
        self.segment_with(delimiter, delimiter.len())
    }

    /// Removes everything up to and including the first `delimiter` and
    /// returns it minus `trim_trailing` bytes from its tail.
    ///
    /// With `"\r\n.\r\n"` and a trim of 3 the returned block keeps the line
    /// break that precedes the terminator line.
    pub fn segment_with(&mut self, delimiter: &[u8], trim_trailing: usize) -> Option<Bytes> {
        let position = self.find(delimiter)?;
        let end = position + delimiter.len();

        let mut segment = self.inner.split_to(end);
        segment.truncate(end.saturating_sub(trim_trailing));
        self.resume = 0;

        Some(segment.freeze())
    }

    /// Removes and returns exactly `n` bytes, or `None` (leaving the
    /// buffer untouched) if fewer are buffered.
    #[must_use]
    pub fn read(&mut self, n: usize) -> Option<Bytes> {
        if n > self.inner.len() {
            return None;
        }
        self.resume = self.resume.saturating_sub(n);
        Some(self.inner.split_to(n).freeze())
    }

    /// Drops everything buffered.
    pub fn clear(&mut self) {
        self.inner.clear();
        self.resume = 0;
    }

    fn find(&mut self, delimiter: &[u8]) -> Option<usize> {
        if delimiter.is_empty() {
            return None;
        }

        if self.delimiter != delimiter {
            delimiter.clone_into(&mut self.delimiter);
            self.resume = 0;
        }

        let start = self.resume.min(self.inner.len());
        if let Some(offset) = self.inner[start..]
            .windows(delimiter.len())
            .position(|window| window == delimiter)
        {
            return Some(start + offset);
        }

        // A partial delimiter may sit at the very end; rescan those bytes next time.
        self.resume = self.inner.len().saturating_sub(delimiter.len() - 1);
        None
    }
}
