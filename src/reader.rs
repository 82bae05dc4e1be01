// ABOUTME: Pull-based buffered byte cursor over a byte slice or a streaming reader.
// ABOUTME: Carries the sticky first-wins error slot shared by every decode operation.

#![allow(clippy::missing_errors_doc)]

use crate::error::Error;
use std::borrow::Cow;
use std::io::{ErrorKind, Read};
use tracing::{debug, trace};

/// Default window size for streaming sources.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Smallest window a streaming source may be configured with.
pub const MIN_BUFFER_SIZE: usize = 64;

/// Validate and convert bytes to a UTF-8 string.
/// Uses simdutf8 for SIMD-accelerated validation when the feature is enabled.
#[cfg(feature = "simd-utf8")]
#[inline]
pub(crate) fn validate_utf8(bytes: &[u8]) -> Result<&str, Error> {
    simdutf8::basic::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
}

#[cfg(not(feature = "simd-utf8"))]
#[inline]
pub(crate) fn validate_utf8(bytes: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
}

/// Outcome of one attempt to pull bytes from the source.
enum Fill {
    Loaded,
    Exhausted,
    Failed(Error),
}

/// A buffered cursor over hprose input.
///
/// The readable window is `buf[head..tail]`. Every read either advances
/// `head` or fails by returning a zero/empty result and recording the
/// first error encountered.
pub struct ByteReader<'a> {
    buf: Cow<'a, [u8]>,
    head: usize,
    tail: usize,
    source: Option<Box<dyn Read + 'a>>,
    /// Holds bytes that span more than one window.
    scratch: Vec<u8>,
    error: Option<Error>,
}

impl<'a> ByteReader<'a> {
    /// Create a cursor over a fixed in-memory buffer.
    #[must_use]
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self {
            buf: Cow::Borrowed(data),
            head: 0,
            tail: data.len(),
            source: None,
            scratch: Vec::new(),
            error: None,
        }
    }

    /// Create a cursor that pulls from `reader` through a window of `buffer_size` bytes.
    #[must_use]
    pub fn from_reader<R: Read + 'a>(reader: R, buffer_size: usize) -> Self {
        Self {
            buf: Cow::Owned(vec![0; effective_buffer_size(buffer_size)]),
            head: 0,
            tail: 0,
            source: Some(Box::new(reader)),
            scratch: Vec::new(),
            error: None,
        }
    }

    /// Re-point the cursor at a new in-memory buffer. The error slot is left alone.
    pub fn reset_bytes(&mut self, data: &'a [u8]) {
        self.buf = Cow::Borrowed(data);
        self.head = 0;
        self.tail = data.len();
        self.source = None;
    }

    /// Re-point the cursor at a new streaming source, reusing the window allocation when possible.
    pub fn reset_reader<R: Read + 'a>(&mut self, reader: R) {
        if let Cow::Borrowed(_) = self.buf {
            self.buf = Cow::Owned(vec![0; DEFAULT_BUFFER_SIZE]);
        }
        self.head = 0;
        self.tail = 0;
        self.source = Some(Box::new(reader));
    }

    /// The first error recorded on this cursor, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Record an error unless one is already present.
    pub fn set_error(&mut self, err: Error) {
        match &self.error {
            None => {
                debug!(error = %err, "hprose decode error recorded");
                self.error = Some(err);
            }
            Some(first) => trace!(dropped = %err, first = %first, "later decode error dropped"),
        }
    }

    /// Remove and return the recorded error.
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// Number of bytes buffered and not yet consumed.
    #[inline]
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.tail - self.head
    }

    /// The unconsumed part of the current window.
    #[inline]
    pub(crate) fn window(&self) -> &[u8] {
        &self.buf[self.head..self.tail]
    }

    /// Advance past `n` bytes of the current window.
    #[inline]
    pub(crate) fn advance(&mut self, n: usize) {
        debug_assert!(self.head + n <= self.tail);
        self.head += n;
    }

    /// Read the next byte, or 0 once the input is exhausted or an error has been recorded.
    #[inline]
    pub fn next_byte(&mut self) -> u8 {
        if self.head == self.tail && !self.load_more() {
            return 0;
        }
        let b = self.buf[self.head];
        self.head += 1;
        b
    }

    /// Discard the next byte.
    #[inline]
    pub fn skip(&mut self) {
        self.next_byte();
    }

    /// Read the next `n` bytes. Fewer are returned only at the end of input.
    ///
    /// The slice is valid until the next read.
    pub fn next(&mut self, n: usize) -> &[u8] {
        if self.head == self.tail && n > 0 && !self.load_more() {
            return &[];
        }
        if self.tail - self.head >= n {
            let start = self.head;
            self.head += n;
            return &self.buf[start..start + n];
        }
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.buf[self.head..self.tail]);
        self.head = self.tail;
        let mut needed = n - self.scratch.len();
        while needed > 0 {
            if !self.load_more() {
                break;
            }
            let take = needed.min(self.tail - self.head);
            self.scratch
                .extend_from_slice(&self.buf[self.head..self.head + take]);
            self.head += take;
            needed -= take;
        }
        &self.scratch
    }

    /// Drain everything left in the input.
    ///
    /// Reaching the end here is the expected outcome and is not recorded as an error.
    pub fn remains(&mut self) -> &[u8] {
        if self.error.is_some() {
            return &[];
        }
        if self.source.is_none() {
            let start = self.head;
            self.head = self.tail;
            return &self.buf[start..self.tail];
        }
        self.scratch.clear();
        loop {
            self.scratch
                .extend_from_slice(&self.buf[self.head..self.tail]);
            self.head = self.tail;
            match self.fill() {
                Fill::Loaded => {}
                Fill::Exhausted => break,
                Fill::Failed(err) => {
                    self.set_error(err);
                    break;
                }
            }
        }
        &self.scratch
    }

    /// Read up to `delim`, consuming the delimiter but not returning it.
    ///
    /// Records [`Error::Eof`] and returns what was read when the delimiter never shows up.
    pub fn until(&mut self, delim: u8) -> &[u8] {
        if self.head == self.tail && !self.load_more() {
            return &[];
        }
        if let Some(pos) = memchr::memchr(delim, &self.buf[self.head..self.tail]) {
            let start = self.head;
            self.head += pos + 1;
            return &self.buf[start..start + pos];
        }
        self.scratch.clear();
        loop {
            self.scratch
                .extend_from_slice(&self.buf[self.head..self.tail]);
            self.head = self.tail;
            if !self.load_more() {
                break;
            }
            if let Some(pos) = memchr::memchr(delim, &self.buf[self.head..self.tail]) {
                self.scratch
                    .extend_from_slice(&self.buf[self.head..self.head + pos]);
                self.head += pos + 1;
                break;
            }
        }
        &self.scratch
    }

    /// Refill an exhausted window, recording EOF or I/O failure.
    pub(crate) fn load_more(&mut self) -> bool {
        if self.error.is_some() {
            self.head = self.tail;
            return false;
        }
        match self.fill() {
            Fill::Loaded => true,
            Fill::Exhausted => {
                self.set_error(Error::Eof);
                false
            }
            Fill::Failed(err) => {
                self.set_error(err);
                false
            }
        }
    }

    fn fill(&mut self) -> Fill {
        self.head = self.tail;
        let Some(source) = self.source.as_mut() else {
            return Fill::Exhausted;
        };
        let buf = self.buf.to_mut();
        loop {
            match source.read(buf) {
                Ok(0) => return Fill::Exhausted,
                Ok(n) => {
                    trace!(bytes = n, "refilled decode window");
                    self.head = 0;
                    self.tail = n;
                    return Fill::Loaded;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Fill::Failed(err.into()),
            }
        }
    }
}

/// Clamp a requested window size to the supported range.
#[must_use]
pub fn effective_buffer_size(requested: usize) -> usize {
    if requested == 0 {
        DEFAULT_BUFFER_SIZE
    } else {
        requested.max(MIN_BUFFER_SIZE)
    }
}
