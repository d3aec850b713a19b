//! Line framing for process output streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a configurable maximum line
//! length so a child that never emits a newline cannot make the relay
//! allocate without bound.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use linecast::codec::LineCodec;
//!
//! let reader = FramedRead::new(child_stdout, LineCodec::new());
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

/// Default maximum line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited UTF-8 codec with a maximum line length.
///
/// Both `\n` and `\r\n` terminators are accepted on decode; the terminator
/// is stripped. Lines longer than the limit return
/// [`LineCodecError::TooLong`] and decoding resumes at the next newline.
#[derive(Debug)]
pub struct LineCodec {
    inner: LinesCodec,
    max_line_bytes: usize,
}

/// Decoding failures of [`LineCodec`].
#[derive(Debug)]
pub enum LineCodecError {
    /// A line exceeded the configured limit and was discarded.
    TooLong(usize),
    /// The underlying stream failed.
    Io(std::io::Error),
}

impl std::fmt::Display for LineCodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLong(max) => write!(f, "line too long: exceeded {max} bytes"),
            Self::Io(err) => write!(f, "io: {err}"),
        }
    }
}

impl std::error::Error for LineCodecError {}

impl From<std::io::Error> for LineCodecError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl LineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom limit (clamped to at least 1 byte).
    #[must_use]
    pub fn with_max_length(max_line_bytes: usize) -> Self {
        let max_line_bytes = max_line_bytes.max(1);
        Self {
            inner: LinesCodec::new_with_max_length(max_line_bytes),
            max_line_bytes,
        }
    }

    /// The configured limit.
    #[must_use]
    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    fn map_error(&self, e: LinesCodecError) -> LineCodecError {
        match e {
            LinesCodecError::MaxLineLengthExceeded => LineCodecError::TooLong(self.max_line_bytes),
            LinesCodecError::Io(io_err) => LineCodecError::Io(io_err),
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LineCodecError;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        self.inner.decode(src).map_err(|e| self.map_error(e))
    }

    fn decode_eof(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        self.inner.decode_eof(src).map_err(|e| self.map_error(e))
    }
}
