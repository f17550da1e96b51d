//! Archive Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;
use tabmeta_compress::error::{Error as CompressionError, ErrorKind as CompressionErrorKind};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading the archive or writing into the cache failed.
    #[display("I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The external unpacker exited unsuccessfully.
    #[display("`{command}` exited with {status}: {output}")]
    ExtractionFailed { command: String, status: String, output: String },
    /// No binary able to unpack this format was found.
    #[display("{_0} not found on PATH")]
    ToolNotFound(#[error(not(source))] &'static str),
    /// Archive member escapes the extraction directory.
    #[display("invalid member path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// The format is not an archive or compressed stream.
    #[display("cannot extract format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// Download failed or returned nothing.
    #[display("fetch failed: {_0}")]
    Fetch(#[error(not(source))] String),
    /// Single-stream decompression failed.
    #[display("compression error: {_0}")]
    Compression(CompressionErrorKind),
}

impl ErrorKind {
    /// Convert a compression error into an archive error, keeping the
    /// compress crate's `Exn` frame as a child in the error tree.
    #[track_caller]
    pub fn compression(err: CompressionError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Compression(inner))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Fetch(_))
    }
}
