//! Reader Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A read error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for read operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source could not be opened or read.
    #[display("unable to read {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// No configured encoding both decoded and parsed the source.
    #[display("unable to decode {} with encodings: {}", path.display(), tried.join(", "))]
    Encoding {
        /// The source that could not be decoded.
        path: PathBuf,
        /// Names of the encodings attempted, in order.
        tried: Vec<String>,
    },
    /// The source decoded but its contents are not valid for the format.
    #[display("malformed {format}: {reason}")]
    Parse {
        /// The format tag of the reader that failed.
        format: &'static str,
        /// What was wrong with the contents.
        reason: String,
    },
    /// A data frame could not be assembled from the parsed values.
    #[display("unable to build data frame")]
    Frame,
    /// Connecting to, or querying, a database failed.
    #[display("database error: {_0}")]
    Database(#[error(not(source))] String),
    /// The identifier is not a connection string for a supported database.
    #[display("cannot process source {_0}")]
    UnsupportedSource(#[error(not(source))] String),
    /// The format is recognized, but reading it is not available in this build.
    #[display("reading {_0} is not supported")]
    Unsupported(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io(_) | ErrorKind::Database(_))
    }
}
