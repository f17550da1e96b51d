//! Format Error Types

use derive_more::{Display, Error};

/// A format error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for format operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The tag does not name a known format.
    #[display("unknown format: {_0}")]
    UnknownFormat(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
