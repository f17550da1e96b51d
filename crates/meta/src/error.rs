//! Metadata Error Types
//!
//! Most failures while building or materializing a tree are recorded on the
//! node they concern. Only failures with no node to attach to surface as
//! these errors.

use derive_more::{Display, Error};

/// A metadata error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Not a path, URL or connection string this crate can describe.
    #[display("cannot process source {_0}")]
    UnsupportedSource(#[error(not(source))] String),
    /// Descending into a container failed.
    #[display("{_0}")]
    Build(#[error(not(source))] String),
    /// Running a read command failed.
    #[display("{_0}")]
    Read(#[error(not(source))] String),
}

impl ErrorKind {
    /// Re-raise an error from a lower crate as [`ErrorKind::Build`], keeping
    /// its message and its frame.
    #[track_caller]
    pub fn build<E>(err: exn::Exn<E>) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = (*err).to_string();
        err.raise(ErrorKind::Build(message))
    }

    /// Re-raise an error from a lower crate as [`ErrorKind::Read`].
    #[track_caller]
    pub fn read<E>(err: exn::Exn<E>) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = (*err).to_string();
        err.raise(ErrorKind::Read(message))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_errors_keep_their_message() {
        let inner = exn::Exn::from(tabmeta_read::error::ErrorKind::Unsupported("hdf5"));
        let err = ErrorKind::build(inner);
        assert_eq!(*err, ErrorKind::Build("reading hdf5 is not supported".to_string()));
    }
}
