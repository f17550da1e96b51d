//! Command-line Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("unable to describe {_0}")]
    Metadata(#[error(not(source))] String),
    #[display("unable to write output")]
    Output,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
