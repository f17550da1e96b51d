//! Getting at the files inside archives and behind URLs.
//!
//! Everything lands under a cache root using the names from [`cache`]. The
//! [`Extractor`] unpacks multi-file archives (7z, zip, rar, tar) into their
//! own directory and compressed streams (gz, bz2, xz) next to them; [`fetch`]
//! downloads remote sources.

pub mod cache;
pub mod error;
mod extract;
mod fetch;
mod path;
pub mod unpack;
mod walk;

pub use crate::extract::Extractor;
pub use crate::fetch::{fetch, fetch_cached};
pub use crate::path::validate;
pub use crate::unpack::{Native, SevenZip, Unpacker, Unpackers};
pub use crate::walk::{Listed, files};
