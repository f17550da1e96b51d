//! Single-stream decompression with format detection.
//!
//! Gzip, bzip2 and xz each wrap exactly one file. This crate detects them
//! ([`Compression::from_path`], [`Compression::from_magic_bytes`]), names the
//! file they unpack to ([`Compression::unpacked_name`]) and streams the
//! decompressed bytes to disk ([`Compression::unpack_file`]).
//!
//! Concatenated members (as produced by `pigz` or `pbzip2`) are decoded as a
//! single stream.

mod construct;
pub mod error;
mod ops;
mod util;

/// A supported single-file compression format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    Xz,
}
