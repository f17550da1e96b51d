use crate::Compression;
use std::path::Path;

const BZIP2_MAGIC: [u8; 3] = *b"BZh";
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];

impl Compression {
    /// Detect compression from a file extension, including the tarball
    /// shorthands (`.tgz`, `.tbz`, `.tbz2`, `.txz`).
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "bz2" | "tbz" | "tbz2" => Some(Compression::Bzip2),
            "gz" | "tgz" => Some(Compression::Gzip),
            "xz" | "txz" => Some(Compression::Xz),
            _ => None,
        }
    }

    /// Detect compression from the leading bytes of a file.
    ///
    /// Returns `None` when no signature matches or the input is too short.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&BZIP2_MAGIC) {
            return Some(Compression::Bzip2);
        }
        if bytes.starts_with(&GZIP_MAGIC) {
            return Some(Compression::Gzip);
        }
        if bytes.starts_with(&XZ_MAGIC) {
            return Some(Compression::Xz);
        }
        None
    }
}
