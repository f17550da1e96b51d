use crate::Compression;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Suffix used when a compressed file name carries no recognizable extension.
const UNPACKED_FALLBACK: &str = "out";

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for Compression {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl Compression {
    /// Returns the canonical file extension for this format, with leading dot.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::Bzip2 => ".bz2",
            Compression::Gzip => ".gz",
            Compression::Xz => ".xz",
        }
    }

    /// Returns the short format tag.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Bzip2 => "bz2",
            Compression::Gzip => "gz",
            Compression::Xz => "xz",
        }
    }

    /// The name of the file that this compressed file unpacks to.
    ///
    /// The compression suffix is stripped (`data.csv.gz` becomes `data.csv`),
    /// tarball shorthands become `.tar` (`dump.tgz` becomes `dump.tar`), and a
    /// name without a recognized suffix gets `.out` appended so the target can
    /// never collide with its source.
    #[must_use]
    pub fn unpacked_name(&self, name: &str) -> String {
        let lower = name.to_lowercase();
        let tarballs: &[&str] = match self {
            Compression::Bzip2 => &[".tbz2", ".tbz"],
            Compression::Gzip => &[".tgz"],
            Compression::Xz => &[".txz"],
        };
        for suffix in tarballs {
            if lower.ends_with(suffix) && lower.len() > suffix.len() {
                return format!("{}.tar", &name[..name.len() - suffix.len()]);
            }
        }
        let suffix = self.extension();
        if lower.ends_with(suffix) && lower.len() > suffix.len() {
            return name[..name.len() - suffix.len()].to_string();
        }
        format!("{name}.{UNPACKED_FALLBACK}")
    }
}
