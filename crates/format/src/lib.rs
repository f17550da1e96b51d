//! The closed set of source formats, and how to recognize them.
//!
//! [`detect`] classifies a path by extension, then by file signature, then by
//! trying to parse it as JSON and as delimited text. A path that matches
//! none of these is unclassified, which is not an error.

mod detect;
pub mod error;
mod signature;

pub use crate::detect::detect;
pub use crate::signature::from_signature;

use crate::error::{Error, ErrorKind};
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;
use tabmeta_compress::Compression;

/// Format tag of a node in a metadata tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Dir,
    SevenZip,
    Zip,
    Rar,
    Tar,
    Xz,
    Gz,
    Bz2,
    Sqlite3,
    Hdf5,
    Xls,
    Xlsx,
    Csv,
    Json,
    Dta,
    /// A table inside a database, workbook or store.
    Table,
    /// A database, or a schema within one.
    Sql,
}

impl Format {
    pub const ALL: [Format; 17] = [
        Format::Dir,
        Format::SevenZip,
        Format::Zip,
        Format::Rar,
        Format::Tar,
        Format::Xz,
        Format::Gz,
        Format::Bz2,
        Format::Sqlite3,
        Format::Hdf5,
        Format::Xls,
        Format::Xlsx,
        Format::Csv,
        Format::Json,
        Format::Dta,
        Format::Table,
        Format::Sql,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Dir => "dir",
            Format::SevenZip => "7z",
            Format::Zip => "zip",
            Format::Rar => "rar",
            Format::Tar => "tar",
            Format::Xz => "xz",
            Format::Gz => "gz",
            Format::Bz2 => "bz2",
            Format::Sqlite3 => "sqlite3",
            Format::Hdf5 => "hdf5",
            Format::Xls => "xls",
            Format::Xlsx => "xlsx",
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Dta => "dta",
            Format::Table => "table",
            Format::Sql => "sql",
        }
    }

    /// Map a file extension (without the dot, any case) to a format.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        Some(match extension.to_lowercase().as_str() {
            "7z" | "7zip" => Format::SevenZip,
            "zip" => Format::Zip,
            "rar" => Format::Rar,
            "tar" => Format::Tar,
            "xz" | "txz" => Format::Xz,
            "gz" | "tgz" => Format::Gz,
            "bz2" | "tbz" | "tbz2" => Format::Bz2,
            "db" | "sqlite" | "sqlite3" => Format::Sqlite3,
            "h5" | "hdf5" => Format::Hdf5,
            "xls" => Format::Xls,
            "xlsx" => Format::Xlsx,
            "csv" => Format::Csv,
            "json" => Format::Json,
            "dta" => Format::Dta,
            _ => return None,
        })
    }

    /// Map a path's extension to a format.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref().extension().and_then(|ext| ext.to_str()).and_then(Self::from_extension)
    }

    /// Multi-file containers, extracted into a directory.
    #[must_use]
    pub fn is_archive(&self) -> bool {
        matches!(self, Format::SevenZip | Format::Zip | Format::Rar | Format::Tar)
    }

    /// Single-file compression streams.
    #[must_use]
    pub fn compression(&self) -> Option<Compression> {
        match self {
            Format::Gz => Some(Compression::Gzip),
            Format::Bz2 => Some(Compression::Bzip2),
            Format::Xz => Some(Compression::Xz),
            _ => None,
        }
    }
}

impl From<Compression> for Format {
    fn from(compression: Compression) -> Self {
        match compression {
            Compression::Gzip => Format::Gz,
            Compression::Bzip2 => Format::Bz2,
            Compression::Xz => Format::Xz,
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::from(ErrorKind::UnknownFormat(s.to_string())))
    }
}

impl Serialize for Format {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("data.7z", Some(Format::SevenZip))]
    #[case("data.7ZIP", Some(Format::SevenZip))]
    #[case("data.zip", Some(Format::Zip))]
    #[case("data.rar", Some(Format::Rar))]
    #[case("data.tar", Some(Format::Tar))]
    #[case("data.csv.xz", Some(Format::Xz))]
    #[case("data.csv.gz", Some(Format::Gz))]
    #[case("data.tgz", Some(Format::Gz))]
    #[case("data.csv.bz2", Some(Format::Bz2))]
    #[case("data.db", Some(Format::Sqlite3))]
    #[case("data.sqlite3", Some(Format::Sqlite3))]
    #[case("data.h5", Some(Format::Hdf5))]
    #[case("data.hdf5", Some(Format::Hdf5))]
    #[case("data.xls", Some(Format::Xls))]
    #[case("data.XLSX", Some(Format::Xlsx))]
    #[case("data.csv", Some(Format::Csv))]
    #[case("data.json", Some(Format::Json))]
    #[case("data.dta", Some(Format::Dta))]
    #[case("data.txt", None)]
    #[case("data", None)]
    fn extensions(#[case] path: &str, #[case] expected: Option<Format>) {
        assert_eq!(Format::from_path(path), expected);
    }

    #[test]
    fn tags_round_trip() {
        for format in Format::ALL {
            assert_eq!(format.to_string().parse::<Format>().unwrap(), format);
        }
        assert!("parquet".parse::<Format>().is_err());
    }

    #[test]
    fn serializes_as_tag() {
        assert_eq!(serde_json::to_string(&Format::SevenZip).unwrap(), r#""7z""#);
    }

    #[rstest]
    #[case(Format::Zip, true, None)]
    #[case(Format::Tar, true, None)]
    #[case(Format::Gz, false, Some(Compression::Gzip))]
    #[case(Format::Csv, false, None)]
    fn classes(#[case] format: Format, #[case] archive: bool, #[case] compression: Option<Compression>) {
        assert_eq!(format.is_archive(), archive);
        assert_eq!(format.compression(), compression);
        if let Some(compression) = compression {
            assert_eq!(Format::from(compression), format);
        }
    }
}
