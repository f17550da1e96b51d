//! Deferred reads of tabular data.
//!
//! A [`ReadCommand`] names a reader and its arguments without touching the
//! source; [`ReadCommand::read`] runs it and returns a [`DataFrame`]. Readers
//! that can stop early (delimited text, Stata, databases, HDF5) read at most
//! [`ReadOptions::max_rows`] rows; JSON documents and workbook sheets are read
//! in full.

pub mod csv;
pub mod dta;
pub mod encoding;
pub mod error;
pub mod excel;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod frame;
pub mod hdf5;
pub mod json;
pub mod sql;

use crate::error::Result;
use encoding_rs::Encoding;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use tabmeta_config::Config;
use tracing::instrument;

pub use polars::prelude::DataFrame;

/// Reader settings taken from the [`Config`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub max_rows: usize,
    pub encodings: Vec<&'static Encoding>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ReadOptions {
    fn from(config: &Config) -> Self {
        Self { max_rows: config.max_rows, encodings: config.encodings() }
    }
}

/// A deferred read: which reader to run, and on what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadCommand {
    Csv(PathBuf),
    Json(PathBuf),
    Dta(PathBuf),
    /// One sheet of an `.xls` or `.xlsx` workbook.
    Xlsx {
        path: PathBuf,
        sheet: String,
    },
    /// One key of an HDF5 store.
    Hdf5 {
        path: PathBuf,
        key: String,
    },
    /// One table reachable through a database connection string.
    Sql {
        table: String,
        connection: String,
        schema: Option<String>,
    },
}

impl ReadCommand {
    /// The reader's tag, as used in serialized commands.
    pub fn name(&self) -> &'static str {
        match self {
            ReadCommand::Csv(_) => "csv",
            ReadCommand::Json(_) => "json",
            ReadCommand::Dta(_) => "dta",
            ReadCommand::Xlsx { .. } => "xlsx",
            ReadCommand::Hdf5 { .. } => "hdf5",
            ReadCommand::Sql { .. } => "sql",
        }
    }

    /// The file this command reads, if it reads a file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ReadCommand::Csv(path) | ReadCommand::Json(path) | ReadCommand::Dta(path) => Some(path),
            ReadCommand::Xlsx { path, .. } | ReadCommand::Hdf5 { path, .. } => Some(path),
            ReadCommand::Sql { .. } => None,
        }
    }

    /// Whether the reader honours [`ReadOptions::max_rows`]. Other readers
    /// always load the whole table.
    pub fn is_chunked(&self) -> bool {
        matches!(self, ReadCommand::Csv(_) | ReadCommand::Dta(_) | ReadCommand::Hdf5 { .. } | ReadCommand::Sql { .. })
    }

    fn arguments(&self) -> Vec<String> {
        match self {
            ReadCommand::Csv(path) | ReadCommand::Json(path) | ReadCommand::Dta(path) => {
                vec![path.display().to_string()]
            },
            ReadCommand::Xlsx { path, sheet } => vec![path.display().to_string(), sheet.clone()],
            ReadCommand::Hdf5 { path, key } => vec![path.display().to_string(), key.clone()],
            ReadCommand::Sql { table, connection, schema } => {
                let mut arguments = vec![table.clone(), connection.clone()];
                arguments.extend(schema.clone());
                arguments
            },
        }
    }

    /// Run the reader.
    #[instrument(skip(options), fields(command = %self))]
    pub fn read(&self, options: &ReadOptions) -> Result<DataFrame> {
        match self {
            ReadCommand::Csv(path) => csv::read(path, options),
            ReadCommand::Json(path) => json::read(path),
            ReadCommand::Dta(path) => dta::read(path, options),
            ReadCommand::Xlsx { path, sheet } => excel::read(path, sheet),
            ReadCommand::Hdf5 { path, key } => hdf5::read(path, key, options.max_rows),
            ReadCommand::Sql { table, connection, schema } => {
                sql::Connection::parse(connection)?.read(table, schema.as_deref(), options.max_rows)
            },
        }
    }
}

impl Display for ReadCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.name(), self.arguments().join(":"))
    }
}

/// Serialized as a flat list: `["csv", path]`, `["xlsx", path, sheet]`, `["sql", table, connection]`.
impl Serialize for ReadCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let arguments = self.arguments();
        let mut seq = serializer.serialize_seq(Some(arguments.len() + 1))?;
        seq.serialize_element(self.name())?;
        for argument in &arguments {
            seq.serialize_element(argument)?;
        }
        seq.end()
    }
}
