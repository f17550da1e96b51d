//! Metadata trees over tabular data sources.
//!
//! A source (file, directory, archive, URL or database) is described in three
//! passes:
//!
//! 1. [`Builder::build`] classifies the source and recurses into containers,
//!    giving every dataset a deferred [`ReadCommand`](tabmeta_read::ReadCommand).
//! 2. [`Materializer::run`] executes the commands and attaches column
//!    statistics and previews.
//! 3. [`merge`] collapses sibling datasets with identical column names into
//!    back-references.
//!
//! [`metadata`] runs all three.

mod build;
pub mod error;
mod export;
mod materialize;
mod merge;
mod node;
pub mod outline;
pub mod stats;

pub use crate::build::Builder;
pub use crate::export::Export;
pub use crate::materialize::{Materializer, materialize};
pub use crate::merge::merge;
pub use crate::node::{ColumnStat, Columns, Content, MetaNode, Moments, Preview, Stats, Walk};

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use tabmeta_config::Config;
use tabmeta_read::{DataFrame, ReadOptions};
use tracing::instrument;

/// Build, materialize and merge the tree for `source`, optionally limited to
/// the named `tables`.
#[instrument(skip(config))]
pub fn metadata(source: &str, tables: Option<&[String]>, config: &Config) -> Result<MetaNode> {
    let mut tree = Builder::new(config).tables(tables).build(source)?;
    materialize(&mut tree, config);
    merge(&mut tree);
    Ok(tree)
}

impl MetaNode {
    /// Read this node's dataset again, with `options` rather than the row
    /// cap used for statistics.
    pub fn data(&self, options: &ReadOptions) -> Result<DataFrame> {
        let command = self.command().ok_or_raise(|| ErrorKind::Read(format!("{} has no dataset", self.label())))?;
        command.read(options).map_err(ErrorKind::read)
    }
}
