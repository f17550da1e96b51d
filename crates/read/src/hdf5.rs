//! HDF5 stores written by pandas' fixed format.
//!
//! A store key is a group holding `axis0` (column labels) plus one or more
//! `block<n>_items`/`block<n>_values` pairs. Numeric blocks are read; string
//! blocks (pickled objects) are not.
//!
//! Needs the system HDF5 library, so it is only compiled with the `hdf5`
//! feature. Without it, listing and reading fail with
//! [`ErrorKind::Unsupported`].

use crate::error::Result;
#[cfg(not(feature = "hdf5"))]
use crate::error::ErrorKind;
use polars::prelude::DataFrame;
use std::path::Path;

/// Groups whose name contains this are bookkeeping for categorical columns.
const CATEGORICAL_BLOCK: &str = "values_block_";

#[cfg(feature = "hdf5")]
mod store {
    use super::CATEGORICAL_BLOCK;
    use crate::error::{ErrorKind, Result};
    use crate::frame::{Cell, FrameBuilder, unique_headers};
    use exn::ResultExt;
    use hdf5::types::VarLenUnicode;
    use polars::prelude::DataFrame;
    use std::path::Path;

    fn failed(path: &Path) -> ErrorKind {
        ErrorKind::Io(path.to_path_buf())
    }

    fn collect_keys(group: &hdf5::Group, prefix: &str, keys: &mut Vec<String>) -> hdf5::Result<()> {
        for name in group.member_names()? {
            let Ok(child) = group.group(&name) else {
                continue;
            };
            let key = format!("{prefix}/{name}");
            if child.link_exists("axis0") || child.link_exists("table") {
                keys.push(key);
            } else {
                collect_keys(&child, &key, keys)?;
            }
        }
        Ok(())
    }

    pub fn keys(path: &Path) -> Result<Vec<String>> {
        let file = hdf5::File::open(path).or_raise(|| failed(path))?;
        let mut keys = Vec::new();
        collect_keys(&file, "", &mut keys).or_raise(|| failed(path))?;
        keys.retain(|key| !key.contains(CATEGORICAL_BLOCK));
        Ok(keys)
    }

    fn labels(dataset: &hdf5::Dataset) -> Option<Vec<String>> {
        dataset.read_raw::<VarLenUnicode>().ok().map(|labels| labels.iter().map(|l| l.as_str().to_string()).collect())
    }

    pub fn read(path: &Path, key: &str, max_rows: usize) -> Result<DataFrame> {
        let file = hdf5::File::open(path).or_raise(|| failed(path))?;
        let group = file.group(key).or_raise(|| ErrorKind::Parse { format: "hdf5", reason: format!("no key {key}") })?;
        let mut names = Vec::new();
        let mut columns: Vec<Vec<Cell>> = Vec::new();
        let mut block = 0;
        while let Ok(values) = group.dataset(&format!("block{block}_values")) {
            let shape = values.shape();
            let (rows, width) = match shape.as_slice() {
                [rows, width] => (*rows, *width),
                [rows] => (*rows, 1),
                _ => (0, 0),
            };
            let items = group.dataset(&format!("block{block}_items")).ok().and_then(|items| labels(&items));
            let data = values.read_raw::<f64>().ok();
            for column in 0..width {
                names.push(items.as_ref().and_then(|items| items.get(column).cloned()));
                let cells = match &data {
                    Some(data) => (0..rows.min(max_rows))
                        .map(|row| match data[row * width + column] {
                            v if v.is_nan() => Cell::Null,
                            v => Cell::Float(v),
                        })
                        .collect(),
                    None => Vec::new(),
                };
                columns.push(cells);
            }
            block += 1;
        }
        let height = columns.iter().map(Vec::len).max().unwrap_or(0);
        let mut builder = FrameBuilder::new(unique_headers(names));
        for row in 0..height {
            builder.push_row(columns.iter().map(|column| column.get(row).cloned().unwrap_or(Cell::Null)));
        }
        builder.finish()
    }
}

/// Store keys, excluding categorical bookkeeping groups.
pub fn keys(path: &Path) -> Result<Vec<String>> {
    #[cfg(feature = "hdf5")]
    {
        store::keys(path)
    }
    #[cfg(not(feature = "hdf5"))]
    {
        tracing::debug!(path = %path.display(), "hdf5 support not compiled in");
        exn::bail!(ErrorKind::Unsupported("hdf5"))
    }
}

/// Read at most `max_rows` rows stored under `key`.
pub fn read(path: &Path, key: &str, max_rows: usize) -> Result<DataFrame> {
    #[cfg(feature = "hdf5")]
    {
        store::read(path, key, max_rows)
    }
    #[cfg(not(feature = "hdf5"))]
    {
        tracing::debug!(path = %path.display(), key, max_rows, "hdf5 support not compiled in");
        exn::bail!(ErrorKind::Unsupported("hdf5"))
    }
}

/// Whether `key` names categorical bookkeeping rather than a table.
pub fn is_bookkeeping(key: &str) -> bool {
    key.contains(CATEGORICAL_BLOCK)
}
