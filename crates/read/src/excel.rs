//! Workbooks (`.xls`, `.xlsx`). Each sheet is a table whose first row is the header.

use crate::error::{ErrorKind, Result};
use crate::frame::{Cell, FrameBuilder, unique_headers};
use calamine::{Data, Reader, open_workbook_auto};
use exn::ResultExt;
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::instrument;

fn cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::Bool(b) => Cell::Bool(*b),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::String(s) => Cell::Str(s.clone()),
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Str(s.clone()),
    }
}

fn header(data: &Data) -> Option<String> {
    match data {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Sheet names, in workbook order.
#[instrument(fields(path = %path.display()))]
pub fn sheet_names(path: &Path) -> Result<Vec<String>> {
    let workbook = open_workbook_auto(path).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    Ok(workbook.sheet_names())
}

/// Read one sheet in full.
#[instrument(fields(path = %path.display(), rows))]
pub fn read(path: &Path, sheet: &str) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    let range = workbook
        .worksheet_range(sheet)
        .or_raise(|| ErrorKind::Parse { format: "xlsx", reason: format!("unreadable sheet {sheet}") })?;
    let mut rows = range.rows();
    let names = match rows.next() {
        Some(first) => unique_headers(first.iter().map(header)),
        None => Vec::new(),
    };
    let mut builder = FrameBuilder::new(names);
    for row in rows {
        builder.push_row(row.iter().map(cell));
    }
    let df = builder.finish()?;
    tracing::Span::current().record("rows", df.height());
    Ok(df)
}
