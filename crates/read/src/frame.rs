//! Assembling data frames from loosely typed cells.
//!
//! Readers that produce values one cell at a time (JSON, Stata, workbooks,
//! databases) push [`Cell`]s into a [`FrameBuilder`]; each column's type is
//! inferred once all of its cells are known.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use polars::prelude::*;
use std::collections::HashMap;

/// A single value as produced by a reader, before its column type is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    fn render(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Str(s) => Some(s.clone()),
        }
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map_or(Cell::Null, Cell::Str)
    }
}

/// Column type inferred from the cells it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inferred {
    Empty,
    Bool,
    Int,
    Float,
    Str,
}

impl Inferred {
    fn widen(self, cell: &Cell) -> Self {
        use Inferred::*;
        match (self, cell) {
            (current, Cell::Null) => current,
            (Empty, Cell::Bool(_)) | (Bool, Cell::Bool(_)) => Bool,
            (Empty, Cell::Int(_)) | (Int, Cell::Int(_)) => Int,
            (Empty | Int | Float, Cell::Float(_)) | (Float, Cell::Int(_)) => Float,
            _ => Str,
        }
    }
}

/// Makes header names usable as frame column names.
///
/// Blank headers become `Unnamed: <position>`; repeats of an earlier name get
/// a `.<n>` suffix that does not collide with any other header.
pub fn unique_headers(headers: impl IntoIterator<Item = Option<String>>) -> Vec<String> {
    let headers: Vec<String> = headers
        .into_iter()
        .enumerate()
        .map(|(i, header)| match header {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("Unnamed: {i}"),
        })
        .collect();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut taken: std::collections::HashSet<String> = headers.iter().cloned().collect();
    let mut result = Vec::with_capacity(headers.len());
    for header in headers {
        let count = seen.entry(header.clone()).or_insert(0);
        if *count == 0 {
            *count = 1;
            result.push(header);
            continue;
        }
        let mut candidate = format!("{header}.{count}");
        while taken.contains(&candidate) {
            *count += 1;
            candidate = format!("{header}.{count}");
        }
        *count += 1;
        taken.insert(candidate.clone());
        result.push(candidate);
    }
    result
}

/// Column-major accumulator of [`Cell`]s.
#[derive(Debug, Default)]
pub struct FrameBuilder {
    names: Vec<String>,
    columns: Vec<Vec<Cell>>,
    rows: usize,
}

impl FrameBuilder {
    /// Start a frame with the given (already unique) column names.
    pub fn new(names: Vec<String>) -> Self {
        let columns = names.iter().map(|_| Vec::new()).collect();
        Self { names, columns, rows: 0 }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Index of `name`, appending a new column backfilled with nulls if unseen.
    pub fn column_index(&mut self, name: &str) -> usize {
        if let Some(index) = self.names.iter().position(|n| n == name) {
            return index;
        }
        self.names.push(name.to_string());
        self.columns.push(vec![Cell::Null; self.rows]);
        self.names.len() - 1
    }

    /// Append a row. Short rows are padded with nulls, extra cells get
    /// `Unnamed: <position>` columns.
    pub fn push_row(&mut self, cells: impl IntoIterator<Item = Cell>) {
        let mut width = 0;
        for (i, cell) in cells.into_iter().enumerate() {
            if i >= self.columns.len() {
                let name = unique_headers(self.names.iter().cloned().map(Some).chain([None]))
                    .pop()
                    .unwrap_or_else(|| format!("Unnamed: {i}"));
                self.names.push(name);
                self.columns.push(vec![Cell::Null; self.rows]);
            }
            self.columns[i].push(cell);
            width = i + 1;
        }
        for column in &mut self.columns[width..] {
            column.push(Cell::Null);
        }
        self.rows += 1;
    }

    /// Append a row given as `(column name, cell)` pairs.
    pub fn push_record(&mut self, record: impl IntoIterator<Item = (String, Cell)>) {
        let mut row = vec![Cell::Null; self.columns.len()];
        for (name, cell) in record {
            let index = self.column_index(&name);
            if index >= row.len() {
                row.resize(index + 1, Cell::Null);
            }
            row[index] = cell;
        }
        self.push_row(row);
    }

    pub fn finish(self) -> Result<DataFrame> {
        let columns = self
            .names
            .into_iter()
            .zip(self.columns)
            .map(|(name, cells)| Column::from(series(&name, cells)))
            .collect::<Vec<_>>();
        DataFrame::new(columns).or_raise(|| ErrorKind::Frame)
    }
}

fn series(name: &str, cells: Vec<Cell>) -> Series {
    let inferred = cells.iter().fold(Inferred::Empty, |acc, cell| acc.widen(cell));
    match inferred {
        Inferred::Bool => {
            let values: Vec<Option<bool>> = cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Bool(b) => Some(b),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        },
        Inferred::Int => {
            let values: Vec<Option<i64>> = cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Int(i) => Some(i),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        },
        // All-null columns are numeric, like a column of NaN.
        Inferred::Float | Inferred::Empty => {
            let values: Vec<Option<f64>> = cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Int(i) => Some(i as f64),
                    Cell::Float(f) if !f.is_nan() => Some(f),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        },
        Inferred::Str => {
            let values: Vec<Option<String>> = cells.iter().map(Cell::render).collect();
            Series::new(name.into(), values)
        },
    }
}
