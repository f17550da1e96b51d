//! JSON documents shaped like a table.
//!
//! Accepted layouts:
//!
//! - records: `[{"a": 1, "b": 2}, ...]`
//! - rows: `[[1, 2], ...]` or bare scalars `[1, 2, ...]`
//! - columns: `{"a": {"0": 1, "1": 2}, ...}` or `{"a": [1, 2], ...}`
//! - a flat object of scalars, which becomes a single row

use crate::error::{ErrorKind, Result};
use crate::frame::{Cell, FrameBuilder};
use exn::ResultExt;
use polars::prelude::DataFrame;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::instrument;

const FORMAT: &str = "json";

fn cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map_or(Cell::Null, Cell::Float),
        },
        Value::String(s) => Cell::Str(s),
        nested => Cell::Str(nested.to_string()),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn parse_error(reason: &str) -> exn::Exn<ErrorKind> {
    exn::Exn::from(ErrorKind::Parse { format: FORMAT, reason: reason.to_string() })
}

/// Convert a parsed document into a frame.
pub fn frame(value: Value) -> Result<DataFrame> {
    let mut builder = FrameBuilder::default();
    match value {
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(record) => builder.push_record(record.into_iter().map(|(k, v)| (k, cell(v)))),
                    Value::Array(row) => builder.push_row(row.into_iter().map(cell)),
                    scalar => builder.push_row([cell(scalar)]),
                }
            }
        },
        Value::Object(map) if map.values().all(is_scalar) => {
            builder.push_record(map.into_iter().map(|(k, v)| (k, cell(v))));
        },
        Value::Object(map) => columns(&mut builder, map)?,
        _ => return Err(parse_error("a scalar document is not a table")),
    }
    builder.finish()
}

/// Column-oriented layout: every value is itself an index-keyed object or an array.
///
/// Rows follow the order in which index keys first appear.
fn columns(builder: &mut FrameBuilder, map: Map<String, Value>) -> Result<()> {
    let mut index: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut table: Vec<HashMap<String, Value>> = Vec::with_capacity(map.len());
    for (name, column) in map {
        let column: HashMap<String, Value> = match column {
            Value::Object(values) => values.into_iter().collect(),
            Value::Array(values) => values.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
            _ => return Err(parse_error("mixed scalar and nested columns")),
        };
        for key in column.keys() {
            if seen.insert(key.clone()) {
                index.push(key.clone());
            }
        }
        builder.column_index(&name);
        table.push(column);
    }
    for key in &index {
        let row = table.iter_mut().map(|column| column.remove(key).map_or(Cell::Null, cell));
        builder.push_row(row.collect::<Vec<_>>());
    }
    Ok(())
}

/// Parse a document from text.
pub fn parse(text: &str) -> Result<DataFrame> {
    let value: Value = serde_json::from_str(text.trim_start_matches('\u{FEFF}'))
        .or_raise(|| ErrorKind::Parse { format: FORMAT, reason: "invalid JSON".to_string() })?;
    frame(value)
}

/// Read a whole JSON file.
#[instrument(fields(path = %path.display(), rows))]
pub fn read(path: &Path) -> Result<DataFrame> {
    let text = std::fs::read_to_string(path).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    let df = parse(&text)?;
    tracing::Span::current().record("rows", df.height());
    Ok(df)
}

/// Cheap check that `path` can hold a JSON table: the first non-blank byte
/// opens an array or object.
pub fn looks_like(path: &Path) -> bool {
    use std::io::Read;
    let mut head = [0u8; 512];
    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    let Ok(read) = file.read(&mut head) else {
        return false;
    };
    let head = head[..read].strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&head[..read]);
    matches!(head.iter().find(|b| !b.is_ascii_whitespace()), Some(b'[' | b'{'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::DataType;
    use rstest::rstest;

    #[rstest]
    #[case(r#"[{"a": 1, "b": "x"}, {"a": 2, "b": "y"}]"#, (2, 2))]
    #[case(r#"[{"a": 1}, {"b": 2}]"#, (2, 2))]
    #[case(r#"[[1, 2, 3], [4, 5, 6]]"#, (2, 3))]
    #[case(r#"[1, 2, 3]"#, (3, 1))]
    #[case(r#"{"a": {"0": 1, "1": 2}, "b": {"0": 3, "1": 4}}"#, (2, 2))]
    #[case(r#"{"a": [1, 2, 3], "b": [4, 5, 6]}"#, (3, 2))]
    #[case(r#"{"a": 1, "b": "two", "c": null}"#, (1, 3))]
    #[case(r#"[]"#, (0, 0))]
    fn shapes(#[case] text: &str, #[case] shape: (usize, usize)) {
        assert_eq!(parse(text).unwrap().shape(), shape);
    }

    #[rstest]
    #[case("42")]
    #[case(r#""text""#)]
    #[case(r#"{"a": [1], "b": 2}"#)]
    #[case("a,b\n1,2")]
    fn rejects(#[case] text: &str) {
        assert!(parse(text).is_err());
    }

    #[test]
    fn column_orientation_aligns_on_index() {
        let df = parse(r#"{"a": {"0": 1, "1": 2}, "b": {"1": 3.5}}"#).unwrap();
        assert_eq!(df.dtypes(), [DataType::Int64, DataType::Float64]);
        assert_eq!(df.column("b").unwrap().null_count(), 1);
    }

    #[test]
    fn wide_column_orientation() {
        let n = 50_000;
        let a: Map<String, Value> = (0..n).map(|i| (i.to_string(), Value::from(i))).collect();
        let b: Map<String, Value> = (0..n).rev().map(|i| (i.to_string(), Value::from(i * 2))).collect();
        let df = frame(serde_json::json!({"a": a, "b": b})).unwrap();
        assert_eq!(df.shape(), (n as usize, 2));
        let b = df.column("b").unwrap().as_materialized_series().clone();
        assert_eq!(b.i64().unwrap().get(0), Some(0));
        assert_eq!(b.i64().unwrap().get(7), Some(14));
    }

    #[test]
    fn nested_values_become_text() {
        let df = parse(r#"[{"a": {"x": 1}}, {"a": [1, 2]}]"#).unwrap();
        assert_eq!(df.dtypes(), [DataType::String]);
    }

    #[test]
    fn sniff() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("a");
        std::fs::write(&json, "\n  [1]").unwrap();
        let csv = dir.path().join("b");
        std::fs::write(&csv, "a,b\n").unwrap();
        assert!(looks_like(&json));
        assert!(!looks_like(&csv));
        assert!(!looks_like(&dir.path().join("missing")));
    }
}
