//! Delimited text.

use crate::ReadOptions;
use crate::encoding::read_encoded;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;
use tracing::instrument;

/// Parse already-decoded delimited text with a header row.
pub fn parse(text: &str, max_rows: usize) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_n_rows(Some(max_rows))
        .with_infer_schema_length(Some(max_rows))
        .into_reader_with_file_handle(Cursor::new(text.as_bytes()))
        .finish()
        .or_raise(|| ErrorKind::Parse { format: "csv", reason: "not delimited text".to_string() })
}

/// The leading bytes of `reader` up to the end of the header and `max_rows`
/// further records. Blank lines are not records, and a line ending inside a
/// quoted field continues the record.
pub fn head(mut reader: impl BufRead, max_rows: usize) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut records = 0;
    let mut quoted = false;
    while records <= max_rows {
        let start = buffer.len();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        // UTF-16LE: the newline's high byte is the first byte of the next read.
        if buffer.len() % 2 == 1 && reader.fill_buf()?.first() == Some(&0) {
            buffer.push(0);
            reader.consume(1);
        }
        let line = &buffer[start..];
        quoted ^= line.iter().filter(|b| **b == b'"').count() % 2 == 1;
        if !quoted && line.iter().any(|b| !b.is_ascii_whitespace() && *b != 0) {
            records += 1;
        }
    }
    Ok(buffer)
}

/// Read at most `options.max_rows` rows of a delimited file. Only those rows
/// are loaded, decoded and checked against the encodings.
#[instrument(skip(options), fields(path = %path.display(), rows))]
pub fn read(path: &Path, options: &ReadOptions) -> Result<DataFrame> {
    let failed = || ErrorKind::Io(path.to_path_buf());
    let file = File::open(path).or_raise(failed)?;
    let bytes = head(BufReader::new(file), options.max_rows).or_raise(failed)?;
    let df = read_encoded(path, &bytes, &options.encodings, |text| parse(text, options.max_rows))?;
    tracing::Span::current().record("rows", df.height());
    Ok(df)
}
