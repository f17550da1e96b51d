use crate::{Format, from_signature};
use std::path::Path;
use tabmeta_read::{ReadOptions, csv, json};
use tracing::instrument;

/// Rows parsed when sniffing for delimited text.
const CSV_SNIFF_ROWS: usize = 1000;

fn sniff_json(path: &Path) -> bool {
    json::looks_like(path) && json::read(path).is_ok()
}

fn sniff_csv(path: &Path, options: &ReadOptions) -> bool {
    let options = ReadOptions { max_rows: CSV_SNIFF_ROWS, ..options.clone() };
    csv::read(path, &options).is_ok_and(|df| df.height() >= 1 && df.width() >= 2)
}

/// Classify `path`, trying the extension (unless `ignore_extension`), then
/// directories, then signatures, then JSON and delimited-text parsers.
///
/// `None` means unclassified, which callers treat as a leaf with no content.
#[instrument(skip(options), fields(path = %path.as_ref().display(), format))]
pub fn detect(path: impl AsRef<Path>, ignore_extension: bool, options: &ReadOptions) -> Option<Format> {
    let path = path.as_ref();
    let format = if !ignore_extension && let Some(format) = Format::from_path(path) {
        Some(format)
    } else if path.is_dir() {
        Some(Format::Dir)
    } else if !path.is_file() {
        None
    } else if let Some(format) = from_signature(path) {
        Some(format)
    } else if sniff_json(path) {
        Some(Format::Json)
    } else if sniff_csv(path, options) {
        Some(Format::Csv)
    } else {
        None
    };
    if let Some(format) = format {
        tracing::Span::current().record("format", format.as_str());
    }
    format
}
