//! Writers for sample sources, for tests in this and downstream crates.

use crate::error::{ErrorKind, Result};
use crate::sql::Connection;
use exn::ResultExt;
use sqlx::Executor;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;

fn inline_row(row: usize, cells: &[&str]) -> String {
    let cells: String = cells
        .iter()
        .enumerate()
        .map(|(col, value)| {
            let reference = format!("{}{row}", (b'A' + col as u8) as char);
            match value.parse::<f64>() {
                Ok(_) => format!(r#"<c r="{reference}"><v>{value}</v></c>"#),
                Err(_) => format!(r#"<c r="{reference}" t="inlineStr"><is><t>{value}</t></is></c>"#),
            }
        })
        .collect();
    format!(r#"<row r="{row}">{cells}</row>"#)
}

/// Write a minimal `.xlsx` workbook; each sheet is a list of rows of cell text.
/// Cells that parse as numbers are stored as numbers.
pub fn write_workbook(path: &Path, sheets: &[(&str, &[&[&str]])]) -> Result<()> {
    let failed = || ErrorKind::Io(path.to_path_buf());
    let mut zip = zip::ZipWriter::new(std::fs::File::create(path).or_raise(failed)?);
    let options = SimpleFileOptions::default();
    let overrides: String = (1..=sheets.len())
        .map(|i| {
            format!(
                r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            )
        })
        .collect();
    let sheet_list: String = sheets
        .iter()
        .enumerate()
        .map(|(i, (name, _))| format!(r#"<sheet name="{name}" sheetId="{}" r:id="rId{}"/>"#, i + 1, i + 1))
        .collect();
    let relationships: String = (1..=sheets.len())
        .map(|i| {
            format!(
                r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
            )
        })
        .collect();
    let mut files = vec![
        (
            "[Content_Types].xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
            ),
        ),
        (
            "_rels/.rels".to_string(),
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
        ),
        (
            "xl/workbook.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{sheet_list}</sheets></workbook>"#
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{relationships}</Relationships>"#
            ),
        ),
    ];
    for (i, (_, rows)) in sheets.iter().enumerate() {
        let data: String = rows.iter().enumerate().map(|(r, cells)| inline_row(r + 1, cells)).collect();
        files.push((
            format!("xl/worksheets/sheet{}.xml", i + 1),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{data}</sheetData></worksheet>"#
            ),
        ));
    }
    for (name, contents) in files {
        zip.start_file(name, options).or_raise(failed)?;
        zip.write_all(contents.as_bytes()).or_raise(failed)?;
    }
    zip.finish().or_raise(failed)?;
    Ok(())
}

/// Create (or open) the SQLite database at `path` and run `script` on it.
pub fn write_sqlite(path: &Path, script: &str) -> Result<()> {
    let connection = Connection::parse(&format!("sqlite://{}?mode=rwc", path.display()))?;
    let script = script.to_string();
    connection.block_on(|mut conn| async move {
        conn.execute(script.as_str()).await?;
        Ok(())
    })
}

/// A little-endian release 114 file with an int, a double and a str4 column.
pub fn stata_114() -> Vec<u8> {
    let mut out = vec![114, 0x02, 1, 0];
    out.extend(3u16.to_le_bytes());
    out.extend(3u32.to_le_bytes());
    out.extend([0u8; 81 + 18]);
    out.extend([252, 255, 4]);
    for name in ["id", "score", "tag"] {
        let mut field = [0u8; 33];
        field[..name.len()].copy_from_slice(name.as_bytes());
        out.extend(field);
    }
    out.extend([0u8; 2 * 4 + 3 * 49 + 3 * 33]);
    out.extend([0u8; 5]);
    for (id, score, tag) in [(1i16, 1.5f64, *b"ab\0\0"), (2, f64::MAX, *b"cdef"), (i16::MAX, 3.0, *b"\xe9\0\0\0")] {
        out.extend(id.to_le_bytes());
        out.extend(score.to_le_bytes());
        out.extend(tag);
    }
    out
}
