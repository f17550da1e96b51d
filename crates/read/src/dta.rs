//! Stata `.dta` files.
//!
//! Releases 113 to 115 use a fixed binary header; releases 117 to 119 wrap
//! the same sections in `<tag>` markers and locate them through a map of
//! offsets. Only the variable names, types and data are read. Value labels,
//! formats and characteristics are skipped.

use crate::ReadOptions;
use crate::encoding::decode_first;
use crate::error::{ErrorKind, Result};
use crate::frame::{Cell, FrameBuilder, unique_headers};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use exn::ResultExt;
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;
use tracing::instrument;

const FORMAT: &str = "dta";
const TAGGED_MAGIC: &[u8] = b"<stata_dta>";
/// First guess at the size of everything before the data section.
const HEADER_CHUNK: u64 = 64 * 1024;

// Largest non-missing integers; anything above is one of Stata's `.`, `.a` .. `.z`.
const MAX_BYTE: i8 = 100;
const MAX_INT: i16 = 32_740;
const MAX_LONG: i32 = 2_147_483_620;
// Smallest missing floats: 2^127 and 2^1023.
const MISSING_FLOAT: f32 = f32::from_bits(0x7F00_0000);
const MISSING_DOUBLE: f64 = f64::from_bits(0x7FE0_0000_0000_0000);

fn malformed(reason: impl Into<String>) -> exn::Exn<ErrorKind> {
    exn::Exn::from(ErrorKind::Parse { format: FORMAT, reason: reason.into() })
}

/// Storage type of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarType {
    Str(usize),
    StrL,
    Byte,
    Int,
    Long,
    Float,
    Double,
}

impl VarType {
    fn width(&self) -> usize {
        match self {
            VarType::Str(n) => *n,
            VarType::StrL | VarType::Double => 8,
            VarType::Long | VarType::Float => 4,
            VarType::Int => 2,
            VarType::Byte => 1,
        }
    }

    /// Type codes of the binary releases (113 to 115).
    fn from_binary(code: u8) -> Result<Self> {
        Ok(match code {
            1..=244 => VarType::Str(code as usize),
            251 => VarType::Byte,
            252 => VarType::Int,
            253 => VarType::Long,
            254 => VarType::Float,
            255 => VarType::Double,
            _ => return Err(malformed(format!("unknown type code {code}"))),
        })
    }

    /// Type codes of the tagged releases (117 to 119).
    fn from_tagged(code: u16) -> Result<Self> {
        Ok(match code {
            1..=2045 => VarType::Str(code as usize),
            32768 => VarType::StrL,
            65526 => VarType::Double,
            65527 => VarType::Float,
            65528 => VarType::Long,
            65529 => VarType::Int,
            65530 => VarType::Byte,
            _ => return Err(malformed(format!("unknown type code {code}"))),
        })
    }
}

/// Bounds-checked reader over the file contents with the file's byte order.
struct Bytes<'a> {
    data: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> Bytes<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        let Some(end) = end else {
            return Err(malformed(format!("truncated at byte {}", self.pos)));
        };
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        match usize::try_from(pos) {
            Ok(pos) if pos <= self.data.len() => {
                self.pos = pos;
                Ok(())
            },
            _ => Err(malformed(format!("offset {pos} beyond end of file"))),
        }
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        if self.big_endian != cfg!(target_endian = "big") {
            array.reverse();
        }
        Ok(array)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_ne_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_ne_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_ne_bytes(self.array()?))
    }

    fn expect(&mut self, tag: &str) -> Result<()> {
        if self.take(tag.len())? != tag.as_bytes() {
            return Err(malformed(format!("expected {tag} at byte {}", self.pos - tag.len())));
        }
        Ok(())
    }

    /// Read up to (and past) the closing `tag`, returning the text before it.
    fn until(&mut self, tag: &str) -> Result<&'a [u8]> {
        let rest = &self.data[self.pos..];
        let Some(at) = rest.windows(tag.len()).position(|w| w == tag.as_bytes()) else {
            return Err(malformed(format!("missing {tag}")));
        };
        let inner = &rest[..at];
        self.pos += at + tag.len();
        Ok(inner)
    }
}

/// Everything needed to walk the data section.
struct Layout {
    release: u16,
    big_endian: bool,
    names: Vec<String>,
    types: Vec<VarType>,
    observations: u64,
    data: u64,
    /// The strL section; the end is `u64::MAX` when the map does not say.
    strls: Option<Range<u64>>,
}

impl Layout {
    fn rows(&self, max_rows: usize) -> u64 {
        self.observations.min(max_rows as u64)
    }

    /// Offset just past the first `rows` observations.
    fn data_end(&self, rows: u64) -> u64 {
        let record: u64 = self.types.iter().map(|ty| ty.width() as u64).sum();
        self.data.saturating_add(rows.saturating_mul(record))
    }

    fn has_strls(&self) -> bool {
        self.types.contains(&VarType::StrL)
    }
}

fn null_terminated(bytes: &[u8]) -> &[u8] {
    bytes.iter().position(|b| *b == 0).map_or(bytes, |end| &bytes[..end])
}

fn binary_layout(bytes: &mut Bytes) -> Result<Layout> {
    let release = bytes.u8()? as u16;
    if !(113..=115).contains(&release) {
        return Err(malformed(format!("unsupported release {release}")));
    }
    bytes.big_endian = match bytes.u8()? {
        0x01 => true,
        0x02 => false,
        other => return Err(malformed(format!("unknown byte order {other}"))),
    };
    // filetype, unused
    bytes.take(2)?;
    let nvar = bytes.u16()? as usize;
    let observations = bytes.u32()? as u64;
    // data label, time stamp
    bytes.take(81 + 18)?;
    let types = bytes.take(nvar)?.iter().map(|code| VarType::from_binary(*code)).collect::<Result<Vec<_>>>()?;
    let names = (0..nvar).map(|_| bytes.take(33).map(null_terminated)).collect::<Result<Vec<_>>>()?;
    let format_width = if release == 113 { 12 } else { 49 };
    // sort list, formats, value label names
    bytes.take(2 * (nvar + 1) + nvar * format_width + nvar * 33)?;
    loop {
        let kind = bytes.u8()?;
        let len = bytes.u32()? as usize;
        if kind == 0 && len == 0 {
            break;
        }
        bytes.take(len)?;
    }
    let names = names.into_iter().map(|name| decode_first(name, &[WINDOWS_1252])).collect();
    Ok(Layout {
        release,
        big_endian: bytes.big_endian,
        names,
        types,
        observations,
        data: bytes.pos as u64,
        strls: None,
    })
}

fn tagged_layout(bytes: &mut Bytes) -> Result<Layout> {
    bytes.expect("<stata_dta><header><release>")?;
    let release: u16 = std::str::from_utf8(bytes.until("</release>")?)
        .ok()
        .and_then(|r| r.trim().parse().ok())
        .ok_or_else(|| malformed("unreadable release"))?;
    if !(117..=119).contains(&release) {
        return Err(malformed(format!("unsupported release {release}")));
    }
    bytes.expect("<byteorder>")?;
    bytes.big_endian = match bytes.until("</byteorder>")? {
        b"MSF" => true,
        b"LSF" => false,
        _ => return Err(malformed("unknown byte order")),
    };
    bytes.expect("<K>")?;
    let nvar = match release {
        119 => bytes.u32()? as usize,
        _ => bytes.u16()? as usize,
    };
    bytes.expect("</K><N>")?;
    let observations = match release {
        117 => bytes.u32()? as u64,
        _ => bytes.u64()?,
    };
    bytes.expect("</N><label>")?;
    bytes.until("</label>")?;
    bytes.expect("<timestamp>")?;
    bytes.until("</timestamp>")?;
    bytes.expect("</header><map>")?;
    let map = (0..14).map(|_| bytes.u64()).collect::<Result<Vec<_>>>()?;

    bytes.seek(map[2])?;
    bytes.expect("<variable_types>")?;
    let types = (0..nvar).map(|_| bytes.u16().and_then(VarType::from_tagged)).collect::<Result<Vec<_>>>()?;

    bytes.seek(map[3])?;
    bytes.expect("<varnames>")?;
    let width = if release == 117 { 33 } else { 129 };
    let encodings: &[&'static Encoding] = if release == 117 { &[WINDOWS_1252] } else { &[UTF_8, WINDOWS_1252] };
    let names = (0..nvar)
        .map(|_| bytes.take(width).map(|name| decode_first(null_terminated(name), encodings)))
        .collect::<Result<Vec<_>>>()?;

    bytes.seek(map[9])?;
    bytes.expect("<data>")?;
    let strls_end = map[11..].iter().copied().find(|offset| *offset > map[10]).unwrap_or(u64::MAX);
    Ok(Layout {
        release,
        big_endian: bytes.big_endian,
        names,
        types,
        observations,
        data: bytes.pos as u64,
        strls: Some(map[10]..strls_end),
    })
}

/// Key of a strL: the raw 8 bytes of the data cell that points at it.
type StrlKey = [u8; 8];

/// Collect every `GSO` entry of the strL `section`.
fn strls(section: Option<&[u8]>, layout: &Layout, encodings: &[&'static Encoding]) -> Result<HashMap<StrlKey, String>> {
    let mut found = HashMap::new();
    let Some(section) = section else {
        return Ok(found);
    };
    let mut bytes = Bytes { data: section, pos: 0, big_endian: layout.big_endian };
    bytes.expect("<strls>")?;
    while bytes.data[bytes.pos..].starts_with(b"GSO") {
        bytes.take(3)?;
        let header = bytes.take(if layout.release == 117 { 8 } else { 12 })?;
        let kind = bytes.u8()?;
        let len = bytes.u32()? as usize;
        let contents = bytes.take(len)?;
        let mut key = [0u8; 8];
        match (layout.release, bytes.big_endian) {
            (117, _) => key.copy_from_slice(header),
            (release, false) => {
                // v is the low bytes of a u32, o the low bytes of a u64.
                let v = if release == 118 { 2 } else { 3 };
                key[..v].copy_from_slice(&header[..v]);
                key[v..].copy_from_slice(&header[4..12 - v]);
            },
            (release, true) => {
                let v = if release == 118 { 2 } else { 3 };
                key[..v].copy_from_slice(&header[4 - v..4]);
                key[v..].copy_from_slice(&header[4 + v..12]);
            },
        }
        // 130 is text with a trailing NUL, 129 arbitrary binary.
        let text = match kind {
            130 => decode_first(null_terminated(contents), encodings),
            _ => decode_first(contents, encodings),
        };
        found.insert(key, text);
    }
    Ok(found)
}

fn read_cell(
    bytes: &mut Bytes,
    ty: VarType,
    encodings: &[&'static Encoding],
    strls: &HashMap<StrlKey, String>,
) -> Result<Cell> {
    Ok(match ty {
        VarType::Byte => match bytes.u8()? as i8 {
            v if v > MAX_BYTE => Cell::Null,
            v => Cell::Int(v as i64),
        },
        VarType::Int => match bytes.u16()? as i16 {
            v if v > MAX_INT => Cell::Null,
            v => Cell::Int(v as i64),
        },
        VarType::Long => match bytes.u32()? as i32 {
            v if v > MAX_LONG => Cell::Null,
            v => Cell::Int(v as i64),
        },
        VarType::Float => match f32::from_bits(bytes.u32()?) {
            v if v.is_nan() || v >= MISSING_FLOAT => Cell::Null,
            v => Cell::Float(v as f64),
        },
        VarType::Double => match f64::from_bits(bytes.u64()?) {
            v if v.is_nan() || v >= MISSING_DOUBLE => Cell::Null,
            v => Cell::Float(v),
        },
        VarType::Str(width) => Cell::Str(decode_first(null_terminated(bytes.take(width)?), encodings)),
        VarType::StrL => {
            let mut key = [0u8; 8];
            key.copy_from_slice(bytes.take(8)?);
            // (0, 0) is the empty string.
            match strls.get(&key) {
                Some(text) => Cell::Str(text.clone()),
                None => Cell::Str(String::new()),
            }
        },
    })
}

fn layout(data: &[u8]) -> Result<Layout> {
    let mut bytes = Bytes { data, pos: 0, big_endian: false };
    match data.starts_with(TAGGED_MAGIC) {
        true => tagged_layout(&mut bytes),
        false => binary_layout(&mut bytes),
    }
}

/// Build the frame from `data`, which holds the file at least up to the end
/// of the capped data section, and the strL section if there is one.
fn frame(data: &[u8], layout: &Layout, strl_section: Option<&[u8]>, options: &ReadOptions) -> Result<DataFrame> {
    let encodings: Vec<&'static Encoding> = match layout.release {
        118.. => std::iter::once(UTF_8).chain(options.encodings.iter().copied()).collect(),
        _ => options.encodings.clone(),
    };
    let strls = strls(strl_section, layout, &encodings)?;
    let rows = layout.rows(options.max_rows);
    if layout.data_end(rows) > data.len() as u64 {
        return Err(malformed(format!("data section shorter than {rows} observations")));
    }
    let mut builder = FrameBuilder::new(unique_headers(layout.names.iter().cloned().map(Some)));
    let mut bytes = Bytes { data, pos: 0, big_endian: layout.big_endian };
    bytes.seek(layout.data)?;
    for _ in 0..rows {
        let row = layout
            .types
            .iter()
            .map(|ty| read_cell(&mut bytes, *ty, &encodings, &strls))
            .collect::<Result<Vec<_>>>()?;
        builder.push_row(row);
    }
    tracing::debug!(release = layout.release, variables = layout.types.len(), rows, "parsed dta");
    builder.finish()
}

fn section<'a>(data: &'a [u8], range: &Range<u64>) -> Result<&'a [u8]> {
    let end = range.end.min(data.len() as u64);
    usize::try_from(range.start)
        .ok()
        .zip(usize::try_from(end).ok())
        .and_then(|(start, end)| data.get(start..end))
        .ok_or_else(|| malformed(format!("strL section at {} beyond end of file", range.start)))
}

/// Parse at most `max_rows` observations from the complete file contents.
pub fn parse(data: &[u8], options: &ReadOptions) -> Result<DataFrame> {
    let layout = layout(data)?;
    let strl_section = match &layout.strls {
        Some(range) if layout.has_strls() => Some(section(data, range)?),
        _ => None,
    };
    frame(data, &layout, strl_section, options)
}

/// Append to `buffer` until it holds the first `len` bytes of `file`.
fn fill(file: &mut File, buffer: &mut Vec<u8>, len: u64) -> std::io::Result<()> {
    let missing = len.saturating_sub(buffer.len() as u64);
    if missing > 0 {
        file.by_ref().take(missing).read_to_end(buffer)?;
    }
    Ok(())
}

/// Read a Stata file, capped at `options.max_rows` observations.
///
/// Only the header, the capped observations and (when a strL variable
/// exists) the strL section are loaded.
#[instrument(skip(options), fields(path = %path.display(), rows))]
pub fn read(path: &Path, options: &ReadOptions) -> Result<DataFrame> {
    let failed = || ErrorKind::Io(path.to_path_buf());
    let mut file = File::open(path).or_raise(failed)?;
    let size = file.metadata().or_raise(failed)?.len();
    let mut prefix = Vec::new();
    let mut want = HEADER_CHUNK.min(size);
    let layout = loop {
        fill(&mut file, &mut prefix, want).or_raise(failed)?;
        match layout(&prefix) {
            Ok(layout) => break layout,
            // The header may reach past what has been read so far.
            Err(_) if want < size => want = want.saturating_mul(4).min(size),
            Err(err) => return Err(err),
        }
    };
    fill(&mut file, &mut prefix, layout.data_end(layout.rows(options.max_rows)).min(size)).or_raise(failed)?;
    let strl_section = match &layout.strls {
        Some(range) if layout.has_strls() => {
            let mut section = Vec::new();
            file.seek(SeekFrom::Start(range.start)).or_raise(failed)?;
            let len = range.end.min(size).saturating_sub(range.start);
            file.by_ref().take(len).read_to_end(&mut section).or_raise(failed)?;
            Some(section)
        },
        _ => None,
    };
    let df = frame(&prefix, &layout, strl_section.as_deref(), options)?;
    tracing::Span::current().record("rows", df.height());
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::stata_114 as release_114;
    use polars::prelude::DataType;

    /// A big-endian release 117 file with a byte and a strL column.
    fn release_117() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(b"<stata_dta><header><release>117</release><byteorder>MSF</byteorder><K>");
        out.extend(2u16.to_be_bytes());
        out.extend(b"</K><N>");
        out.extend(2u32.to_be_bytes());
        out.extend(b"</N><label>\0</label><timestamp>\0</timestamp></header><map>");
        let map_at = out.len();
        out.extend([0u8; 14 * 8]);
        out.extend(b"</map>");
        let mut map = [0u64; 14];
        map[2] = out.len() as u64;
        out.extend(b"<variable_types>");
        out.extend(65530u16.to_be_bytes());
        out.extend(32768u16.to_be_bytes());
        out.extend(b"</variable_types>");
        map[3] = out.len() as u64;
        out.extend(b"<varnames>");
        for name in ["flag", "note"] {
            let mut field = [0u8; 33];
            field[..name.len()].copy_from_slice(name.as_bytes());
            out.extend(field);
        }
        out.extend(b"</varnames>");
        map[9] = out.len() as u64;
        out.extend(b"<data>");
        out.push(5);
        out.extend([0, 0, 0, 1, 0, 0, 0, 1]);
        out.push(101);
        out.extend([0u8; 8]);
        out.extend(b"</data>");
        map[10] = out.len() as u64;
        out.extend(b"<strls>GSO");
        out.extend(1u32.to_be_bytes());
        out.extend(1u32.to_be_bytes());
        out.push(130);
        out.extend(6u32.to_be_bytes());
        out.extend(b"hello\0");
        out.extend(b"</strls>");
        for (i, offset) in map.iter().enumerate() {
            out[map_at + i * 8..map_at + (i + 1) * 8].copy_from_slice(&offset.to_be_bytes());
        }
        out
    }

    #[test]
    fn binary_release() {
        let df = parse(&release_114(), &ReadOptions::default()).unwrap();
        assert_eq!(df.get_column_names_str(), ["id", "score", "tag"]);
        assert_eq!(df.dtypes(), [DataType::Int64, DataType::Float64, DataType::String]);
        assert_eq!(df.height(), 3);
        assert_eq!(df.column("id").unwrap().null_count(), 1);
        assert_eq!(df.column("score").unwrap().null_count(), 1);
        let tags = df.column("tag").unwrap().as_materialized_series().clone();
        let tags: Vec<_> = tags.str().unwrap().into_iter().collect();
        assert_eq!(tags, [Some("ab"), Some("cdef"), Some("é")]);
    }

    #[test]
    fn row_cap() {
        let options = ReadOptions { max_rows: 2, ..ReadOptions::default() };
        assert_eq!(parse(&release_114(), &options).unwrap().height(), 2);
    }

    #[test]
    fn tagged_release_with_strls() {
        let df = parse(&release_117(), &ReadOptions::default()).unwrap();
        assert_eq!(df.get_column_names_str(), ["flag", "note"]);
        assert_eq!(df.column("flag").unwrap().null_count(), 1);
        let notes = df.column("note").unwrap().as_materialized_series().clone();
        let notes: Vec<_> = notes.str().unwrap().into_iter().collect();
        assert_eq!(notes, [Some("hello"), Some("")]);
    }

    #[test]
    fn truncated() {
        let mut data = release_114();
        data.truncate(data.len() - 5);
        let err = parse(&data, &ReadOptions::default()).unwrap_err();
        assert!(matches!(*err, ErrorKind::Parse { format: "dta", .. }));
    }

    fn write(dir: &Path, data: &[u8]) -> std::path::PathBuf {
        let path = dir.join("data.dta");
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn reads_files_like_parse() {
        let dir = tempfile::tempdir().unwrap();
        for data in [release_114(), release_117()] {
            let path = write(dir.path(), &data);
            let options = ReadOptions::default();
            let expected = parse(&data, &options).unwrap();
            assert!(read(&path, &options).unwrap().equals_missing(&expected));
        }
    }

    #[test]
    fn stops_after_the_capped_observations() {
        let dir = tempfile::tempdir().unwrap();
        // Third observation cut short: only the capped ones are ever loaded.
        let mut data = release_114();
        data.truncate(data.len() - 5);
        let path = write(dir.path(), &data);
        let options = ReadOptions { max_rows: 2, ..ReadOptions::default() };
        assert_eq!(read(&path, &options).unwrap().height(), 2);
        assert!(read(&path, &ReadOptions::default()).is_err());
    }

    #[test]
    fn header_larger_than_first_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let data = release_114();
        // Splice a 100 KiB expansion field in front of the terminating one.
        let end_of_expansion = data.len() - 3 * 14 - 5;
        let mut padded = data[..end_of_expansion].to_vec();
        padded.push(1);
        padded.extend(100_000u32.to_le_bytes());
        padded.extend(vec![0u8; 100_000]);
        padded.extend(&data[end_of_expansion..]);
        let path = write(dir.path(), &padded);
        let df = read(&path, &ReadOptions::default()).unwrap();
        assert_eq!(df.shape(), (3, 3));
    }

    #[test]
    fn unsupported_release() {
        let mut data = release_114();
        data[0] = 0x6F;
        assert!(parse(&data, &ReadOptions::default()).is_err());
    }
}
