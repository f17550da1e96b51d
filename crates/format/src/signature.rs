use crate::Format;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tabmeta_compress::Compression;

/// Enough to reach the POSIX tar magic at offset 257.
const PREFIX_LEN: usize = 262;
const TAR_MAGIC_OFFSET: usize = 257;

const SEVEN_ZIP: &[u8] = b"7z\xBC\xAF\x27\x1C";
const ZIP: [&[u8]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
const RAR: &[u8] = b"Rar!\x1A\x07\x00";
const USTAR: &[u8] = b"ustar";
const PAX_HEADERS: &[u8] = b"./PaxHeaders";
const SQLITE3: &[u8] = b"SQLite format 3\x00";
const OLE: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const HDF5: &[u8] = b"\x89HDF\r\n\x1A\n";
const STATA_XML: &[u8] = b"<stata_dta>";

fn read_prefix(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let mut prefix = Vec::with_capacity(PREFIX_LEN);
    file.take(PREFIX_LEN as u64).read_to_end(&mut prefix).ok()?;
    Some(prefix)
}

/// A zip whose members live under `xl/` is an Excel workbook.
fn zip_flavour(path: &Path) -> Format {
    let is_workbook = File::open(path)
        .ok()
        .and_then(|file| zip::ZipArchive::new(file).ok())
        .is_some_and(|archive| archive.file_names().any(|name| name.starts_with("xl/")));
    if is_workbook { Format::Xlsx } else { Format::Zip }
}

fn is_tar(prefix: &[u8]) -> bool {
    prefix.starts_with(USTAR)
        || prefix.starts_with(PAX_HEADERS)
        || prefix.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + USTAR.len()) == Some(USTAR)
}

/// Binary release 113-115 header: release byte, byte order, filetype 1, padding 0.
fn is_stata_binary(prefix: &[u8]) -> bool {
    matches!(prefix, [0x71..=0x73, 0x01 | 0x02, 0x01, 0x00, ..])
}

/// Classify a file by its leading bytes.
///
/// Only signatures are consulted; the rest of the file is never parsed, except
/// for zip files, whose member list tells a workbook from a plain archive.
pub fn from_signature(path: impl AsRef<Path>) -> Option<Format> {
    let path = path.as_ref();
    let prefix = read_prefix(path)?;
    if prefix.starts_with(SEVEN_ZIP) {
        return Some(Format::SevenZip);
    }
    if ZIP.iter().any(|magic| prefix.starts_with(magic)) {
        return Some(zip_flavour(path));
    }
    if prefix.starts_with(RAR) {
        return Some(Format::Rar);
    }
    if is_tar(&prefix) {
        return Some(Format::Tar);
    }
    // xz, gzip then bzip2 never overlap, so the compression crate's order is fine.
    if let Some(compression) = Compression::from_magic_bytes(&prefix) {
        return Some(Format::from(compression));
    }
    if prefix.starts_with(SQLITE3) {
        return Some(Format::Sqlite3);
    }
    if prefix.starts_with(OLE) {
        return Some(Format::Xls);
    }
    if prefix.starts_with(HDF5) {
        return Some(Format::Hdf5);
    }
    if prefix.starts_with(STATA_XML) || is_stata_binary(&prefix) {
        return Some(Format::Dta);
    }
    None
}
