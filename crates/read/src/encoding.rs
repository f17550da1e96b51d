//! Text decoding with an ordered list of fallback encodings.

use crate::error::{Error, ErrorKind, Result};
use encoding_rs::{Encoding, WINDOWS_1252};
use std::path::Path;

/// Byte values Windows-1252 leaves undefined. WHATWG maps them to C1
/// controls, which would make Windows-1252 accept any input at all.
const WINDOWS_1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

/// Decode `bytes` entirely, failing on any malformed or undefined sequence.
pub fn decode_strict(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    if encoding == WINDOWS_1252 && bytes.iter().any(|b| WINDOWS_1252_UNDEFINED.contains(b)) {
        return None;
    }
    encoding.decode_without_bom_handling_and_without_replacement(bytes).map(|text| text.into_owned())
}

/// Decode with the first encoding that accepts `bytes`, replacing malformed
/// sequences as UTF-8 when none does.
pub fn decode_first(bytes: &[u8], encodings: &[&'static Encoding]) -> String {
    encodings
        .iter()
        .find_map(|encoding| decode_strict(bytes, encoding))
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned())
}

/// Decode `bytes` and hand the text to `parse`, trying each encoding in turn
/// until one both decodes and parses.
///
/// A byte-order mark is authoritative and tried before the configured list.
/// When every attempt fails the error is [`ErrorKind::Encoding`]; if at least
/// one encoding decoded, the last parse error is kept as its child.
pub fn read_encoded<T>(
    path: &Path,
    bytes: &[u8],
    encodings: &[&'static Encoding],
    mut parse: impl FnMut(&str) -> Result<T>,
) -> Result<T> {
    let mut last: Option<Error> = None;
    let mut tried = Vec::with_capacity(encodings.len() + 1);
    let bom = Encoding::for_bom(bytes);
    let attempts = bom.iter().map(|&(encoding, skip)| (encoding, skip)).chain(encodings.iter().map(|&e| (e, 0)));
    for (encoding, skip) in attempts {
        tried.push(encoding.name().to_string());
        let Some(text) = decode_strict(&bytes[skip..], encoding) else {
            tracing::trace!(encoding = encoding.name(), path = %path.display(), "undecodable");
            continue;
        };
        match parse(&text) {
            Ok(value) => {
                tracing::debug!(encoding = encoding.name(), path = %path.display(), "decoded");
                return Ok(value);
            },
            Err(err) => {
                tracing::trace!(encoding = encoding.name(), error = %err, "decoded but failed to parse");
                last = Some(err);
            },
        }
    }
    let kind = ErrorKind::Encoding { path: path.to_path_buf(), tried };
    match last {
        Some(err) => Err(err.raise(kind)),
        None => Err(Error::from(kind)),
    }
}
