//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::{Compression as BzCompression, read::MultiBzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::MultiGzDecoder, write::GzEncoder};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::instrument;
use xz2::{read::XzDecoder, write::XzEncoder};

const XZ_LEVEL: u32 = 6;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use tabmeta_compress::Compression;
    ///
    /// let compressed = Compression::Gzip.compress(b"a,b\n1,2\n").unwrap();
    /// assert_eq!(Compression::from_magic_bytes(&compressed), Some(Compression::Gzip));
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            Compression::Bzip2 => {
                let mut encoder = BzEncoder::new(&mut output, BzCompression::default());
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(&mut output, GzCompression::default());
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            Compression::Xz => {
                let mut encoder = XzEncoder::new(&mut output, XZ_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
        }
        Ok(output)
    }

    /// Wrap a reader with the matching decompression layer.
    pub fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Compression::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
            Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
            Compression::Xz => Box::new(XzDecoder::new_multi_decoder(reader)),
        }
    }

    /// Decompress from a reader to a writer, returning bytes written.
    ///
    /// Decoder failures surface as [`ErrorKind::InvalidData`]; the two are
    /// indistinguishable at the `io::copy` boundary, so corrupt input is the
    /// assumed cause.
    pub fn decompress_stream<'a, R: Read + 'a, W: Write>(&self, reader: R, mut writer: W) -> Result<u64> {
        let mut reader = self.wrap_reader(reader);
        std::io::copy(&mut reader, &mut writer).or_raise(|| ErrorKind::InvalidData)
    }

    /// Decompress `source` into a new file at `target`.
    ///
    /// A partially written target is removed on failure.
    #[instrument(skip_all, fields(
        format = %self,
        source = %source.as_ref().display(),
        target = %target.as_ref().display(),
        size
    ))]
    pub fn unpack_file(&self, source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<u64> {
        let (source, target) = (source.as_ref(), target.as_ref());
        let input = File::open(source).or_raise(|| ErrorKind::Io)?;
        let mut output = BufWriter::new(File::create(target).or_raise(|| ErrorKind::Io)?);
        let written = self.decompress_stream(BufReader::new(input), &mut output).and_then(|size| {
            output.flush().or_raise(|| ErrorKind::Io)?;
            Ok(size)
        });
        if written.is_err() {
            drop(output);
            if let Err(err) = std::fs::remove_file(target) {
                tracing::warn!(error = %err, "unable to remove partially unpacked file");
            }
        }
        let size = written?;
        tracing::Span::current().record("size", size);
        Ok(size)
    }
}
