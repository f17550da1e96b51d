//! Unpacking strategies.
//!
//! An [`Unpacker`] writes the contents of one archive or compressed stream
//! into a directory. [`Native`] uses Rust codecs (zip, tar, gzip, bzip2, xz);
//! [`SevenZip`] shells out to a `7z` binary and is the only way to read 7z
//! and rar. [`Unpackers`] picks between them per format.

use crate::error::{ErrorKind, Result};
use crate::path::validate;
use exn::ResultExt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::process::Command;
use tabmeta_config::Config;
use tabmeta_format::Format;
use tracing::instrument;

/// Writes the contents of `archive` into the directory `target`.
///
/// Multi-file archives keep their member layout. Single-stream formats write
/// one file named by [`unpacked_name`].
pub trait Unpacker {
    fn unpack(&self, archive: &Path, format: Format, target: &Path) -> Result<()>;
}

/// The file a single-stream `archive` unpacks to.
pub fn unpacked_name(archive: &Path, format: Format) -> Option<String> {
    let name = archive.file_name()?.to_string_lossy();
    Some(format.compression()?.unpacked_name(&name))
}

fn io(path: &Path) -> ErrorKind {
    ErrorKind::Io(path.to_path_buf())
}

/// Pure-Rust unpacking for zip, tar and single compressed streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct Native;

impl Native {
    fn supports(format: Format) -> bool {
        matches!(format, Format::Zip | Format::Tar) || format.compression().is_some()
    }

    fn unzip<R: Read + Seek>(reader: R, archive: &Path, target: &Path) -> Result<()> {
        let mut zip = zip::ZipArchive::new(reader).or_raise(|| io(archive))?;
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).or_raise(|| io(archive))?;
            let output = target.join(validate(entry.name())?);
            if entry.is_dir() {
                std::fs::create_dir_all(&output).or_raise(|| io(&output))?;
                continue;
            }
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent).or_raise(|| io(parent))?;
            }
            let mut file = File::create(&output).or_raise(|| io(&output))?;
            std::io::copy(&mut entry, &mut file).or_raise(|| io(&output))?;
        }
        Ok(())
    }

    fn untar<R: Read>(reader: R, archive: &Path, target: &Path) -> Result<()> {
        let mut tar = tar::Archive::new(reader);
        for entry in tar.entries().or_raise(|| io(archive))? {
            let mut entry = entry.or_raise(|| io(archive))?;
            let member = entry.path().or_raise(|| io(archive))?.into_owned();
            let output = target.join(validate(&member)?);
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent).or_raise(|| io(parent))?;
            }
            entry.unpack(&output).or_raise(|| io(&output))?;
        }
        Ok(())
    }
}

impl Unpacker for Native {
    #[instrument(skip(self), fields(archive = %archive.display(), target = %target.display()))]
    fn unpack(&self, archive: &Path, format: Format, target: &Path) -> Result<()> {
        let file = File::open(archive).or_raise(|| io(archive))?;
        match format {
            Format::Zip => Self::unzip(BufReader::new(file), archive, target),
            Format::Tar => Self::untar(BufReader::new(file), archive, target),
            other => {
                let (Some(compression), Some(name)) = (other.compression(), unpacked_name(archive, other)) else {
                    exn::bail!(ErrorKind::UnsupportedFormat(other.to_string()));
                };
                compression.unpack_file(archive, target.join(name)).map_err(ErrorKind::compression)?;
                Ok(())
            },
        }
    }
}

/// The `7z` command-line tool.
#[derive(Debug, Clone)]
pub struct SevenZip {
    binary: PathBuf,
}

impl SevenZip {
    /// Binaries that understand the `7z x` command line.
    const EXECUTABLES: [&'static str; 3] = ["7z", "7zz", "7za"];

    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    /// Find a 7-Zip binary on `PATH`.
    pub fn discover() -> Result<Self> {
        for exe in Self::EXECUTABLES {
            if let Ok(binary) = which::which(exe) {
                tracing::trace!(binary = %binary.display(), "Discovered 7-Zip");
                return Ok(Self { binary });
            }
        }
        tracing::info!("7-Zip executable not found in PATH");
        exn::bail!(ErrorKind::ToolNotFound("7z"));
    }

    /// 7-Zip's name for a format, as passed to `-t`.
    fn archive_type(format: Format) -> &'static str {
        match format {
            Format::Gz => "gzip",
            Format::Bz2 => "bzip2",
            other => other.as_str(),
        }
    }

    fn command(&self, archive: &Path, format: Format, target: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(["x", "-y"])
            .arg(format!("-t{}", Self::archive_type(format)))
            .arg(format!("-o{}", target.display()))
            .arg(archive);
        command
    }
}

impl Unpacker for SevenZip {
    #[instrument(skip(self), fields(archive = %archive.display(), target = %target.display()))]
    fn unpack(&self, archive: &Path, format: Format, target: &Path) -> Result<()> {
        let mut command = self.command(archive, format, target);
        let line = std::iter::once(command.get_program())
            .chain(command.get_args())
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!(command = %line, "Running 7-Zip");
        let output = command.output().or_raise(|| io(&self.binary))?;
        if !output.status.success() {
            let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
            captured.push_str(&String::from_utf8_lossy(&output.stderr));
            exn::bail!(ErrorKind::ExtractionFailed {
                command: line,
                status: output.status.to_string(),
                output: captured.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Native codecs where possible, 7-Zip for the rest (or for everything when
/// `prefer_external` is set).
#[derive(Debug, Clone)]
pub struct Unpackers {
    native: Native,
    seven_zip: Option<SevenZip>,
    prefer_external: bool,
}

impl Unpackers {
    pub fn new(seven_zip: Option<SevenZip>, prefer_external: bool) -> Self {
        Self { native: Native, seven_zip, prefer_external }
    }

    /// Use the configured 7-Zip binary, or look one up on `PATH`. A missing
    /// binary only matters once a format needs it.
    pub fn from_config(config: &Config) -> Self {
        let seven_zip = match &config.seven_zip {
            Some(binary) => Some(SevenZip::new(binary)),
            None => SevenZip::discover().ok(),
        };
        Self::new(seven_zip, config.prefer_external)
    }
}

impl Unpacker for Unpackers {
    fn unpack(&self, archive: &Path, format: Format, target: &Path) -> Result<()> {
        let native = Native::supports(format);
        if (self.prefer_external || !native)
            && let Some(seven_zip) = &self.seven_zip
        {
            return seven_zip.unpack(archive, format, target);
        }
        match (native, format.is_archive()) {
            (true, _) => self.native.unpack(archive, format, target),
            (false, true) => exn::bail!(ErrorKind::ToolNotFound("7z")),
            (false, false) => exn::bail!(ErrorKind::UnsupportedFormat(format.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tabmeta_compress::Compression;

    pub(crate) fn write_zip(path: &Path, members: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, contents) in members {
            zip.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    pub(crate) fn write_tar(path: &Path, members: &[(&str, &str)]) {
        let mut tar = tar::Builder::new(File::create(path).unwrap());
        for (name, contents) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, name, contents.as_bytes()).unwrap();
        }
        tar.finish().unwrap();
    }

    #[test]
    fn native_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        write_zip(&archive, &[("a.csv", "a,b\n1,2\n"), ("sub/b.csv", "c,d\n3,4\n")]);
        let target = dir.path().join("out");
        Native.unpack(&archive, Format::Zip, &target).unwrap();
        assert_eq!(std::fs::read_to_string(target.join("sub/b.csv")).unwrap(), "c,d\n3,4\n");
    }

    #[test]
    fn native_zip_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        write_zip(&archive, &[("../evil.csv", "x")]);
        let err = Native.unpack(&archive, Format::Zip, &dir.path().join("out")).unwrap_err();
        assert!(matches!(*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn native_tar() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.tar");
        write_tar(&archive, &[("x/a.csv", "a,b\n1,2\n")]);
        let target = dir.path().join("out");
        Native.unpack(&archive, Format::Tar, &target).unwrap();
        assert!(target.join("x/a.csv").is_file());
    }

    #[rstest]
    #[case(Format::Gz, "data.csv.gz", "data.csv")]
    #[case(Format::Bz2, "data.csv.bz2", "data.csv")]
    #[case(Format::Xz, "bundle.txz", "bundle.tar")]
    fn native_stream(#[case] format: Format, #[case] name: &str, #[case] expected: &str) {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join(name);
        let packed = format.compression().unwrap().compress(b"a,b\n1,2\n").unwrap();
        std::fs::write(&archive, packed).unwrap();
        Native.unpack(&archive, format, dir.path()).unwrap();
        assert_eq!(std::fs::read(dir.path().join(expected)).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn corrupt_stream_is_compression_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.csv.gz");
        std::fs::write(&archive, b"\x1F\x8Bnot really gzip").unwrap();
        let err = Native.unpack(&archive, Format::Gz, dir.path()).unwrap_err();
        assert!(matches!(*err, ErrorKind::Compression(_)));
        assert!(!dir.path().join("data.csv").exists());
    }

    #[test]
    fn seven_zip_command_line() {
        let seven_zip = SevenZip::new("7z");
        let command = seven_zip.command(Path::new("a.csv.gz"), Format::Gz, Path::new("/cache"));
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["x", "-y", "-tgzip", "-o/cache", "a.csv.gz"]);
    }

    #[test]
    fn seven_zip_failure_carries_command() {
        let dir = tempfile::tempdir().unwrap();
        let seven_zip = SevenZip::new("false");
        let err = seven_zip.unpack(&dir.path().join("a.7z"), Format::SevenZip, dir.path()).unwrap_err();
        match &*err {
            ErrorKind::ExtractionFailed { command, .. } => assert!(command.starts_with("false x -y -t7z")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[rstest]
    #[case(Format::SevenZip)]
    #[case(Format::Rar)]
    fn external_only_formats_need_a_tool(#[case] format: Format) {
        let err = Unpackers::new(None, false).unpack(Path::new("a"), format, Path::new("b")).unwrap_err();
        assert!(matches!(*err, ErrorKind::ToolNotFound("7z")));
    }

    #[test]
    fn prefer_external_routes_everything_to_seven_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.csv.gz");
        std::fs::write(&archive, Compression::Gzip.compress(b"a,b\n").unwrap()).unwrap();
        let unpackers = Unpackers::new(Some(SevenZip::new("false")), true);
        let err = unpackers.unpack(&archive, Format::Gz, dir.path()).unwrap_err();
        assert!(matches!(*err, ErrorKind::ExtractionFailed { .. }));
        let unpackers = Unpackers::new(Some(SevenZip::new("false")), false);
        unpackers.unpack(&archive, Format::Gz, dir.path()).unwrap();
    }
}
