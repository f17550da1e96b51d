use crate::cache::cache_path;
use crate::error::{ErrorKind, Result};
use crate::unpack::{Unpacker, Unpackers, unpacked_name};
use crate::walk::files;
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tabmeta_config::Config;
use tabmeta_format::Format;
use tracing::instrument;
use walkdir::WalkDir;

/// Prefix of the bookkeeping entries some tar writers leave behind.
const PAX_HEADERS: &str = "paxheaders.";

fn io(path: &Path) -> ErrorKind {
    ErrorKind::Io(path.to_path_buf())
}

fn modified(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).or_raise(|| io(path))
}

/// Extracts archives and compressed files into a cache directory.
#[derive(Debug, Clone)]
pub struct Extractor<U = Unpackers> {
    cache_root: PathBuf,
    unpacker: U,
}

impl Extractor<Unpackers> {
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.cache_root, Unpackers::from_config(config))
    }
}

impl<U: Unpacker> Extractor<U> {
    pub fn new(cache_root: impl Into<PathBuf>, unpacker: U) -> Self {
        Self { cache_root: cache_root.into(), unpacker }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Extract `archive` and list what it contained as `(name, path)` pairs.
    ///
    /// Multi-file archives unpack into their own cache directory, reused
    /// until the archive is modified after it. Names are paths relative to
    /// that directory, with forward slashes, sorted.
    ///
    /// Compressed streams always unpack again, to a file in the cache root
    /// named after the archive minus its compression suffix. They yield one
    /// pair named after that file.
    #[instrument(skip(self), fields(archive = %archive.display(), entries))]
    pub fn extract(&self, archive: &Path, format: Format) -> Result<Vec<(String, PathBuf)>> {
        std::fs::create_dir_all(&self.cache_root).or_raise(|| io(&self.cache_root))?;
        let entries = if format.is_archive() {
            self.extract_archive(archive, format)?
        } else if format.compression().is_some() {
            self.extract_stream(archive, format)?
        } else {
            exn::bail!(ErrorKind::UnsupportedFormat(format.to_string()));
        };
        tracing::Span::current().record("entries", entries.len());
        Ok(entries)
    }

    fn extract_archive(&self, archive: &Path, format: Format) -> Result<Vec<(String, PathBuf)>> {
        let identifier = std::path::absolute(archive).or_raise(|| io(archive))?;
        let target = cache_path(&self.cache_root, &identifier.to_string_lossy());
        if target.exists() && modified(&target)? < modified(archive)? {
            tracing::debug!(target = %target.display(), "Cached extraction is stale");
            std::fs::remove_dir_all(&target).or_raise(|| io(&target))?;
        }
        if !target.exists() {
            std::fs::create_dir_all(&target).or_raise(|| io(&target))?;
            if let Err(err) = self.unpacker.unpack(archive, format, &target) {
                // An empty directory would otherwise pass as a fresh extraction.
                if let Err(cleanup) = std::fs::remove_dir_all(&target) {
                    tracing::warn!(error = %cleanup, "unable to remove failed extraction");
                }
                return Err(err);
            }
            if format == Format::Tar {
                remove_pax_headers(&target)?;
            }
        }
        // Unreadable members are logged by the walk and left out.
        let entries = files(&target, false)
            .into_iter()
            .filter_map(|(name, found)| Some((name, found.ok()?)))
            .collect();
        Ok(entries)
    }

    fn extract_stream(&self, archive: &Path, format: Format) -> Result<Vec<(String, PathBuf)>> {
        let name = unpacked_name(archive, format).ok_or_raise(|| io(archive))?;
        let target = self.cache_root.join(&name);
        if target.exists() {
            std::fs::remove_file(&target).or_raise(|| io(&target))?;
        }
        self.unpacker.unpack(archive, format, &self.cache_root)?;
        if !target.is_file() {
            exn::bail!(io(&target));
        }
        Ok(vec![(name, target)])
    }
}

fn remove_pax_headers(root: &Path) -> Result<()> {
    let mut doomed = Vec::new();
    let mut walk = WalkDir::new(root).min_depth(1).into_iter();
    while let Some(entry) = walk.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "Unable to read extracted entry");
                continue;
            },
        };
        if entry.file_name().to_string_lossy().to_lowercase().starts_with(PAX_HEADERS) {
            if entry.file_type().is_dir() {
                walk.skip_current_dir();
            }
            doomed.push(entry);
        }
    }
    for entry in doomed {
        let path = entry.path();
        match entry.file_type().is_dir() {
            true => std::fs::remove_dir_all(path).or_raise(|| io(path))?,
            false => std::fs::remove_file(path).or_raise(|| io(path))?,
        }
    }
    Ok(())
}
