use crate::cache::cache_path;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::instrument;

fn is_fresh(target: &Path, expiry: Duration) -> bool {
    std::fs::metadata(target)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age < expiry)
}

/// Download `url` into `target`, unless `target` was written within `expiry`.
///
/// Nothing is written when the server answers with a non-success status or
/// an empty body.
#[instrument(fields(target = %target.display(), bytes))]
pub fn fetch(url: &str, target: &Path, expiry: Duration) -> Result<PathBuf> {
    if is_fresh(target, expiry) {
        tracing::debug!("Cached download is fresh");
        return Ok(target.to_path_buf());
    }
    let response = reqwest::blocking::get(url).or_raise(|| ErrorKind::Fetch(url.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        exn::bail!(ErrorKind::Fetch(format!("{url}: {status}")));
    }
    let body = response.bytes().or_raise(|| ErrorKind::Fetch(url.to_string()))?;
    if body.is_empty() {
        exn::bail!(ErrorKind::Fetch(format!("{url}: empty response")));
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
    }
    std::fs::write(target, &body).or_raise(|| ErrorKind::Io(target.to_path_buf()))?;
    tracing::Span::current().record("bytes", body.len());
    Ok(target.to_path_buf())
}

/// [`fetch`] into the cache file for `url` under `cache_root`.
pub fn fetch_cached(url: &str, cache_root: &Path, expiry: Duration) -> Result<PathBuf> {
    fetch(url, &cache_path(cache_root, url), expiry)
}
