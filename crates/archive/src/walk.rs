//! Listing the regular files below a directory.

use crate::path::relative_name;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file found below the root, or an entry that could not be read.
pub type Listed = (String, std::result::Result<PathBuf, String>);

/// Regular files below `root` named by their forward-slash relative path,
/// sorted by name.
///
/// An unreadable entry (a directory without permission, a vanished file, a
/// dangling link when `follow_links`) is listed with its error rather than
/// ending the walk. Errors without a path are only logged.
pub fn files(root: &Path, follow_links: bool) -> Vec<Listed> {
    let mut listed = Vec::new();
    for entry in WalkDir::new(root).follow_links(follow_links) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if let Some(name) = relative_name(root, entry.path()) {
                    listed.push((name, Ok(entry.into_path())));
                }
            },
            Ok(_) => {},
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "Unable to read directory entry");
                let name = err.path().and_then(|path| relative_name(root, path)).filter(|name| !name.is_empty());
                if let Some(name) = name {
                    listed.push((name, Err(err.to_string())));
                }
            },
        }
    }
    listed.sort_by(|(a, _), (b, _)| a.cmp(b));
    listed
}
