//! Archive member paths.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Resolve an archive member path relative to the extraction directory.
///
/// `.` and `..` are resolved lexically; a path that climbs out of the
/// extraction directory, carries a drive prefix, contains a null byte or
/// resolves to nothing is rejected with [`ErrorKind::InvalidPath`].
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// Relative path with forward slashes, as used for child names.
pub fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("data/a.csv", "data/a.csv")]
    #[case("./data//b.csv", "data/b.csv")]
    #[case("/abs/c.csv", "abs/c.csv")]
    #[case("data/../d.csv", "d.csv")]
    fn valid(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(validate(path).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../evil.csv")]
    #[case("a/../../evil.csv")]
    #[case(".")]
    #[case("a\0b")]
    fn invalid(#[case] path: &str) {
        assert!(matches!(*validate(path).unwrap_err(), ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn names_use_forward_slashes() {
        let root = Path::new("/cache/x");
        assert_eq!(relative_name(root, &root.join("a").join("b.csv")).as_deref(), Some("a/b.csv"));
        assert_eq!(relative_name(root, Path::new("/elsewhere/b.csv")), None);
    }
}
