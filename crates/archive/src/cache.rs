//! Deterministic names under the cache root.
//!
//! An identifier (a URL, or the path of an archive) maps to
//! `{hash}-{name}{ext}`, where `hash` is the first 10 hex characters of its
//! BLAKE3 digest and `name{ext}` is the last segment of its path. Query
//! strings and fragments of URLs are ignored when picking the name.

use std::path::{Path, PathBuf};

const HASH_LEN: usize = 10;

fn basename(identifier: &str) -> &str {
    let path = match url::Url::parse(identifier) {
        // A Windows drive letter parses as a one-letter scheme.
        Ok(url) if url.scheme().len() > 1 => {
            let end = identifier.find(['?', '#']).unwrap_or(identifier.len());
            &identifier[..end]
        },
        _ => identifier,
    };
    path.trim_end_matches(['/', '\\']).rsplit(['/', '\\']).next().unwrap_or_default()
}

/// File name for `identifier` under the cache root.
pub fn cache_name(identifier: &str) -> String {
    let hash = blake3::hash(identifier.as_bytes()).to_hex();
    format!("{}-{}", &hash[..HASH_LEN], basename(identifier))
}

/// Absolute path for `identifier` under `root`.
pub fn cache_path(root: &Path, identifier: &str) -> PathBuf {
    let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    root.join(cache_name(identifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.org/data/sales.csv?token=1#top", "sales.csv")]
    #[case("http://example.org/archive.tar.gz", "archive.tar.gz")]
    #[case("/srv/data/bundle.zip", "bundle.zip")]
    #[case("relative/dir/", "dir")]
    #[case("bundle.7z", "bundle.7z")]
    fn names(#[case] identifier: &str, #[case] expected: &str) {
        let name = cache_name(identifier);
        let (hash, rest) = name.split_once('-').unwrap();
        assert_eq!(hash.len(), HASH_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rest, expected);
    }

    #[test]
    fn identifiers_do_not_collide() {
        assert_ne!(cache_name("/a/data.zip"), cache_name("/b/data.zip"));
        assert_eq!(cache_name("/a/data.zip"), cache_name("/a/data.zip"));
    }

    #[test]
    fn absolute_under_root() {
        let path = cache_path(Path::new("cache"), "x.zip");
        assert!(path.is_absolute());
        assert!(path.parent().unwrap().ends_with("cache"));
    }
}
