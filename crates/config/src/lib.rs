//! Configuration for metadata extraction.
//!
//! Values are layered with [`figment`]: built-in defaults, then an optional
//! TOML/YAML/JSON file, then `TABMETA_`-prefixed environment variables. The
//! resulting [`Config`] is passed explicitly to every operation that needs it;
//! nothing here is process-global.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use encoding_rs::Encoding;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum number of rows read from any chunkable dataset.
pub const MAX_ROWS: usize = 10_000;
/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "TABMETA_";
/// Encodings tried, in order, when decoding delimited text.
pub const DEFAULT_ENCODINGS: [&str; 4] = ["windows-1252", "utf-8", "utf-16le", "utf-16be"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding fetched downloads and extracted archives.
    pub cache_root: PathBuf,
    /// Downloads younger than this many seconds are reused.
    pub expiry_secs: u64,
    /// Row cap applied to chunkable readers.
    pub max_rows: usize,
    /// Number of most frequent values kept per column.
    pub top: usize,
    /// Number of rows kept in the head and sample previews.
    pub preview: usize,
    /// Encoding labels (WHATWG names) tried in order for text sources.
    pub encodings: Vec<String>,
    /// Seed for the preview sample; random when unset.
    pub seed: Option<u64>,
    /// Use the external `7z` binary for every archive format, not only 7z and rar.
    pub prefer_external: bool,
    /// Explicit path to the `7z` binary. Discovered on `PATH` when unset.
    pub seven_zip: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            expiry_secs: 86_400,
            max_rows: MAX_ROWS,
            top: 3,
            preview: 10,
            encodings: DEFAULT_ENCODINGS.iter().map(|e| e.to_string()).collect(),
            seed: None,
            prefer_external: false,
            seven_zip: None,
        }
    }
}

fn default_cache_root() -> PathBuf {
    ProjectDirs::from("", "", "tabmeta")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("tabmeta"))
}

impl Config {
    /// Build the layered provider without extracting it.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            let extension = file.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
            figment = match extension.as_str() {
                "toml" => figment.merge(Toml::file(file)),
                "yaml" | "yml" => figment.merge(Yaml::file(file)),
                "json" => figment.merge(Json::file(file)),
                _ => exn::bail!(ErrorKind::UnsupportedFile(file.display().to_string())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load and validate the configuration.
    #[tracing::instrument(level = "debug")]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(file)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(cache_root = %config.cache_root.display(), max_rows = config.max_rows, "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_rows == 0 {
            exn::bail!(ErrorKind::Invalid("max_rows must be positive".to_string()));
        }
        if self.encodings.is_empty() {
            exn::bail!(ErrorKind::Invalid("at least one encoding is required".to_string()));
        }
        if let Some(label) = self.encodings.iter().find(|label| Encoding::for_label(label.as_bytes()).is_none()) {
            exn::bail!(ErrorKind::Invalid(format!("unknown encoding: {label}")));
        }
        Ok(())
    }

    /// Age after which a fetched download is considered stale.
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    /// The configured encodings, resolved. Unknown labels are skipped; [`validate`](Self::validate) reports them.
    pub fn encodings(&self) -> Vec<&'static Encoding> {
        self.encodings.iter().filter_map(|label| Encoding::for_label(label.as_bytes())).collect()
    }

    /// Copy of this configuration with a different cache root.
    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }
}
