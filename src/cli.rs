use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use tabmeta_config::Config;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Output {
    /// Nested JSON document.
    #[default]
    Json,
    /// Indented plain-text outline.
    Text,
    /// Markdown bullet outline.
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "tabmeta", version, about = "Describe the tabular datasets inside a file, directory, archive, URL or database")]
pub struct Cli {
    /// File, directory, archive, URL or database connection string.
    pub source: String,

    /// Only describe these tables (databases, workbooks and HDF5 stores). Repeatable.
    #[arg(short, long = "table", value_name = "NAME")]
    pub tables: Vec<String>,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: Output,

    /// Include read commands, head and sample previews in JSON output.
    #[arg(long)]
    pub full: bool,

    /// Keep column statistics of siblings that share column names.
    #[arg(long)]
    pub no_merge: bool,

    /// Number of most frequent values kept per column.
    #[arg(long)]
    pub top: Option<usize>,

    /// Number of rows in the head and sample previews.
    #[arg(long)]
    pub preview: Option<usize>,

    /// Row cap for readers that can stop early.
    #[arg(long)]
    pub max_rows: Option<usize>,

    /// Seed for the preview sample.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, env = "TABMETA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for downloads and extracted archives.
    #[arg(long)]
    pub cache_root: Option<PathBuf>,

    /// Hide the progress bar.
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Command-line values take precedence over the loaded configuration.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(top) = self.top {
            config.top = top;
        }
        if let Some(preview) = self.preview {
            config.preview = preview;
        }
        if let Some(max_rows) = self.max_rows {
            config.max_rows = max_rows;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(cache_root) = &self.cache_root {
            config.cache_root = cache_root.clone();
        }
        config
    }

    /// `None` when no table filter was given.
    pub fn tables(&self) -> Option<&[String]> {
        (!self.tables.is_empty()).then_some(self.tables.as_slice())
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
