//! `tabmeta`: print the metadata tree of a tabular data source.

mod cli;
mod error;

use crate::cli::{Cli, Output};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::process::ExitCode;
use tabmeta_config::Config;
use tabmeta_meta::{Builder, Export, Materializer, MetaNode, merge, outline};
use tracing_subscriber::EnvFilter;

const PROGRESS_TEMPLATE: &str = "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} {wide_msg}";

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

fn progress_bar(tree: &MetaNode, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(tree.walk().count() as u64);
    if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
        bar.set_style(style);
    }
    bar
}

fn render(tree: &MetaNode, cli: &Cli) -> Result<String> {
    Ok(match cli.format {
        Output::Json => Export::new(tree).full(cli.full).to_json().or_raise(|| ErrorKind::Output)?,
        Output::Text => outline::to_text(tree),
        Output::Markdown => outline::to_markdown(tree),
    })
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).map_err(|err| err.raise(ErrorKind::Config))?;
    let config = cli.apply(config);
    config.validate().map_err(|err| err.raise(ErrorKind::Config))?;

    let mut tree = Builder::new(&config)
        .tables(cli.tables())
        .build(&cli.source)
        .map_err(|err| err.raise(ErrorKind::Metadata(cli.source.clone())))?;
    let bar = progress_bar(&tree, cli.quiet);
    Materializer::new(&config).run(&mut tree, |node| {
        bar.set_message(node.label().to_string());
        bar.inc(1);
    });
    bar.finish_and_clear();
    if !cli.no_merge {
        merge(&mut tree);
    }

    let rendered = render(&tree, cli)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").or_raise(|| ErrorKind::Output)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, retryable = err.is_retryable(), "Failed");
            eprintln!("error: {}", *err);
            ExitCode::FAILURE
        },
    }
}
