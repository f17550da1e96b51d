//! Reading every leaf of a tree and summarizing what was read.

use crate::error::{ErrorKind, Result};
use crate::node::{Columns, MetaNode, Stats};
use crate::stats::{describe, head, sample};
use exn::ResultExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tabmeta_config::Config;
use tabmeta_read::{DataFrame, ReadOptions};
use tracing::instrument;

/// Runs read commands and attaches [`Stats`].
pub struct Materializer {
    options: ReadOptions,
    top: usize,
    preview: usize,
    rng: StdRng,
}

impl Materializer {
    pub fn new(config: &Config) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { options: ReadOptions::from(config), top: config.top, preview: config.preview, rng }
    }

    /// Read every unsettled node that has a command, parents before
    /// children. `progress` is called once per node, read or not.
    ///
    /// Nodes that already carry statistics or an error are left alone, so
    /// running this twice changes nothing.
    #[instrument(skip_all, fields(source = tree.source.as_deref(), nodes))]
    pub fn run(&mut self, tree: &mut MetaNode, mut progress: impl FnMut(&MetaNode)) {
        let mut nodes = 0;
        tree.walk_mut(&mut |node| {
            nodes += 1;
            self.settle(node);
            progress(node);
        });
        tracing::Span::current().record("nodes", nodes);
    }

    fn settle(&mut self, node: &mut MetaNode) {
        if node.is_settled() {
            return;
        }
        let Some(command) = node.command() else {
            return;
        };
        // One row past the cap tells a table of exactly `max_rows` rows from a longer one.
        let options = ReadOptions { max_rows: self.options.max_rows.saturating_add(1), ..self.options.clone() };
        let read = command.read(&options).map_err(ErrorKind::read);
        match self.summarize(read, command.is_chunked()) {
            Ok(stats) => node.stats = Some(stats),
            Err(err) => {
                tracing::warn!(%command, error = ?err, "Unable to load dataset");
                node.error = Some((*err).to_string());
            },
        }
    }

    fn summarize(&mut self, df: Result<DataFrame>, chunked: bool) -> Result<Stats> {
        let mut df = df?;
        let capped = chunked && df.height() > self.options.max_rows;
        if capped {
            df = df.head(Some(self.options.max_rows));
        }
        let failed = || ErrorKind::Read("unable to summarize data frame".to_string());
        let columns = describe(&df, self.top).or_raise(failed)?;
        Ok(Stats {
            rows: df.height(),
            width: df.width(),
            capped,
            columns: Columns::Stats(columns),
            head: head(&df, self.preview).or_raise(failed)?,
            sample: sample(&df, self.preview, &mut self.rng).or_raise(failed)?,
        })
    }
}

/// Read and summarize every leaf of `tree`.
pub fn materialize(tree: &mut MetaNode, config: &Config) {
    Materializer::new(config).run(tree, |_| {});
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Content;
    use rstest::rstest;
    use tabmeta_format::Format;
    use tabmeta_read::ReadCommand;

    fn leaf(dir: &std::path::Path, name: &str, contents: &str) -> MetaNode {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        MetaNode::named(name).with_format(Format::Csv).with_command(ReadCommand::Csv(path))
    }

    #[test]
    fn reads_leaves_and_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        let missing = MetaNode::named("gone.csv").with_command(ReadCommand::Csv(dir.path().join("gone.csv")));
        let mut tree = MetaNode {
            content: Content::Datasets(vec![leaf(dir.path(), "x.csv", "a,b\n1,2\n3,4\n"), missing]),
            ..MetaNode::root(dir.path().display().to_string()).with_format(Format::Dir)
        };
        let mut seen = Vec::new();
        Materializer::new(&Config::default()).run(&mut tree, |node| seen.push(node.label().to_string()));

        assert_eq!(seen.len(), 3);
        let x = tree.child("x.csv").unwrap();
        let stats = x.stats.as_ref().unwrap();
        assert_eq!((stats.rows, stats.width, stats.capped), (2, 2, false));
        assert_eq!(stats.head.index, [0, 1]);
        assert!(tree.child("gone.csv").unwrap().error.is_some());
        assert!(tree.stats.is_none() && tree.error.is_none());
    }

    #[test]
    fn second_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = leaf(dir.path(), "x.csv", "a,b\n1,2\n3,4\n");
        let config = Config { seed: Some(1), ..Config::default() };
        materialize(&mut tree, &config);
        let first = tree.clone();
        std::fs::write(dir.path().join("x.csv"), "a\n9\n").unwrap();
        materialize(&mut tree, &config);
        assert_eq!(tree, first);
    }

    #[test]
    fn row_cap_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = leaf(dir.path(), "x.csv", "a,b\n1,2\n3,4\n5,6\n");
        let config = Config { max_rows: 2, preview: 1, ..Config::default() };
        materialize(&mut tree, &config);
        let stats = tree.stats.unwrap();
        assert_eq!((stats.rows, stats.capped), (2, true));
        assert_eq!((stats.head.data.len(), stats.sample.data.len()), (1, 1));
    }

    #[rstest]
    #[case("a,b\n1,2\n3,4\n", 2, false)]
    #[case("a,b\n1,2\n3,4\n5,6\n", 2, true)]
    #[case("a,b\n1,2\n", 1, false)]
    fn capped_only_past_the_limit(#[case] contents: &str, #[case] rows: usize, #[case] capped: bool) {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = leaf(dir.path(), "x.csv", contents);
        materialize(&mut tree, &Config { max_rows: 2, ..Config::default() });
        let stats = tree.stats.unwrap();
        assert_eq!((stats.rows, stats.capped), (rows, capped));
    }

    #[test]
    fn whole_table_readers_are_never_capped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.json");
        std::fs::write(&path, r#"[{"a": 1}, {"a": 2}, {"a": 3}]"#).unwrap();
        let mut tree = MetaNode::named("x.json").with_format(Format::Json).with_command(ReadCommand::Json(path));
        materialize(&mut tree, &Config { max_rows: 2, ..Config::default() });
        let stats = tree.stats.unwrap();
        assert_eq!((stats.rows, stats.capped), (3, false));
    }
}
