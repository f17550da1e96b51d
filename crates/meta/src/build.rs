//! Building the tree of a source, without reading any data.

use crate::error::{ErrorKind, Result};
use crate::node::{Content, MetaNode};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tabmeta_archive::{Extractor, Unpacker, Unpackers, fetch_cached, files};
use tabmeta_config::Config;
use tabmeta_format::{Format, detect};
use tabmeta_read::sql::{Backend, Connection};
use tabmeta_read::{ReadCommand, ReadOptions, excel, hdf5};
use tracing::instrument;

/// Where a source string points.
enum Location {
    File(PathBuf),
    Remote(String),
    Database(String),
}

impl Location {
    fn of(source: &str) -> Self {
        if Path::new(source).exists() {
            return Location::File(PathBuf::from(source));
        }
        match url::Url::parse(source) {
            Ok(url) if url.scheme() == "file" => match url.to_file_path() {
                Ok(path) => Location::File(path),
                Err(()) => Location::File(PathBuf::from(url.path())),
            },
            Ok(url) if matches!(url.scheme(), "http" | "https" | "ftp") => Location::Remote(source.to_string()),
            _ => Location::Database(source.to_string()),
        }
    }
}

/// Builds [`MetaNode`] trees.
///
/// Containers are opened (archives extracted, databases introspected,
/// workbooks listed) but datasets are only given a [`ReadCommand`].
pub struct Builder<'a, U = Unpackers> {
    config: &'a Config,
    options: ReadOptions,
    extractor: Extractor<U>,
    tables: Option<&'a [String]>,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self::with_extractor(config, Extractor::from_config(config))
    }
}

impl<'a, U: Unpacker> Builder<'a, U> {
    pub fn with_extractor(config: &'a Config, extractor: Extractor<U>) -> Self {
        Self { config, options: ReadOptions::from(config), extractor, tables: None }
    }

    /// Only describe these tables (or sheets, or store keys).
    pub fn tables(mut self, tables: Option<&'a [String]>) -> Self {
        self.tables = tables;
        self
    }

    fn wanted(&self, table: &str) -> bool {
        self.tables.is_none_or(|tables| tables.iter().any(|wanted| wanted == table))
    }

    /// Build the tree for a local path, `file://` URL, remote URL or database
    /// connection string.
    ///
    /// Only a source that is none of these is an error
    /// ([`ErrorKind::UnsupportedSource`]). Anything that goes wrong further
    /// down is recorded on the node concerned.
    #[instrument(skip(self))]
    pub fn build(&self, source: &str) -> Result<MetaNode> {
        let mut root = MetaNode::root(source);
        match Location::of(source) {
            Location::File(path) => self.settle(&mut root, &path),
            Location::Remote(url) => match fetch_cached(&url, &self.config.cache_root, self.config.expiry()) {
                Ok(path) => self.settle(&mut root, &path),
                Err(err) => {
                    tracing::warn!(error = ?err, "Unable to fetch source");
                    root.error = Some((*err).to_string());
                },
            },
            Location::Database(connection) => {
                let parsed = Connection::parse(&connection)
                    .or_raise(|| ErrorKind::UnsupportedSource(connection.clone()))?;
                root.format = Some(Format::Sql);
                match self.database(&parsed, &connection) {
                    Ok(children) => root.content = Content::Datasets(children),
                    Err(err) => {
                        tracing::warn!(error = ?err, "Unable to introspect database");
                        root.error = Some((*err).to_string());
                    },
                }
            },
        }
        Ok(root)
    }

    /// Describe `path` into `node`, recording failure as the node's error.
    fn settle(&self, node: &mut MetaNode, path: &Path) {
        if let Err(err) = self.describe(node, path) {
            tracing::warn!(path = %path.display(), error = ?err, "Unable to get metadata");
            node.error = Some((*err).to_string());
        }
    }

    fn child(&self, name: String, path: &Path) -> MetaNode {
        let mut child = MetaNode::named(name);
        self.settle(&mut child, path);
        child
    }

    #[instrument(skip(self, node), fields(path = %path.display(), format))]
    fn describe(&self, node: &mut MetaNode, path: &Path) -> Result<()> {
        let Some(format) = detect(path, false, &self.options) else {
            return Ok(());
        };
        tracing::Span::current().record("format", format.as_str());
        node.format = Some(format);
        let path = path.to_path_buf();
        node.content = match format {
            Format::Dir => Content::Datasets(self.directory(&path)),
            Format::SevenZip | Format::Zip | Format::Rar | Format::Tar | Format::Xz | Format::Gz | Format::Bz2 => {
                let entries = self.extractor.extract(&path, format).map_err(ErrorKind::build)?;
                Content::Datasets(entries.into_iter().map(|(name, extracted)| self.child(name, &extracted)).collect())
            },
            Format::Sqlite3 => {
                let absolute = std::path::absolute(&path).or_raise(|| ErrorKind::Build(path.display().to_string()))?;
                let connection = format!("sqlite://{}", absolute.display());
                let parsed = Connection::parse(&connection).map_err(ErrorKind::build)?;
                Content::Datasets(self.tables_of(&parsed, &connection, None)?)
            },
            Format::Hdf5 => {
                let keys = hdf5::keys(&path).map_err(ErrorKind::build)?;
                let keys = keys.into_iter().filter(|key| !hdf5::is_bookkeeping(key));
                Content::Datasets(self.table_children(keys, |key| ReadCommand::Hdf5 { path: path.clone(), key }))
            },
            Format::Xls | Format::Xlsx => {
                let sheets = excel::sheet_names(&path).map_err(ErrorKind::build)?;
                Content::Datasets(self.table_children(sheets, |sheet| ReadCommand::Xlsx { path: path.clone(), sheet }))
            },
            Format::Csv => Content::Command(ReadCommand::Csv(path)),
            Format::Json => Content::Command(ReadCommand::Json(path)),
            Format::Dta => Content::Command(ReadCommand::Dta(path)),
            Format::Table | Format::Sql => Content::Empty,
        };
        Ok(())
    }

    /// One child per file below `root`, named by its relative path. Links
    /// are followed; an entry that cannot be read becomes a child carrying
    /// the error.
    fn directory(&self, root: &Path) -> Vec<MetaNode> {
        files(root, true)
            .into_iter()
            .map(|(name, found)| match found {
                Ok(path) => self.child(name, &path),
                Err(error) => MetaNode { error: Some(error), ..MetaNode::named(name) },
            })
            .collect()
    }

    /// `table` children for the wanted names.
    fn table_children(
        &self,
        names: impl IntoIterator<Item = String>,
        command: impl Fn(String) -> ReadCommand,
    ) -> Vec<MetaNode> {
        names
            .into_iter()
            .filter(|name| self.wanted(name))
            .map(|name| MetaNode::named(name.clone()).with_format(Format::Table).with_command(command(name)))
            .collect()
    }

    /// Tables reachable through `connection`: the requested ones if given,
    /// otherwise whatever the database lists.
    fn tables_of(&self, connection: &Connection, source: &str, schema: Option<&str>) -> Result<Vec<MetaNode>> {
        let names = match self.tables {
            Some(tables) => tables.to_vec(),
            None => connection.tables(schema).map_err(ErrorKind::build)?,
        };
        let command = |table: String| ReadCommand::Sql {
            table,
            connection: source.to_string(),
            schema: schema.map(str::to_string),
        };
        Ok(names
            .into_iter()
            .map(|name| MetaNode::named(name.clone()).with_format(Format::Table).with_command(command(name)))
            .collect())
    }

    /// Tables of the named database, or one `sql` container per schema when
    /// the connection names none.
    fn database(&self, connection: &Connection, source: &str) -> Result<Vec<MetaNode>> {
        if connection.database().is_some() {
            return self.tables_of(connection, source, None);
        }
        let schemas = connection.schemas().map_err(ErrorKind::build)?;
        let mut children = Vec::with_capacity(schemas.len());
        for schema in schemas {
            let mut child = MetaNode::named(schema.clone()).with_format(Format::Sql);
            let tables = match connection.backend() {
                Backend::Postgres if schema == "public" => self.tables_of(connection, source, None),
                Backend::MySql => {
                    let scoped = connection.with_database(&schema);
                    Connection::parse(&scoped)
                        .map_err(ErrorKind::build)
                        .and_then(|parsed| self.tables_of(&parsed, &scoped, None))
                },
                _ => self.tables_of(connection, source, Some(&schema)),
            };
            match tables {
                Ok(tables) => child.content = Content::Datasets(tables),
                Err(err) => {
                    tracing::warn!(schema, error = ?err, "Unable to list tables");
                    child.error = Some((*err).to_string());
                },
            }
            children.push(child);
        }
        Ok(children)
    }
}
