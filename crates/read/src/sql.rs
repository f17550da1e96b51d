//! Relational databases through `sqlx`'s driver-agnostic `Any` connection.
//!
//! Every call opens its own connection on a private current-thread runtime;
//! the rest of the engine is synchronous.

use crate::error::{ErrorKind, Result};
use crate::frame::{Cell, FrameBuilder, unique_headers};
use exn::ResultExt;
use polars::prelude::DataFrame;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Column, Connection as _, Executor, Row};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::future::Future;
use tracing::instrument;
use url::Url;

/// Database engines with a known introspection dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
    MySql,
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Backend::Sqlite => "sqlite",
            Backend::Postgres => "postgres",
            Backend::MySql => "mysql",
        })
    }
}

impl Backend {
    fn quote(&self, identifier: &str) -> String {
        match self {
            Backend::MySql => format!("`{}`", identifier.replace('`', "``")),
            _ => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }
}

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A parsed database connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    url: String,
    backend: Backend,
    database: Option<String>,
}

impl Connection {
    /// Parse a connection string, e.g. `sqlite:///tmp/x.db` or `postgres://user@host/db`.
    ///
    /// Anything that is not a URL for a supported backend is
    /// [`ErrorKind::UnsupportedSource`].
    pub fn parse(source: &str) -> Result<Self> {
        let unsupported = || ErrorKind::UnsupportedSource(source.to_string());
        let url = Url::parse(source).or_raise(unsupported)?;
        let scheme = url.scheme().split('+').next().unwrap_or_default();
        let backend = match scheme {
            "sqlite" | "sqlite3" => Backend::Sqlite,
            "postgres" | "postgresql" => Backend::Postgres,
            "mysql" | "mariadb" => Backend::MySql,
            _ => exn::bail!(unsupported()),
        };
        let database = match backend {
            Backend::Sqlite => source
                .split_once(':')
                .and_then(|(_, rest)| rest.trim_start_matches("//").split('?').next()),
            _ => Some(url.path().trim_matches('/')),
        }
        .filter(|db| !db.is_empty())
        .map(str::to_string);
        if backend == Backend::Sqlite && database.is_none() {
            exn::bail!(unsupported());
        }
        // sqlx knows each backend by one scheme, without a `+driver` suffix.
        let url = format!("{backend}{}", &source[url.scheme().len()..]);
        Ok(Self { url, backend, database })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// The database named in the connection string, if any.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Connection string selecting `database` on the same server.
    pub fn with_database(&self, database: &str) -> String {
        match Url::parse(&self.url) {
            Ok(mut url) => {
                url.set_path(database);
                url.to_string()
            },
            Err(_) => format!("{}/{database}", self.url.trim_end_matches('/')),
        }
    }

    pub(crate) fn block_on<T, F>(&self, work: impl FnOnce(AnyConnection) -> F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        sqlx::any::install_default_drivers();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .or_raise(|| ErrorKind::Database("unable to start runtime".to_string()))?;
        runtime.block_on(async {
            let connection = AnyConnection::connect(&self.url)
                .await
                .or_raise(|| ErrorKind::Database(format!("unable to connect to {}", self.backend)))?;
            work(connection).await.or_raise(|| ErrorKind::Database(format!("query against {} failed", self.backend)))
        })
    }

    fn strings(&self, query: String) -> Result<Vec<String>> {
        tracing::trace!(%query, "introspecting");
        self.block_on(|mut connection| async move {
            let rows = connection.fetch_all(query.as_str()).await?;
            rows.iter().map(|row| row.try_get::<String, _>(0)).collect()
        })
    }

    /// Schema names, excluding the engine's own catalogs.
    #[instrument(skip(self), fields(backend = %self.backend))]
    pub fn schemas(&self) -> Result<Vec<String>> {
        let query = match self.backend {
            Backend::Sqlite => "SELECT name FROM pragma_database_list ORDER BY seq",
            Backend::Postgres => {
                "SELECT nspname::text FROM pg_namespace \
                 WHERE nspname NOT LIKE 'pg\\_%' AND nspname <> 'information_schema' ORDER BY nspname"
            },
            Backend::MySql => {
                "SELECT CAST(schema_name AS CHAR) FROM information_schema.schemata \
                 WHERE schema_name NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys') \
                 ORDER BY schema_name"
            },
        };
        self.strings(query.to_string())
    }

    /// Table names in `schema`, or in the connection's default schema.
    #[instrument(skip(self), fields(backend = %self.backend))]
    pub fn tables(&self, schema: Option<&str>) -> Result<Vec<String>> {
        let query = match (self.backend, schema) {
            (Backend::Sqlite, None) => {
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
                 ORDER BY name"
                    .to_string()
            },
            (Backend::Sqlite, Some(schema)) => format!(
                "SELECT name FROM {}.sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
                 ORDER BY name",
                self.backend.quote(schema)
            ),
            (Backend::Postgres, schema) => format!(
                "SELECT c.relname::text FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
                 WHERE c.relkind IN ('r', 'p') AND n.nspname = {} ORDER BY c.relname",
                schema.map_or("current_schema()".to_string(), literal)
            ),
            (Backend::MySql, schema) => format!(
                "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
                 WHERE table_type = 'BASE TABLE' AND table_schema = {} ORDER BY table_name",
                schema.map_or("DATABASE()".to_string(), literal)
            ),
        };
        self.strings(query)
    }

    /// Read at most `max_rows` rows of `table`.
    #[instrument(skip(self), fields(backend = %self.backend, rows))]
    pub fn read(&self, table: &str, schema: Option<&str>, max_rows: usize) -> Result<DataFrame> {
        let target = match schema {
            Some(schema) => format!("{}.{}", self.backend.quote(schema), self.backend.quote(table)),
            None => self.backend.quote(table),
        };
        let query = format!("SELECT * FROM {target} LIMIT {max_rows}");
        let (names, rows) = self.block_on(|mut connection| async move {
            let rows = connection.fetch_all(query.as_str()).await?;
            let names: Vec<String> = match rows.first() {
                Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
                None => connection
                    .describe(query.as_str())
                    .await
                    .map(|d| d.columns().iter().map(|c| c.name().to_string()).collect())
                    .unwrap_or_default(),
            };
            Ok((names, rows))
        })?;
        let mut builder = FrameBuilder::new(unique_headers(names.into_iter().map(Some)));
        for row in &rows {
            builder.push_row((0..row.len()).map(|i| cell(row, i)));
        }
        let df = builder.finish()?;
        tracing::Span::current().record("rows", df.height());
        Ok(df)
    }
}

/// Decode one value, trying the types the `Any` driver can carry.
fn cell(row: &AnyRow, index: usize) -> Cell {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map_or(Cell::Null, Cell::Int);
    }
    if let Ok(value) = row.try_get::<Option<i32>, _>(index) {
        return value.map_or(Cell::Null, |v| Cell::Int(v.into()));
    }
    if let Ok(value) = row.try_get::<Option<i16>, _>(index) {
        return value.map_or(Cell::Null, |v| Cell::Int(v.into()));
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map_or(Cell::Null, Cell::Float);
    }
    if let Ok(value) = row.try_get::<Option<f32>, _>(index) {
        return value.map_or(Cell::Null, |v| Cell::Float(v.into()));
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return value.map_or(Cell::Null, Cell::Bool);
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.map_or(Cell::Null, Cell::Str);
    }
    Cell::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::DataType;
    use rstest::rstest;

    #[rstest]
    #[case("sqlite:///tmp/x.db", Backend::Sqlite, Some("/tmp/x.db"))]
    #[case("sqlite://relative.db", Backend::Sqlite, Some("relative.db"))]
    #[case("postgres://user@localhost/shop", Backend::Postgres, Some("shop"))]
    #[case("postgresql://user@localhost", Backend::Postgres, None)]
    #[case("postgresql://user@localhost/", Backend::Postgres, None)]
    #[case("mysql://root@db:3306/sales", Backend::MySql, Some("sales"))]
    #[case("mariadb://root@db", Backend::MySql, None)]
    #[case("postgresql+psycopg2://user@localhost/shop", Backend::Postgres, Some("shop"))]
    fn parses(#[case] source: &str, #[case] backend: Backend, #[case] database: Option<&str>) {
        let connection = Connection::parse(source).unwrap();
        assert_eq!(connection.backend(), backend);
        assert_eq!(connection.database(), database);
        assert!(connection.url.starts_with(&format!("{backend}://")));
    }

    #[rstest]
    #[case("not a url")]
    #[case("oracle://scott@db/orcl")]
    #[case("sqlite://")]
    #[case("/some/local/path.csv")]
    fn rejects(#[case] source: &str) {
        let err = Connection::parse(source).unwrap_err();
        assert!(matches!(*err, ErrorKind::UnsupportedSource(_)));
    }

    #[test]
    fn with_database() {
        let connection = Connection::parse("mysql://root@db:3306").unwrap();
        assert_eq!(connection.with_database("sales"), "mysql://root@db:3306/sales");
    }

    #[test]
    fn quoting() {
        assert_eq!(Backend::Sqlite.quote("my \"table\""), "\"my \"\"table\"\"\"");
        assert_eq!(Backend::MySql.quote("t`x"), "`t``x`");
        assert_eq!(literal("o'brien"), "'o''brien'");
    }

    fn sqlite_fixture(dir: &std::path::Path) -> Connection {
        let path = dir.join("shop.db");
        crate::fixtures::write_sqlite(
            &path,
            "CREATE TABLE items (id INTEGER, name TEXT, price REAL); \
             INSERT INTO items VALUES (1, 'pen', 1.5), (2, 'ink', NULL), (3, NULL, 4.0); \
             CREATE TABLE empty (a INTEGER, b TEXT);",
        )
        .unwrap();
        Connection::parse(&format!("sqlite://{}", path.display())).unwrap()
    }

    #[test]
    fn sqlite_tables_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let connection = sqlite_fixture(dir.path());
        assert_eq!(connection.tables(None).unwrap(), ["empty", "items"]);

        let df = connection.read("items", None, 100).unwrap();
        assert_eq!(df.get_column_names_str(), ["id", "name", "price"]);
        assert_eq!(df.dtypes(), [DataType::Int64, DataType::String, DataType::Float64]);
        assert_eq!(df.column("name").unwrap().null_count(), 1);

        assert_eq!(connection.read("items", None, 2).unwrap().height(), 2);
        assert_eq!(connection.read("empty", None, 100).unwrap().height(), 0);
        assert!(connection.read("missing", None, 100).is_err());
    }
}
