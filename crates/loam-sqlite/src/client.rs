//! SQLite implementation of the [`Client`] trait.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Row as _, TypeInfo as _, ValueRef as _};
use tracing::debug;

use loam_core::bind::expand_named;
use loam_core::{Client, ConnectionConfig, Error, Params, Result, Row, SqlValue};

/// A live SQLite connection.
///
/// Backed by a `sqlx` pool capped at a single connection so that session
/// state — open transactions, `last_insert_rowid` — behaves like one
/// database handle, which is what the transaction pass-throughs and
/// [`Client::last_insert_id`] assume.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
    // 0 means "no insert yet"; SQLite rowids start at 1.
    last_insert_id: AtomicI64,
    in_transaction: AtomicBool,
}

impl SqliteClient {
    /// Opens a connection from a config whose URL names the sqlite driver.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedDriver`] for non-sqlite URLs, or
    /// [`Error::Database`] when the database cannot be opened.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let driver = config.driver()?;
        if !matches!(driver, "sqlite" | "sqlite2") {
            return Err(Error::UnsupportedDriver(String::from(driver)));
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&config.url)
            .await
            .map_err(db_err)?;
        debug!(url = %config.url, "sqlite connection opened");
        Ok(Self {
            pool,
            last_insert_id: AtomicI64::new(0),
            in_transaction: AtomicBool::new(false),
        })
    }

    async fn run_fetch_all(&self, sql: &str, params: &Params) -> Result<Vec<SqliteRow>> {
        let (sql, values) = expand_named(sql, params)?;
        debug!(%sql, params = values.len(), "fetch");
        let mut query = sqlx::query(&sql);
        for value in values {
            query = bind_value(query, value);
        }
        query.fetch_all(&self.pool).await.map_err(db_err)
    }

    async fn run_fetch_one(&self, sql: &str, params: &Params) -> Result<Option<SqliteRow>> {
        let (sql, values) = expand_named(sql, params)?;
        debug!(%sql, params = values.len(), "fetch one");
        let mut query = sqlx::query(&sql);
        for value in values {
            query = bind_value(query, value);
        }
        query.fetch_optional(&self.pool).await.map_err(db_err)
    }

    async fn run_statement(&self, sql: &str) -> Result<()> {
        debug!(%sql, "statement");
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(db_err)
    }
}

#[async_trait]
impl Client for SqliteClient {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    async fn fetch_all(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        self.run_fetch_all(sql, params)
            .await?
            .iter()
            .map(decode_row)
            .collect()
    }

    async fn fetch_one(&self, sql: &str, params: &Params) -> Result<Option<Row>> {
        match self.run_fetch_one(sql, params).await? {
            Some(row) => Ok(Some(decode_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn fetch_column(&self, sql: &str, params: &Params) -> Result<Vec<SqlValue>> {
        self.run_fetch_all(sql, params)
            .await?
            .iter()
            .map(|row| decode_value(row, 0))
            .collect()
    }

    async fn fetch_scalar(&self, sql: &str, params: &Params) -> Result<Option<SqlValue>> {
        match self.run_fetch_one(sql, params).await? {
            Some(row) => Ok(Some(decode_value(&row, 0)?)),
            None => Ok(None),
        }
    }

    async fn execute(&self, sql: &str, params: &Params) -> Result<u64> {
        let (sql, values) = expand_named(sql, params)?;
        debug!(%sql, params = values.len(), "execute");
        let mut query = sqlx::query(&sql);
        for value in values {
            query = bind_value(query, value);
        }
        let result = query.execute(&self.pool).await.map_err(db_err)?;
        let rowid = result.last_insert_rowid();
        if rowid > 0 {
            self.last_insert_id.store(rowid, Ordering::SeqCst);
        }
        Ok(result.rows_affected())
    }

    async fn last_insert_id(&self) -> Result<Option<i64>> {
        match self.last_insert_id.load(Ordering::SeqCst) {
            0 => Ok(None),
            id => Ok(Some(id)),
        }
    }

    async fn begin_transaction(&self) -> Result<()> {
        self.run_statement("BEGIN").await?;
        self.in_transaction.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.run_statement("COMMIT").await?;
        self.in_transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.run_statement("ROLLBACK").await?;
        self.in_transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }
}

fn db_err(err: sqlx::Error) -> Error {
    Error::Database(err.to_string())
}

/// Binds one dynamic value onto a query.
fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.push(column.name(), decode_value(row, idx)?);
    }
    Ok(out)
}

/// Decodes one column by SQLite type affinity.
fn decode_value(row: &SqliteRow, idx: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(idx).map_err(db_err)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_owned();
    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(idx).map(SqlValue::Int),
        "REAL" => row.try_get::<f64, _>(idx).map(SqlValue::Float),
        "BLOB" => row.try_get::<Vec<u8>, _>(idx).map(SqlValue::Blob),
        _ => row.try_get::<String, _>(idx).map(SqlValue::Text),
    }
    .map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_client() -> SqliteClient {
        SqliteClient::connect(&ConnectionConfig::new("sqlite::memory:"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn rejects_foreign_drivers() {
        let err = SqliteClient::connect(&ConnectionConfig::new("mysql://x/y"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedDriver(d) if d == "mysql"));
    }

    #[tokio::test]
    async fn execute_and_fetch_round_trip() {
        let client = memory_client().await;
        client
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", &Params::new())
            .await
            .unwrap();
        let mut params = Params::new();
        params.insert(String::from(":name"), SqlValue::Text(String::from("a")));
        let affected = client
            .execute("INSERT INTO t (name) VALUES (:name)", &params)
            .await
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(client.last_insert_id().await.unwrap(), Some(1));

        let rows = client.fetch_all("SELECT * FROM t", &Params::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&SqlValue::Text(String::from("a"))));
    }

    #[tokio::test]
    async fn scalar_and_column_shapes() {
        let client = memory_client().await;
        client
            .execute("CREATE TABLE t (n INTEGER)", &Params::new())
            .await
            .unwrap();
        client
            .execute("INSERT INTO t (n) VALUES (1), (2)", &Params::new())
            .await
            .unwrap();
        let scalar = client
            .fetch_scalar("SELECT COUNT(*) FROM t", &Params::new())
            .await
            .unwrap();
        assert_eq!(scalar, Some(SqlValue::Int(2)));
        let column = client
            .fetch_column("SELECT n FROM t ORDER BY n", &Params::new())
            .await
            .unwrap();
        assert_eq!(column, vec![SqlValue::Int(1), SqlValue::Int(2)]);
        let none = client
            .fetch_scalar("SELECT n FROM t WHERE n > 5", &Params::new())
            .await
            .unwrap();
        assert_eq!(none, None);
    }

    #[tokio::test]
    async fn transaction_pass_through() {
        let client = memory_client().await;
        client
            .execute("CREATE TABLE t (n INTEGER)", &Params::new())
            .await
            .unwrap();
        client.begin_transaction().await.unwrap();
        assert!(client.in_transaction());
        client
            .execute("INSERT INTO t (n) VALUES (1)", &Params::new())
            .await
            .unwrap();
        client.rollback().await.unwrap();
        assert!(!client.in_transaction());
        let count = client
            .fetch_scalar("SELECT COUNT(*) FROM t", &Params::new())
            .await
            .unwrap();
        assert_eq!(count, Some(SqlValue::Int(0)));
    }

    #[tokio::test]
    async fn null_decoding() {
        let client = memory_client().await;
        client
            .execute("CREATE TABLE t (x TEXT)", &Params::new())
            .await
            .unwrap();
        client
            .execute("INSERT INTO t (x) VALUES (NULL)", &Params::new())
            .await
            .unwrap();
        let row = client
            .fetch_one("SELECT x FROM t", &Params::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get("x"), Some(&SqlValue::Null));
    }
}
