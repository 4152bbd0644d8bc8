//! The database client capability boundary.
//!
//! Everything below this layer — wire protocol, pooling, statement caching —
//! belongs to the driver. The layer above only needs the narrow surface
//! captured by [`Client`]: run SQL with named parameters, shape the result,
//! report the driver name, and pass transactions through.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::{Params, SqlValue};

/// Narrow async interface to one live database connection.
#[async_trait]
pub trait Client: Send + Sync {
    /// Driver name used for dialect selection (`"sqlite"`, `"mysql"`, ...).
    fn driver_name(&self) -> &str;

    /// Runs a query and returns every row.
    async fn fetch_all(&self, sql: &str, params: &Params) -> Result<Vec<Row>>;

    /// Runs a query and returns the first row, if any.
    async fn fetch_one(&self, sql: &str, params: &Params) -> Result<Option<Row>>;

    /// Runs a query and returns the first column of every row.
    async fn fetch_column(&self, sql: &str, params: &Params) -> Result<Vec<SqlValue>>;

    /// Runs a query and returns the first column of the first row, if any.
    async fn fetch_scalar(&self, sql: &str, params: &Params) -> Result<Option<SqlValue>>;

    /// Runs a statement and returns the affected-row count.
    async fn execute(&self, sql: &str, params: &Params) -> Result<u64>;

    /// Identifier generated by the most recent INSERT, if the driver
    /// reports one.
    async fn last_insert_id(&self) -> Result<Option<i64>>;

    /// Opens a transaction.
    async fn begin_transaction(&self) -> Result<()>;

    /// Commits the open transaction.
    async fn commit(&self) -> Result<()>;

    /// Rolls back the open transaction.
    async fn rollback(&self) -> Result<()>;

    /// True while a transaction is open.
    fn in_transaction(&self) -> bool;
}

impl std::fmt::Debug for dyn Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("driver", &self.driver_name())
            .finish_non_exhaustive()
    }
}

/// Configuration for one named connection.
///
/// The URL scheme names the driver; credentials and options are passed to
/// the driver untouched.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Connection URL, e.g. `sqlite::memory:`.
    pub url: String,
    /// Optional user name.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// Driver-specific options.
    pub options: BTreeMap<String, String>,
}

impl ConnectionConfig {
    /// Config with just a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            options: BTreeMap::new(),
        }
    }

    /// Sets credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Adds a driver option.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Driver name from the URL scheme.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedDriver`] when the URL carries no scheme.
    pub fn driver(&self) -> Result<&str> {
        self.url
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::UnsupportedDriver(self.url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_from_url_scheme() {
        assert_eq!(
            ConnectionConfig::new("sqlite::memory:").driver().unwrap(),
            "sqlite"
        );
        assert_eq!(
            ConnectionConfig::new("mysql://localhost/db").driver().unwrap(),
            "mysql"
        );
        assert!(ConnectionConfig::new("not-a-url").driver().is_err());
    }

    #[test]
    fn builder_setters() {
        let config = ConnectionConfig::new("sqlite:file.db")
            .credentials("u", "p")
            .option("busy_timeout", "5000");
        assert_eq!(config.username.as_deref(), Some("u"));
        assert_eq!(config.options.get("busy_timeout").map(String::as_str), Some("5000"));
    }
}
