//! The connection registry.
//!
//! A [`Db`] owns a set of named [`ConnectionConfig`]s and lazily opens a
//! [`Client`] per name on first use. One connection is "current" at any
//! time; commands and factories created from the registry run against it
//! unless pinned to another name.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::debug;

use loam_core::{Client, ConnectionConfig, Dialect};
use loam_sqlite::SqliteClient;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::model::ModelSpec;

/// Name under which the first registered connection is stored.
pub const DEFAULT_CONNECTION: &str = "default";

/// A cloneable handle to the connection registry.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    configs: RwLock<BTreeMap<String, ConnectionConfig>>,
    // Lazily opened clients, keyed by connection name. A tokio mutex since
    // opening a connection awaits while the map is held.
    clients: Mutex<BTreeMap<String, Arc<dyn Client>>>,
    current: RwLock<String>,
}

impl Db {
    /// Creates a registry with a single default connection URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_config(ConnectionConfig::new(url))
    }

    /// Creates a registry with a full default connection config.
    #[must_use]
    pub fn with_config(config: ConnectionConfig) -> Self {
        let mut configs = BTreeMap::new();
        configs.insert(String::from(DEFAULT_CONNECTION), config);
        Self {
            inner: Arc::new(DbInner {
                configs: RwLock::new(configs),
                clients: Mutex::new(BTreeMap::new()),
                current: RwLock::new(String::from(DEFAULT_CONNECTION)),
            }),
        }
    }

    /// Registers (or replaces) a named connection config.
    ///
    /// Replacing a config does not close an already-opened client under the
    /// same name; the old client keeps serving until the process drops it.
    pub fn add_connection(&self, name: impl Into<String>, config: ConnectionConfig) {
        let name = name.into();
        debug!(connection = %name, "connection registered");
        self.inner
            .configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, config);
    }

    /// Makes a registered connection the current one.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConnection`] when no config exists under `name`.
    pub fn switch_to(&self, name: &str) -> Result<()> {
        let known = self
            .inner
            .configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name);
        if !known {
            return Err(Error::UnknownConnection(String::from(name)));
        }
        *self
            .inner
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = String::from(name);
        debug!(connection = %name, "current connection switched");
        Ok(())
    }

    /// Name of the current connection.
    #[must_use]
    pub fn current_connection(&self) -> String {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Client for the current connection, opening it on first use.
    pub async fn client(&self) -> Result<Arc<dyn Client>> {
        self.client_named(&self.current_connection()).await
    }

    /// Client for a named connection, opening it on first use.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConnection`] for unregistered names, and driver
    /// errors when the connection cannot be opened.
    pub async fn client_named(&self, name: &str) -> Result<Arc<dyn Client>> {
        let mut clients = self.inner.clients.lock().await;
        if let Some(client) = clients.get(name) {
            return Ok(Arc::clone(client));
        }
        let config = self
            .inner
            .configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownConnection(String::from(name)))?;
        let driver = config.driver()?;
        let client: Arc<dyn Client> = match driver {
            "sqlite" | "sqlite2" => Arc::new(SqliteClient::connect(&config).await?),
            other => {
                return Err(Error::Core(loam_core::Error::UnsupportedDriver(
                    String::from(other),
                )))
            }
        };
        clients.insert(String::from(name), Arc::clone(&client));
        Ok(client)
    }

    /// Dialect of the current connection.
    pub async fn dialect(&self) -> Result<Dialect> {
        let client = self.client().await?;
        Ok(Dialect::from_driver_name(client.driver_name()))
    }

    /// Quotes an identifier with the current connection's dialect.
    pub async fn quote_identifier(&self, name: &str) -> Result<String> {
        Ok(self.dialect().await?.quote_identifier(name))
    }

    /// A fresh command bound to the current connection.
    #[must_use]
    pub fn command(&self) -> Command {
        Command::new(self.clone(), self.current_connection())
    }

    /// A fresh command pinned to a named connection.
    #[must_use]
    pub fn command_on(&self, connection: &str) -> Command {
        Command::new(self.clone(), String::from(connection))
    }

    /// A record factory for one table description.
    #[must_use]
    pub fn factory(&self, spec: ModelSpec) -> Factory {
        Factory::new(self.clone(), spec)
    }

    /// Opens a transaction on the current connection.
    pub async fn begin_transaction(&self) -> Result<()> {
        Ok(self.client().await?.begin_transaction().await?)
    }

    /// Commits the open transaction on the current connection.
    pub async fn commit(&self) -> Result<()> {
        Ok(self.client().await?.commit().await?)
    }

    /// Rolls back the open transaction on the current connection.
    pub async fn rollback(&self) -> Result<()> {
        Ok(self.client().await?.rollback().await?)
    }

    /// True while the current connection has an open transaction.
    pub async fn in_transaction(&self) -> Result<bool> {
        Ok(self.client().await?.in_transaction())
    }

    /// Identifier generated by the most recent INSERT on the current
    /// connection, if the driver reports one.
    pub async fn last_insert_id(&self) -> Result<Option<i64>> {
        Ok(self.client().await?.last_insert_id().await?)
    }
}
