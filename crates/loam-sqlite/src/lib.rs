//! # loam-sqlite
//!
//! SQLite driver binding for the loam database access layer.
//!
//! [`SqliteClient`] implements the [`loam_core::Client`] capability trait on
//! top of a `sqlx` SQLite pool. The pool is capped at one connection so the
//! session-level pieces of the contract — transaction pass-throughs and the
//! last-insert id — behave like a single database handle.
//!
//! ```rust,no_run
//! use loam_core::{Client, ConnectionConfig, Params};
//! use loam_sqlite::SqliteClient;
//!
//! # async fn example() -> loam_core::Result<()> {
//! let client = SqliteClient::connect(&ConnectionConfig::new("sqlite::memory:")).await?;
//! client
//!     .execute("CREATE TABLE contact (id INTEGER PRIMARY KEY, name TEXT)", &Params::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::SqliteClient;
