//! # loam-core
//!
//! SQL generation core for the loam database access layer.
//!
//! This crate holds the pure parts: dynamic SQL values, dialect rules
//! (identifier quoting, LIMIT/OFFSET form), the condition-expression
//! compiler, SELECT clause assembly, named-parameter expansion, and the
//! narrow [`Client`] trait that drivers implement. Nothing in here performs
//! I/O.
//!
//! ## Condition compilation
//!
//! ```rust
//! use loam_core::{Condition, Dialect};
//!
//! let cond = Condition::and(vec![
//!     Condition::raw("name = :name"),
//!     Condition::in_list("status", ["active", "pending"]),
//! ]);
//!
//! assert_eq!(
//!     cond.compile(Dialect::Sqlite),
//!     "(name = :name) AND (`status` IN ('active','pending'))"
//! );
//! ```
//!
//! ## Clause assembly
//!
//! ```rust
//! use loam_core::{Condition, Dialect, QuerySpec};
//!
//! let mut spec = QuerySpec::new();
//! spec.set_select("id, name");
//! spec.set_from("contact");
//! spec.set_where(Condition::raw("id = :id"));
//! spec.set_limit(5);
//!
//! assert_eq!(
//!     spec.build(Dialect::Sqlite).unwrap(),
//!     "SELECT `id`, `name` FROM `contact` WHERE id = :id LIMIT 5"
//! );
//! ```

pub mod bind;
pub mod client;
pub mod condition;
pub mod dialect;
mod error;
pub mod query;
pub mod row;
pub mod value;

pub use client::{Client, ConnectionConfig};
pub use condition::{Condition, Operator};
pub use dialect::Dialect;
pub use error::{Error, Result};
pub use query::{JoinKind, QuerySpec};
pub use row::Row;
pub use value::{Params, SqlValue, ToSqlValue, ValueMap};
