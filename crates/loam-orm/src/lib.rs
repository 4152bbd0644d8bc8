//! # loam-orm
//!
//! Connection registry, fluent command builder and active-record layer of
//! the loam database access stack.
//!
//! [`Db`] holds named connections and opens clients lazily. [`Command`]
//! accumulates clause fragments and bound parameters, compiles them for the
//! connection's dialect and runs them. [`ModelSpec`]/[`Model`] give one
//! record of a table a save/delete lifecycle with change tracking, hooks
//! and relations, and [`Factory`] provides the table-level query
//! vocabulary, including dynamic `findOneBy<Field>`-style helpers.
//!
//! ```rust,no_run
//! use loam_orm::{Condition, Db, ModelSpec, Params, SqlValue, ValueMap};
//!
//! # async fn example() -> loam_orm::Result<()> {
//! let db = Db::new("sqlite:app.db");
//! let contacts = db.factory(ModelSpec::table("contact"));
//!
//! let mut values = ValueMap::new();
//! values.insert(String::from("name"), SqlValue::Text(String::from("Ada")));
//! let mut record = contacts.create(values);
//! record.save().await?;
//!
//! let found = contacts.find_one_by("name", "Ada").await?;
//! assert!(found.is_some());
//! # Ok(())
//! # }
//! ```

mod command;
mod db;
mod error;
mod factory;
mod model;

pub use command::Command;
pub use db::{Db, DEFAULT_CONNECTION};
pub use error::{Error, Result};
pub use factory::{Dispatched, Factory, HelperCall};
pub use model::{
    Hooks, Model, ModelSpec, PrimaryKey, Related, Relation, RelationKind, Through,
};

// Core vocabulary re-exported so callers rarely need loam-core directly.
pub use loam_core::{
    Condition, ConnectionConfig, Dialect, JoinKind, Operator, Params, Row, SqlValue, ToSqlValue,
    ValueMap,
};
