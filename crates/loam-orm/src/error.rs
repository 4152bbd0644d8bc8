//! ORM-layer errors.

use thiserror::Error;

/// Errors raised by the registry, command builder and model layer.
#[derive(Debug, Error)]
pub enum Error {
    /// An error bubbled up from SQL generation or the driver.
    #[error(transparent)]
    Core(#[from] loam_core::Error),

    /// A helper method name did not match any recognized pattern.
    #[error("unknown helper method \"{0}\"")]
    UnknownMethod(String),

    /// A connection name was never registered.
    #[error("unknown connection \"{0}\"")]
    UnknownConnection(String),

    /// A relation name was never registered on the model.
    #[error("unknown relation \"{0}\"")]
    UnknownRelation(String),

    /// A join-table descriptor could not be parsed.
    #[error("invalid join-table descriptor \"{0}\"")]
    InvalidThrough(String),

    /// A command was executed with no clauses and no raw SQL.
    #[error("nothing to execute: no SQL text and no registered clauses")]
    MissingQuery,

    /// A record is missing the value for one of its key columns.
    #[error("missing primary key value for column \"{0}\"")]
    MissingPrimaryKey(String),

    /// A scalar key value was used against a composite primary key.
    #[error("composite primary key requires one value per key column")]
    CompositeKeyScalar,

    /// `save` was called on a clean, already-persisted record.
    #[error("nothing to save: record is persisted and has no pending changes")]
    NothingToSave,

    /// An update helper was called without a value map.
    #[error("update helpers require a value map")]
    MissingUpdateValues,

    /// A lifecycle hook vetoed the operation.
    #[error("{0} hook rejected the operation")]
    HookRejected(&'static str),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
