//! Error types for SQL generation and client execution.

use thiserror::Error;

/// Errors produced while generating SQL or talking to a client.
#[derive(Debug, Error)]
pub enum Error {
    /// LIMIT/OFFSET was requested on a dialect with no defined clause form.
    #[error("limit/offset is not supported for driver \"{driver}\"")]
    UnsupportedDialect {
        /// Name of the offending driver.
        driver: &'static str,
    },

    /// A condition operator tag was not recognized.
    #[error("invalid operator \"{0}\"")]
    InvalidOperator(String),

    /// A SELECT was compiled without a FROM clause.
    #[error("cannot build a SELECT without a FROM clause")]
    MissingFromClause,

    /// A named placeholder in the SQL had no bound parameter.
    #[error("no value bound for parameter \"{0}\"")]
    MissingParameter(String),

    /// The connection URL names a driver this build cannot open.
    #[error("unsupported driver \"{0}\"")]
    UnsupportedDriver(String),

    /// A failure reported by the underlying database client, surfaced
    /// without reinterpretation.
    #[error("database error: {0}")]
    Database(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
