//! SQL dialect rules keyed by driver name.
//!
//! The two dialect-sensitive pieces of generated SQL are identifier quoting
//! and the LIMIT/OFFSET suffix. Both are selected at execution time from the
//! active connection's reported driver name.

use crate::error::{Error, Result};

/// SQL syntax variations per underlying driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// MySQL / MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// Microsoft SQL Server.
    SqlServer,
    /// Sybase.
    Sybase,
    /// FreeTDS dblib.
    DbLib,
    /// Anything unrecognized; follows the MySQL family rules.
    Generic,
}

impl Dialect {
    /// Selects a dialect from a driver name as reported by the client.
    #[must_use]
    pub fn from_driver_name(name: &str) -> Self {
        match name {
            "mysql" => Self::MySql,
            "sqlite" | "sqlite2" => Self::Sqlite,
            "pgsql" | "postgres" => Self::Postgres,
            "sqlsrv" | "mssql" => Self::SqlServer,
            "sybase" => Self::Sybase,
            "dblib" => Self::DbLib,
            _ => Self::Generic,
        }
    }

    /// Canonical driver name for this dialect.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Postgres => "pgsql",
            Self::SqlServer => "sqlsrv",
            Self::Sybase => "sybase",
            Self::DbLib => "dblib",
            Self::Generic => "generic",
        }
    }

    /// Identifier quote character.
    #[must_use]
    pub const fn quote_char(self) -> char {
        match self {
            Self::Postgres | Self::SqlServer | Self::Sybase | Self::DbLib => '"',
            Self::MySql | Self::Sqlite | Self::Generic => '`',
        }
    }

    /// Quotes a table or column identifier.
    ///
    /// Dotted names (`table.column`) are split and each segment quoted
    /// independently; `*` segments pass through unquoted. Pure string
    /// transform with no failure path.
    #[must_use]
    pub fn quote_identifier(self, name: &str) -> String {
        let quote = self.quote_char();
        let parts: Vec<String> = name
            .split('.')
            .map(|part| {
                if part == "*" {
                    String::from(part)
                } else {
                    format!("{quote}{part}{quote}")
                }
            })
            .collect();
        parts.join(".")
    }

    /// Appends the dialect's LIMIT/OFFSET suffix to `sql`.
    ///
    /// Zero values are treated as "not requested" and omitted. The SQL
    /// Server family has no clause form here and fails whenever a limit or
    /// offset is requested.
    pub fn push_limit_offset(
        self,
        sql: &mut String,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<()> {
        if matches!(self, Self::SqlServer | Self::Sybase | Self::DbLib) {
            if limit.is_some() || offset.is_some() {
                return Err(Error::UnsupportedDialect {
                    driver: self.name(),
                });
            }
            return Ok(());
        }

        if let Some(limit) = limit {
            if limit > 0 {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
        }
        if let Some(offset) = offset {
            if offset > 0 {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_name_selection() {
        assert_eq!(Dialect::from_driver_name("sqlite"), Dialect::Sqlite);
        assert_eq!(Dialect::from_driver_name("sqlite2"), Dialect::Sqlite);
        assert_eq!(Dialect::from_driver_name("pgsql"), Dialect::Postgres);
        assert_eq!(Dialect::from_driver_name("mssql"), Dialect::SqlServer);
        assert_eq!(Dialect::from_driver_name("weird"), Dialect::Generic);
    }

    #[test]
    fn quote_plain_identifier() {
        assert_eq!(Dialect::Sqlite.quote_identifier("name"), "`name`");
        assert_eq!(Dialect::Postgres.quote_identifier("name"), "\"name\"");
    }

    #[test]
    fn quote_dotted_identifier() {
        assert_eq!(Dialect::MySql.quote_identifier("a.b"), "`a`.`b`");
    }

    #[test]
    fn quote_star_passthrough() {
        assert_eq!(Dialect::Sqlite.quote_identifier("*"), "*");
        assert_eq!(Dialect::Sqlite.quote_identifier("t.*"), "`t`.*");
    }

    #[test]
    fn limit_offset_default_dialect() {
        let mut sql = String::from("SELECT * FROM t");
        Dialect::Sqlite
            .push_limit_offset(&mut sql, Some(5), Some(10))
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT 5 OFFSET 10");
    }

    #[test]
    fn limit_zero_is_omitted() {
        let mut sql = String::from("SELECT * FROM t");
        Dialect::Sqlite
            .push_limit_offset(&mut sql, Some(0), None)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t");
    }

    #[test]
    fn limit_on_sql_server_fails() {
        let mut sql = String::from("SELECT * FROM t");
        let err = Dialect::SqlServer
            .push_limit_offset(&mut sql, Some(5), None)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedDialect { driver: "sqlsrv" }));
    }

    #[test]
    fn no_limit_on_sql_server_is_fine() {
        let mut sql = String::from("SELECT * FROM t");
        Dialect::SqlServer
            .push_limit_offset(&mut sql, None, None)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t");
    }
}
