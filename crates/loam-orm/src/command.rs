//! The fluent SQL command builder.
//!
//! A [`Command`] accumulates clause fragments and bound parameters, then
//! compiles and runs them against its connection on a terminal call. Clause
//! methods consume and return the builder; terminal methods borrow it, so
//! one built command can be run more than once.

use std::sync::Arc;

use tracing::debug;

use loam_core::{
    Client, Condition, Dialect, JoinKind, Params, QuerySpec, Row, SqlValue, ValueMap,
};

use crate::db::Db;
use crate::error::{Error, Result};

/// One SQL command under construction.
#[derive(Clone)]
pub struct Command {
    db: Db,
    connection: String,
    spec: QuerySpec,
    params: Params,
    sql: Option<String>,
}

impl Command {
    pub(crate) fn new(db: Db, connection: String) -> Self {
        Self {
            db,
            connection,
            spec: QuerySpec::new(),
            params: Params::new(),
            sql: None,
        }
    }

    /// Sets the select list (comma-separated, aliases allowed).
    #[must_use]
    pub fn select(mut self, fields: &str) -> Self {
        self.spec.set_select(fields);
        self
    }

    /// Marks the query DISTINCT.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.spec.set_distinct();
        self
    }

    /// Sets the FROM table list (comma-separated, aliases allowed).
    #[must_use]
    pub fn from(mut self, tables: &str) -> Self {
        self.spec.set_from(tables);
        self
    }

    /// Appends an inner join.
    #[must_use]
    pub fn join(self, table: &str, on: Condition, params: Params) -> Self {
        self.add_join(JoinKind::Inner, table, on, params)
    }

    /// Appends a left join.
    #[must_use]
    pub fn left_join(self, table: &str, on: Condition, params: Params) -> Self {
        self.add_join(JoinKind::Left, table, on, params)
    }

    /// Appends a right join.
    #[must_use]
    pub fn right_join(self, table: &str, on: Condition, params: Params) -> Self {
        self.add_join(JoinKind::Right, table, on, params)
    }

    fn add_join(mut self, kind: JoinKind, table: &str, on: Condition, params: Params) -> Self {
        self.spec.add_join(kind, table, on);
        self.params.extend(params);
        self
    }

    /// Sets the WHERE condition and registers its bound parameters.
    #[must_use]
    pub fn where_clause(mut self, condition: Condition, params: Params) -> Self {
        self.spec.set_where(condition);
        self.params.extend(params);
        self
    }

    /// Sets the GROUP BY field list.
    #[must_use]
    pub fn group_by(mut self, fields: &str) -> Self {
        self.spec.set_group(fields);
        self
    }

    /// Sets the HAVING condition; only emitted alongside GROUP BY.
    #[must_use]
    pub fn having(mut self, condition: Condition, params: Params) -> Self {
        self.spec.set_having(condition);
        self.params.extend(params);
        self
    }

    /// Sets the ORDER BY field list (`field [ASC|DESC]`, comma-separated).
    #[must_use]
    pub fn order_by(mut self, fields: &str) -> Self {
        self.spec.set_order(fields);
        self
    }

    /// Sets the row limit.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.spec.set_limit(limit);
        self
    }

    /// Sets the row offset.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.spec.set_offset(offset);
        self
    }

    /// Appends a trailing UNION fragment, used verbatim.
    #[must_use]
    pub fn union(mut self, sql: &str) -> Self {
        self.spec.add_union(sql);
        self
    }

    /// Merges bound parameters; later bindings win on key collision.
    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    /// Sets raw SQL text, overriding any accumulated clauses.
    #[must_use]
    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Discards every clause, parameter and raw SQL override.
    #[must_use]
    pub fn reset(self) -> Self {
        Self::new(self.db, self.connection)
    }

    /// Compiled SQL text for the given dialect, without running anything.
    ///
    /// # Errors
    ///
    /// [`Error::MissingQuery`] when there is nothing to compile, plus any
    /// clause-assembly error.
    pub fn to_sql(&self, dialect: Dialect) -> Result<String> {
        match &self.sql {
            Some(sql) => Ok(sql.clone()),
            None if self.spec.is_empty() => Err(Error::MissingQuery),
            None => Ok(self.spec.build(dialect)?),
        }
    }

    async fn resolve(&self) -> Result<(Arc<dyn Client>, String)> {
        let client = self.db.client_named(&self.connection).await?;
        let dialect = Dialect::from_driver_name(client.driver_name());
        let sql = self.to_sql(dialect)?;
        debug!(connection = %self.connection, %sql, "command compiled");
        Ok((client, sql))
    }

    /// Runs the command and returns every row.
    pub async fn query_all(&self) -> Result<Vec<Row>> {
        let (client, sql) = self.resolve().await?;
        Ok(client.fetch_all(&sql, &self.params).await?)
    }

    /// Runs the command and returns the first row, if any.
    pub async fn query_row(&self) -> Result<Option<Row>> {
        let (client, sql) = self.resolve().await?;
        Ok(client.fetch_one(&sql, &self.params).await?)
    }

    /// Runs the command and returns the first column of every row.
    pub async fn query_column(&self) -> Result<Vec<SqlValue>> {
        let (client, sql) = self.resolve().await?;
        Ok(client.fetch_column(&sql, &self.params).await?)
    }

    /// Runs the command and returns the first column of the first row.
    pub async fn query_scalar(&self) -> Result<Option<SqlValue>> {
        let (client, sql) = self.resolve().await?;
        Ok(client.fetch_scalar(&sql, &self.params).await?)
    }

    /// Runs the command as a statement and returns the affected-row count.
    pub async fn execute(&self) -> Result<u64> {
        let (client, sql) = self.resolve().await?;
        Ok(client.execute(&sql, &self.params).await?)
    }

    /// Inserts one row and returns the affected-row count.
    ///
    /// Every value is bound through a named placeholder derived from its
    /// column name.
    pub async fn insert(self, table: &str, values: &ValueMap) -> Result<u64> {
        let client = self.db.client_named(&self.connection).await?;
        let dialect = Dialect::from_driver_name(client.driver_name());
        let mut params = self.params;
        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        for (column, value) in values {
            columns.push(dialect.quote_identifier(column));
            placeholders.push(format!(":{column}"));
            params.insert(format!(":{column}"), value.clone());
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_identifier(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        debug!(connection = %self.connection, %sql, "insert");
        Ok(client.execute(&sql, &params).await?)
    }

    /// Updates rows matching a condition and returns the affected-row count.
    ///
    /// SET values bind through `:set_`-prefixed placeholders so a column may
    /// also appear, with a different value, inside the condition parameters.
    pub async fn update(
        self,
        table: &str,
        values: &ValueMap,
        conditions: Condition,
        params: Params,
    ) -> Result<u64> {
        let client = self.db.client_named(&self.connection).await?;
        let dialect = Dialect::from_driver_name(client.driver_name());
        let mut all_params = self.params;
        all_params.extend(params);
        let mut assignments = Vec::with_capacity(values.len());
        for (column, value) in values {
            let placeholder = format!(":set_{column}");
            assignments.push(format!(
                "{} = {placeholder}",
                dialect.quote_identifier(column)
            ));
            all_params.insert(placeholder, value.clone());
        }
        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_identifier(table),
            assignments.join(", ")
        );
        let compiled = conditions.compile(dialect);
        if !compiled.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&compiled);
        }
        debug!(connection = %self.connection, %sql, "update");
        Ok(client.execute(&sql, &all_params).await?)
    }

    /// Deletes rows matching a condition and returns the affected-row count.
    ///
    /// An empty condition deletes every row in the table.
    pub async fn delete(self, table: &str, conditions: Condition, params: Params) -> Result<u64> {
        let client = self.db.client_named(&self.connection).await?;
        let dialect = Dialect::from_driver_name(client.driver_name());
        let mut all_params = self.params;
        all_params.extend(params);
        let mut sql = format!("DELETE FROM {}", dialect.quote_identifier(table));
        let compiled = conditions.compile(dialect);
        if !compiled.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&compiled);
        }
        debug!(connection = %self.connection, %sql, "delete");
        Ok(client.execute(&sql, &all_params).await?)
    }
}
