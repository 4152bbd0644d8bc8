//! Record factories: finder, mutation and counting helpers for one table.
//!
//! A [`Factory`] pairs a [`Db`] handle with a [`ModelSpec`] and exposes the
//! query vocabulary of the table: `find*`, `update*`, `delete*`, `count*`,
//! plus row-to-model mapping. Dynamic helper names in the
//! `findOneBy<Field>` family are parsed by [`HelperCall`] and routed
//! through [`Factory::dispatch`].

use heck::ToSnakeCase;
use tracing::debug;

use loam_core::{Condition, Params, Row, SqlValue, ToSqlValue, ValueMap};

use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::{Model, ModelSpec};

/// Record factory for one table description.
#[derive(Clone)]
pub struct Factory {
    db: Db,
    spec: ModelSpec,
}

impl Factory {
    pub(crate) fn new(db: Db, spec: ModelSpec) -> Self {
        Self { db, spec }
    }

    /// The table this factory serves.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.spec.table
    }

    /// A new, unsaved record with the given field values staged.
    #[must_use]
    pub fn create(&self, values: ValueMap) -> Model {
        Model::new(self.db.clone(), self.spec.clone(), values, true)
    }

    /// Wraps one fetched row as a persisted record.
    #[must_use]
    pub fn map(&self, row: Row) -> Model {
        Model::new(self.db.clone(), self.spec.clone(), row.into_map(), false)
    }

    /// Wraps fetched rows as persisted records.
    #[must_use]
    pub fn map_rows(&self, rows: Vec<Row>) -> Vec<Model> {
        rows.into_iter().map(|row| self.map(row)).collect()
    }

    pub(crate) fn single_pk_column(&self) -> Result<String> {
        self.spec
            .pk
            .single_column()
            .map(String::from)
            .ok_or(Error::CompositeKeyScalar)
    }

    fn pk_conditions(&self, values: &ValueMap) -> Result<(Condition, Params)> {
        let mut fragments = Vec::new();
        let mut params = Params::new();
        for (idx, column) in self.spec.pk.columns().iter().enumerate() {
            let value = values
                .get(column)
                .ok_or_else(|| Error::MissingPrimaryKey(column.clone()))?;
            let placeholder = format!(":pk{idx}");
            fragments.push(Condition::raw(format!("{column} = {placeholder}")));
            params.insert(placeholder, value.clone());
        }
        Ok((Condition::and(fragments), params))
    }

    fn field_condition(field: &str, value: impl ToSqlValue) -> (Condition, Params) {
        let mut params = Params::new();
        params.insert(String::from(":key"), value.to_sql_value());
        (Condition::raw(format!("{field} = :key")), params)
    }

    /// Finds one record by its single-column primary key value.
    ///
    /// # Errors
    ///
    /// [`Error::CompositeKeyScalar`] when the key is composite; use
    /// [`Factory::find_by_map`] instead.
    pub async fn find(&self, pk: impl ToSqlValue) -> Result<Option<Model>> {
        let column = self.single_pk_column()?;
        self.find_one_by(&column, pk).await
    }

    /// Alias of [`Factory::find`], matching the mutation helpers' naming.
    ///
    /// # Errors
    ///
    /// [`Error::CompositeKeyScalar`] when the key is composite.
    pub async fn find_by_pk(&self, pk: impl ToSqlValue) -> Result<Option<Model>> {
        self.find(pk).await
    }

    /// Finds one record by a full primary key value map.
    ///
    /// # Errors
    ///
    /// [`Error::MissingPrimaryKey`] when a key column is absent from the
    /// map.
    pub async fn find_by_map(&self, key_values: &ValueMap) -> Result<Option<Model>> {
        let (conditions, params) = self.pk_conditions(key_values)?;
        self.find_one(conditions, params).await
    }

    /// Fetches every record of the table.
    pub async fn find_all(&self) -> Result<Vec<Model>> {
        let rows = self.db.command().from(&self.spec.table).query_all().await?;
        Ok(self.map_rows(rows))
    }

    /// Finds the first record matching a condition.
    pub async fn find_one(&self, conditions: Condition, params: Params) -> Result<Option<Model>> {
        let row = self
            .db
            .command()
            .from(&self.spec.table)
            .where_clause(conditions, params)
            .limit(1)
            .query_row()
            .await?;
        Ok(row.map(|row| self.map(row)))
    }

    /// Finds the first record whose field equals the given value.
    pub async fn find_one_by(&self, field: &str, value: impl ToSqlValue) -> Result<Option<Model>> {
        let (conditions, params) = Self::field_condition(field, value);
        self.find_one(conditions, params).await
    }

    /// Finds every record matching a condition, with optional ordering and
    /// paging.
    pub async fn find_many(
        &self,
        conditions: Condition,
        params: Params,
        order_by: Option<&str>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<Model>> {
        let mut command = self
            .db
            .command()
            .from(&self.spec.table)
            .where_clause(conditions, params);
        if let Some(order) = order_by {
            command = command.order_by(order);
        }
        if let Some(limit) = limit {
            command = command.limit(limit);
        }
        if let Some(offset) = offset {
            command = command.offset(offset);
        }
        Ok(self.map_rows(command.query_all().await?))
    }

    /// Finds every record whose field equals the given value.
    pub async fn find_many_by(
        &self,
        field: &str,
        value: impl ToSqlValue,
        order_by: Option<&str>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<Model>> {
        let (conditions, params) = Self::field_condition(field, value);
        self.find_many(conditions, params, order_by, limit, offset).await
    }

    /// Counts the records matching a condition.
    pub async fn count(&self, conditions: Condition, params: Params) -> Result<i64> {
        let scalar = self
            .db
            .command()
            .select("COUNT(*)")
            .from(&self.spec.table)
            .where_clause(conditions, params)
            .query_scalar()
            .await?;
        Ok(scalar.as_ref().and_then(SqlValue::as_i64).unwrap_or(0))
    }

    /// Counts the records whose field equals the given value.
    pub async fn count_by(&self, field: &str, value: impl ToSqlValue) -> Result<i64> {
        let (conditions, params) = Self::field_condition(field, value);
        self.count(conditions, params).await
    }

    /// Inserts one row of raw values, bypassing the model lifecycle.
    pub async fn insert(&self, values: &ValueMap) -> Result<u64> {
        self.db.command().insert(&self.spec.table, values).await
    }

    /// Updates rows matching a condition with the given values.
    pub async fn update(
        &self,
        values: &ValueMap,
        conditions: Condition,
        params: Params,
    ) -> Result<u64> {
        self.db
            .command()
            .update(&self.spec.table, values, conditions, params)
            .await
    }

    /// Updates rows whose field equals the given value.
    pub async fn update_by(
        &self,
        field: &str,
        value: impl ToSqlValue,
        values: &ValueMap,
    ) -> Result<u64> {
        let (conditions, params) = Self::field_condition(field, value);
        self.update(values, conditions, params).await
    }

    /// Updates the row with the given single-column primary key value.
    ///
    /// # Errors
    ///
    /// [`Error::CompositeKeyScalar`] when the key is composite.
    pub async fn update_by_pk(&self, pk: impl ToSqlValue, values: &ValueMap) -> Result<u64> {
        let column = self.single_pk_column()?;
        self.update_by(&column, pk, values).await
    }

    /// Deletes rows matching a condition.
    pub async fn delete(&self, conditions: Condition, params: Params) -> Result<u64> {
        self.db
            .command()
            .delete(&self.spec.table, conditions, params)
            .await
    }

    /// Deletes rows whose field equals the given value.
    pub async fn delete_by(&self, field: &str, value: impl ToSqlValue) -> Result<u64> {
        let (conditions, params) = Self::field_condition(field, value);
        self.delete(conditions, params).await
    }

    /// Deletes the row with the given single-column primary key value.
    ///
    /// # Errors
    ///
    /// [`Error::CompositeKeyScalar`] when the key is composite.
    pub async fn delete_by_pk(&self, pk: impl ToSqlValue) -> Result<u64> {
        let column = self.single_pk_column()?;
        self.delete_by(&column, pk).await
    }

    /// Routes a dynamic helper name to the matching typed method.
    ///
    /// The trailing arguments are forwarded to whichever typed method is
    /// selected: `values` is only consulted by `updateBy<Field>` calls, and
    /// `order_by`/`limit`/`offset` only by `findManyBy<Field>` calls.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMethod`] for unrecognized names and
    /// [`Error::MissingUpdateValues`] when an update helper is called
    /// without a value map.
    pub async fn dispatch(
        &self,
        method: &str,
        value: impl ToSqlValue,
        values: Option<&ValueMap>,
        order_by: Option<&str>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Dispatched> {
        let call = HelperCall::parse(method)?;
        debug!(table = %self.spec.table, %method, field = %call.field(), "helper dispatched");
        match call {
            HelperCall::FindOneBy(field) => {
                Ok(Dispatched::One(self.find_one_by(&field, value).await?))
            }
            HelperCall::FindManyBy(field) => Ok(Dispatched::Many(
                self.find_many_by(&field, value, order_by, limit, offset)
                    .await?,
            )),
            HelperCall::CountBy(field) => {
                Ok(Dispatched::Count(self.count_by(&field, value).await?))
            }
            HelperCall::UpdateBy(field) => {
                let values = values.ok_or(Error::MissingUpdateValues)?;
                Ok(Dispatched::Affected(
                    self.update_by(&field, value, values).await?,
                ))
            }
            HelperCall::DeleteBy(field) => Ok(Dispatched::Affected(
                self.delete_by(&field, value).await?,
            )),
        }
    }
}

/// Result of a dynamic helper dispatch.
#[derive(Debug)]
pub enum Dispatched {
    /// A single optional record, from `findOneBy<Field>`.
    One(Option<Model>),
    /// A record list, from `findManyBy<Field>`.
    Many(Vec<Model>),
    /// A count, from `countBy<Field>`.
    Count(i64),
    /// An affected-row count, from `updateBy<Field>`/`deleteBy<Field>`.
    Affected(u64),
}

/// A parsed dynamic helper name.
///
/// The `<Field>` suffix is converted from camel case to the snake-case
/// column name, so `findOneByFirstName` targets the `first_name` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperCall {
    /// `findOneBy<Field>`.
    FindOneBy(String),
    /// `findManyBy<Field>`.
    FindManyBy(String),
    /// `updateBy<Field>`.
    UpdateBy(String),
    /// `deleteBy<Field>`.
    DeleteBy(String),
    /// `countBy<Field>`.
    CountBy(String),
}

impl HelperCall {
    /// Parses a helper method name.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMethod`] when the name matches no helper pattern or
    /// carries an empty field suffix.
    pub fn parse(method: &str) -> Result<Self> {
        let (make, field): (fn(String) -> Self, &str) =
            if let Some(field) = method.strip_prefix("findOneBy") {
                (Self::FindOneBy, field)
            } else if let Some(field) = method.strip_prefix("findManyBy") {
                (Self::FindManyBy, field)
            } else if let Some(field) = method.strip_prefix("updateBy") {
                (Self::UpdateBy, field)
            } else if let Some(field) = method.strip_prefix("deleteBy") {
                (Self::DeleteBy, field)
            } else if let Some(field) = method.strip_prefix("countBy") {
                (Self::CountBy, field)
            } else {
                return Err(Error::UnknownMethod(String::from(method)));
            };
        if field.is_empty() {
            return Err(Error::UnknownMethod(String::from(method)));
        }
        Ok(make(field.to_snake_case()))
    }

    /// The targeted column name.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::FindOneBy(field)
            | Self::FindManyBy(field)
            | Self::UpdateBy(field)
            | Self::DeleteBy(field)
            | Self::CountBy(field) => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_names_parse_to_snake_case_fields() {
        assert_eq!(
            HelperCall::parse("findOneByName").unwrap(),
            HelperCall::FindOneBy(String::from("name"))
        );
        assert_eq!(
            HelperCall::parse("findManyByFirstName").unwrap(),
            HelperCall::FindManyBy(String::from("first_name"))
        );
        assert_eq!(
            HelperCall::parse("updateByEmail").unwrap(),
            HelperCall::UpdateBy(String::from("email"))
        );
        assert_eq!(
            HelperCall::parse("deleteByTagId").unwrap(),
            HelperCall::DeleteBy(String::from("tag_id"))
        );
        assert_eq!(
            HelperCall::parse("countByCity").unwrap(),
            HelperCall::CountBy(String::from("city"))
        );
    }

    #[test]
    fn unknown_helper_names_fail_loudly() {
        assert!(matches!(
            HelperCall::parse("findEverything"),
            Err(Error::UnknownMethod(name)) if name == "findEverything"
        ));
        assert!(matches!(
            HelperCall::parse("findOneBy"),
            Err(Error::UnknownMethod(_))
        ));
    }
}
