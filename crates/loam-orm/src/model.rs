//! Active-record models.
//!
//! A [`ModelSpec`] describes one table: name, primary key, relations and
//! optional lifecycle hooks. A [`Model`] is one record of that table,
//! tracking persisted state and pending changes separately so `save`
//! issues the minimal INSERT or UPDATE.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use loam_core::{Condition, Params, SqlValue, ToSqlValue, ValueMap};

use crate::db::Db;
use crate::error::{Error, Result};

/// The primary key shape of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    /// A single key column.
    Single(String),
    /// Multiple key columns forming a composite key.
    Composite(Vec<String>),
}

impl PrimaryKey {
    /// A single-column key.
    pub fn single(column: impl Into<String>) -> Self {
        Self::Single(column.into())
    }

    /// A composite key over the given columns.
    pub fn composite<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Composite(columns.into_iter().map(Into::into).collect())
    }

    /// The key columns, in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        match self {
            Self::Single(column) => std::slice::from_ref(column),
            Self::Composite(columns) => columns,
        }
    }

    /// The key column when the key is single-column.
    #[must_use]
    pub fn single_column(&self) -> Option<&str> {
        match self {
            Self::Single(column) => Some(column),
            Self::Composite(_) => None,
        }
    }
}

/// Lifecycle hooks attached to a [`ModelSpec`].
///
/// `before_*` hooks may veto the operation by returning `false`; the model
/// then fails with [`Error::HookRejected`] without touching storage.
pub trait Hooks: Send + Sync {
    /// Runs before an INSERT or UPDATE; return `false` to veto.
    fn before_save(&self, model: &mut Model) -> bool {
        let _ = model;
        true
    }

    /// Runs after a successful INSERT or UPDATE.
    fn after_save(&self, model: &mut Model) {
        let _ = model;
    }

    /// Runs before a DELETE; return `false` to veto.
    fn before_delete(&self, model: &mut Model) -> bool {
        let _ = model;
        true
    }

    /// Runs after a successful DELETE.
    fn after_delete(&self, model: &mut Model) {
        let _ = model;
    }
}

/// Parsed join-table descriptor for many-to-many relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Through {
    /// The join table name.
    pub table: String,
    /// Join-table column referencing this side; defaults to the local key.
    pub local_key: Option<String>,
    /// Join-table column referencing the target side; defaults to the
    /// target key.
    pub target_key: Option<String>,
}

impl Through {
    /// Parses a `table[,local_key[,target_key]]` descriptor.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidThrough`] when the table part is empty.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut parts = descriptor.split(',').map(str::trim);
        let table = parts
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidThrough(String::from(descriptor)))?;
        let local_key = parts.next().filter(|k| !k.is_empty()).map(String::from);
        let target_key = parts.next().filter(|k| !k.is_empty()).map(String::from);
        Ok(Self {
            table: String::from(table),
            local_key,
            target_key,
        })
    }
}

/// The cardinality of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// This record owns at most one target record.
    OneToOne,
    /// This record owns many target records.
    OneToMany,
    /// Many records of this table reference one target record.
    ManyToOne,
    /// Records are linked through a join table.
    ManyToMany(Through),
}

/// One named relation from a table to a target table.
#[derive(Debug, Clone)]
pub struct Relation {
    pub(crate) kind: RelationKind,
    pub(crate) target: ModelSpec,
    pub(crate) key: Option<String>,
    pub(crate) target_key: Option<String>,
}

impl Relation {
    fn new(kind: RelationKind, target: ModelSpec) -> Self {
        Self {
            kind,
            target,
            key: None,
            target_key: None,
        }
    }

    /// A one-to-one relation; keys default to both primary keys.
    #[must_use]
    pub fn one_to_one(target: ModelSpec) -> Self {
        Self::new(RelationKind::OneToOne, target)
    }

    /// A one-to-many relation; the target key defaults to the local key,
    /// which defaults to this table's primary key.
    #[must_use]
    pub fn one_to_many(target: ModelSpec) -> Self {
        Self::new(RelationKind::OneToMany, target)
    }

    /// A many-to-one relation; the local key defaults to the target key,
    /// which defaults to the target's primary key.
    #[must_use]
    pub fn many_to_one(target: ModelSpec) -> Self {
        Self::new(RelationKind::ManyToOne, target)
    }

    /// A many-to-many relation through a join table.
    ///
    /// The descriptor is `table[,local_key[,target_key]]`; omitted keys
    /// default to the key columns of the two sides.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidThrough`] for an empty table part.
    pub fn many_to_many(target: ModelSpec, through: &str) -> Result<Self> {
        Ok(Self::new(
            RelationKind::ManyToMany(Through::parse(through)?),
            target,
        ))
    }

    /// Overrides the local key column.
    #[must_use]
    pub fn key(mut self, column: impl Into<String>) -> Self {
        self.key = Some(column.into());
        self
    }

    /// Overrides the target key column.
    #[must_use]
    pub fn target_key(mut self, column: impl Into<String>) -> Self {
        self.target_key = Some(column.into());
        self
    }
}

/// Static description of one table's records.
#[derive(Clone)]
pub struct ModelSpec {
    pub(crate) table: String,
    pub(crate) pk: PrimaryKey,
    pub(crate) relations: BTreeMap<String, Relation>,
    pub(crate) hooks: Option<Arc<dyn Hooks>>,
}

impl ModelSpec {
    /// A spec for a table with the conventional `id` primary key.
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            pk: PrimaryKey::single("id"),
            relations: BTreeMap::new(),
            hooks: None,
        }
    }

    /// Overrides the primary key.
    #[must_use]
    pub fn primary_key(mut self, pk: PrimaryKey) -> Self {
        self.pk = pk;
        self
    }

    /// Registers a named relation.
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    /// Attaches lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// The table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// The primary key shape.
    #[must_use]
    pub fn primary_key_shape(&self) -> &PrimaryKey {
        &self.pk
    }
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec")
            .field("table", &self.table)
            .field("pk", &self.pk)
            .field("relations", &self.relations.keys())
            .finish_non_exhaustive()
    }
}

/// The result of resolving a named relation.
#[derive(Debug)]
pub enum Related {
    /// A to-one relation: at most one record.
    One(Option<Model>),
    /// A to-many relation: zero or more records.
    Many(Vec<Model>),
}

/// One record of a table, tracking persisted and pending state.
pub struct Model {
    db: Db,
    spec: ModelSpec,
    data: ValueMap,
    dirty: ValueMap,
    is_new: bool,
}

impl Model {
    pub(crate) fn new(db: Db, spec: ModelSpec, values: ValueMap, is_new: bool) -> Self {
        let (data, dirty) = if is_new {
            (ValueMap::new(), values)
        } else {
            (values, ValueMap::new())
        };
        Self {
            db,
            spec,
            data,
            dirty,
            is_new,
        }
    }

    /// The table this record belongs to.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.spec.table
    }

    /// True until the record has been written to storage.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// True while changes are pending.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Field value, preferring a pending change over the persisted value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&SqlValue> {
        self.dirty.get(field).or_else(|| self.data.get(field))
    }

    /// Persisted field value, ignoring pending changes.
    #[must_use]
    pub fn persisted(&self, field: &str) -> Option<&SqlValue> {
        self.data.get(field)
    }

    /// Effective field map: persisted values overlaid with pending changes.
    #[must_use]
    pub fn all(&self) -> ValueMap {
        let mut merged = self.data.clone();
        merged.extend(self.dirty.clone());
        merged
    }

    /// Stages one field change.
    pub fn set(&mut self, field: impl Into<String>, value: impl ToSqlValue) -> &mut Self {
        self.dirty.insert(field.into(), value.to_sql_value());
        self
    }

    /// Replaces every staged change with the given map.
    pub fn set_all(&mut self, values: ValueMap) -> &mut Self {
        self.dirty = values;
        self
    }

    /// Discards one staged change.
    pub fn unset(&mut self, field: &str) -> &mut Self {
        self.dirty.remove(field);
        self
    }

    fn pk_conditions(&self) -> Result<(Condition, Params)> {
        let mut fragments = Vec::new();
        let mut params = Params::new();
        for (idx, column) in self.spec.pk.columns().iter().enumerate() {
            let value = self
                .data
                .get(column)
                .ok_or_else(|| Error::MissingPrimaryKey(column.clone()))?;
            let placeholder = format!(":pk{idx}");
            fragments.push(Condition::raw(format!("{column} = {placeholder}")));
            params.insert(placeholder, value.clone());
        }
        Ok((Condition::and(fragments), params))
    }

    /// Writes the record: INSERT when new, UPDATE by primary key otherwise.
    ///
    /// On a successful INSERT the staged values become the persisted state
    /// and a driver-reported insert id is stored under a single-column key.
    ///
    /// # Errors
    ///
    /// [`Error::NothingToSave`] when there are no staged changes,
    /// [`Error::HookRejected`] on veto, [`Error::MissingPrimaryKey`] when
    /// updating without a complete key, plus storage errors. Staged state
    /// is kept intact on any failure.
    pub async fn save(&mut self) -> Result<u64> {
        let hooks = self.spec.hooks.clone();
        if let Some(hooks) = &hooks {
            if !hooks.before_save(self) {
                return Err(Error::HookRejected("before_save"));
            }
        }
        if self.dirty.is_empty() {
            return Err(Error::NothingToSave);
        }

        let affected = if self.is_new {
            let affected = self.db.command().insert(&self.spec.table, &self.dirty).await?;
            let mut data = std::mem::take(&mut self.dirty);
            if let PrimaryKey::Single(column) = &self.spec.pk {
                if let Some(id) = self.db.last_insert_id().await? {
                    data.insert(column.clone(), SqlValue::Int(id));
                }
            }
            self.data = data;
            self.is_new = false;
            debug!(table = %self.spec.table, "record inserted");
            affected
        } else {
            let (conditions, params) = self.pk_conditions()?;
            let affected = self
                .db
                .command()
                .update(&self.spec.table, &self.dirty, conditions, params)
                .await?;
            let dirty = std::mem::take(&mut self.dirty);
            self.data.extend(dirty);
            debug!(table = %self.spec.table, "record updated");
            affected
        };

        if let Some(hooks) = &hooks {
            hooks.after_save(self);
        }
        Ok(affected)
    }

    /// Deletes the record by primary key and clears its state.
    ///
    /// A record never persisted is only cleared locally; no statement runs
    /// and zero is returned.
    ///
    /// # Errors
    ///
    /// [`Error::HookRejected`] on veto, [`Error::MissingPrimaryKey`] when
    /// the key is incomplete, plus storage errors.
    pub async fn delete(&mut self) -> Result<u64> {
        let hooks = self.spec.hooks.clone();
        if let Some(hooks) = &hooks {
            if !hooks.before_delete(self) {
                return Err(Error::HookRejected("before_delete"));
            }
        }

        let affected = if self.is_new {
            0
        } else {
            let (conditions, params) = self.pk_conditions()?;
            let affected = self
                .db
                .command()
                .delete(&self.spec.table, conditions, params)
                .await?;
            debug!(table = %self.spec.table, "record deleted");
            affected
        };
        self.data.clear();
        self.dirty.clear();
        self.is_new = true;

        if let Some(hooks) = &hooks {
            hooks.after_delete(self);
        }
        Ok(affected)
    }

    fn local_pk_column(&self) -> Result<String> {
        self.spec
            .pk
            .single_column()
            .map(String::from)
            .ok_or(Error::CompositeKeyScalar)
    }

    fn key_value(&self, key: &str) -> SqlValue {
        self.get(key).cloned().unwrap_or(SqlValue::Null)
    }

    /// Resolves a named relation into related records.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownRelation`] for unregistered names,
    /// [`Error::CompositeKeyScalar`] when a defaulted key falls back to a
    /// composite primary key, plus storage errors.
    pub async fn related(&self, name: &str) -> Result<Related> {
        let relation = self
            .spec
            .relations
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownRelation(String::from(name)))?;
        let factory = self.db.factory(relation.target.clone());

        match &relation.kind {
            RelationKind::OneToOne => {
                let key = match relation.key {
                    Some(key) => key,
                    None => self.local_pk_column()?,
                };
                let target_key = match relation.target_key {
                    Some(key) => key,
                    None => factory.single_pk_column()?,
                };
                let found = factory.find_one_by(&target_key, self.key_value(&key)).await?;
                Ok(Related::One(found))
            }
            RelationKind::OneToMany => {
                let key = match relation.key {
                    Some(key) => key,
                    None => self.local_pk_column()?,
                };
                let target_key = relation.target_key.unwrap_or_else(|| key.clone());
                let found = factory
                    .find_many_by(&target_key, self.key_value(&key), None, None, None)
                    .await?;
                Ok(Related::Many(found))
            }
            RelationKind::ManyToOne => {
                let target_key = match relation.target_key {
                    Some(key) => key,
                    None => factory.single_pk_column()?,
                };
                let key = relation.key.unwrap_or_else(|| target_key.clone());
                let found = factory.find_one_by(&target_key, self.key_value(&key)).await?;
                Ok(Related::One(found))
            }
            RelationKind::ManyToMany(through) => {
                let key = match relation.key {
                    Some(key) => key,
                    None => self.local_pk_column()?,
                };
                let target_key = match relation.target_key {
                    Some(key) => key,
                    None => factory.single_pk_column()?,
                };
                let local_join = through.local_key.clone().unwrap_or_else(|| key.clone());
                let target_join = through
                    .target_key
                    .clone()
                    .unwrap_or_else(|| target_key.clone());

                let mut params = Params::new();
                params.insert(String::from(":value"), self.key_value(&key));
                let rows = self
                    .db
                    .command()
                    .select("t.*")
                    .from(&format!("{} t", factory.table()))
                    .left_join(
                        &format!("{} m", through.table),
                        Condition::raw(format!("m.{target_join} = t.{target_key}")),
                        Params::new(),
                    )
                    .where_clause(Condition::raw(format!("m.{local_join} = :value")), params)
                    .query_all()
                    .await?;
                Ok(Related::Many(factory.map_rows(rows)))
            }
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("table", &self.spec.table)
            .field("is_new", &self.is_new)
            .field("data", &self.data)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn through_descriptor_parsing() {
        assert_eq!(
            Through::parse("contact_tag").unwrap(),
            Through {
                table: String::from("contact_tag"),
                local_key: None,
                target_key: None,
            }
        );
        assert_eq!(
            Through::parse("contact_tag, contact_id, tag_id").unwrap(),
            Through {
                table: String::from("contact_tag"),
                local_key: Some(String::from("contact_id")),
                target_key: Some(String::from("tag_id")),
            }
        );
        assert!(matches!(
            Through::parse(""),
            Err(Error::InvalidThrough(_))
        ));
    }

    #[test]
    fn primary_key_columns() {
        assert_eq!(PrimaryKey::single("id").columns(), ["id"]);
        assert_eq!(PrimaryKey::single("id").single_column(), Some("id"));
        let composite = PrimaryKey::composite(["tenant", "id"]);
        assert_eq!(composite.columns(), ["tenant", "id"]);
        assert_eq!(composite.single_column(), None);
    }

    #[test]
    fn get_prefers_staged_changes() {
        let db = crate::db::Db::new("sqlite::memory:");
        let mut data = ValueMap::new();
        data.insert(String::from("name"), SqlValue::Text(String::from("old")));
        let mut model = Model::new(db, ModelSpec::table("contact"), data, false);
        assert!(!model.is_dirty());

        model.set("name", "new");
        assert_eq!(model.get("name"), Some(&SqlValue::Text(String::from("new"))));
        assert_eq!(
            model.persisted("name"),
            Some(&SqlValue::Text(String::from("old")))
        );
        model.unset("name");
        assert_eq!(model.get("name"), Some(&SqlValue::Text(String::from("old"))));
    }
}
