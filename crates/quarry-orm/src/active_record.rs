//! The ActiveRecord model trait.
//!
//! A model is a type that owns a [`Record`] and names its table. Everything
//! else (finders, persistence, optimistic locking, relations) is provided.
//!
//! ```no_run
//! use quarry_orm::{ActiveRecord, Connection, Record, RelationDef};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Customer(Record);
//!
//! #[derive(Debug, Clone, Default)]
//! struct Order(Record);
//!
//! impl ActiveRecord for Customer {
//!     fn table_name() -> &'static str { "customer" }
//!     fn from_record(record: Record) -> Self { Self(record) }
//!     fn record(&self) -> &Record { &self.0 }
//!     fn record_mut(&mut self) -> &mut Record { &mut self.0 }
//!
//!     fn relation(name: &str) -> Option<RelationDef> {
//!         match name {
//!             "orders" => Some(RelationDef::has_many::<Order>(&[("customer_id", "id")])),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! impl ActiveRecord for Order {
//!     fn table_name() -> &'static str { "order" }
//!     fn from_record(record: Record) -> Self { Self(record) }
//!     fn record(&self) -> &Record { &self.0 }
//!     fn record_mut(&mut self) -> &mut Record { &mut self.0 }
//! }
//!
//! # async fn demo(db: &Connection) -> quarry_orm::Result<()> {
//! let mut customer = Customer::default();
//! customer.record_mut().set_attribute("name", "user4");
//! customer.insert(db, true, None).await?;
//!
//! let with_orders = Customer::find().with("orders").all(db).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use quarry_core::{ColumnValue, Condition, Params, SqlValue, ToSqlValue};
use tracing::debug;

use crate::active_query::ActiveQuery;
use crate::connection::Connection;
use crate::error::{DbError, Result, ValidationError};
use crate::record::{Record, Related};
use crate::relation::{load_records, populate, relation_query, resolve, RelationDef, Via};

/// A table-backed model.
#[allow(async_fn_in_trait)]
pub trait ActiveRecord: Sized + Send + Sync + 'static {
    /// Table name; may use the `{{%name}}` prefix syntax.
    fn table_name() -> &'static str;

    /// Primary key columns. Empty means read them from the table schema.
    fn primary_key() -> &'static [&'static str] {
        &[]
    }

    /// Version column used for optimistic locking.
    fn optimistic_lock() -> Option<&'static str> {
        None
    }

    /// Relation declared under `name`.
    fn relation(_name: &str) -> Option<RelationDef> {
        None
    }

    /// Wraps a loaded record.
    fn from_record(record: Record) -> Self;

    /// The underlying record.
    fn record(&self) -> &Record;

    /// The underlying record, mutably.
    fn record_mut(&mut self) -> &mut Record;

    /// Validation errors of the current attributes.
    fn validate(&self) -> Vec<ValidationError> {
        Vec::new()
    }

    /// Runs before insert or update; `false` cancels the write.
    fn before_save(&mut self, _insert: bool) -> bool {
        true
    }

    /// Runs after a write with the previous values of changed attributes.
    fn after_save(&mut self, _insert: bool, _changed: &BTreeMap<String, SqlValue>) {}

    /// Runs before delete; `false` cancels it.
    fn before_delete(&mut self) -> bool {
        true
    }

    /// Runs after delete.
    fn after_delete(&mut self) {}

    /// Runs after the model is built from a fetched row.
    fn after_find(&mut self) {}

    /// Primary key columns, declared or from the schema.
    async fn primary_key_columns(conn: &Connection) -> Result<Vec<String>> {
        let declared = Self::primary_key();
        if !declared.is_empty() {
            return Ok(declared.iter().map(|k| (*k).to_string()).collect());
        }
        let schema = conn.require_table_schema(Self::table_name()).await?;
        if schema.primary_key.is_empty() {
            return Err(DbError::Configuration(format!(
                "The table {} does not have a primary key.",
                Self::table_name()
            )));
        }
        Ok(schema.primary_key.clone())
    }

    /// A query over this model's table.
    fn find() -> ActiveQuery<Self> {
        ActiveQuery::new()
    }

    /// The row with the given single-column key.
    async fn find_by_pk(conn: &Connection, key: impl ToSqlValue) -> Result<Option<Self>> {
        let key = key.to_sql_value();
        let keys = Self::primary_key_columns(conn).await?;
        let [column] = keys.as_slice() else {
            return Err(DbError::InvalidCall(format!(
                "{} has a composite primary key; use find_one with a condition.",
                Self::table_name()
            )));
        };
        Self::find().where_clause(Condition::eq(column.as_str(), key)).one(conn).await
    }

    /// The first row matching `condition`.
    async fn find_one(conn: &Connection, condition: impl Into<Condition>) -> Result<Option<Self>> {
        Self::find().where_clause(condition).one(conn).await
    }

    /// All rows matching `condition`.
    async fn find_all(conn: &Connection, condition: impl Into<Condition>) -> Result<Vec<Self>> {
        Self::find().where_clause(condition).all(conn).await
    }

    /// Models built from a raw statement.
    async fn find_by_sql(conn: &Connection, sql: &str, params: Params) -> Result<Vec<Self>> {
        let rows = conn.create_command(sql, params).query_all().await?;
        let schema = conn.table_schema(Self::table_name(), false).await?;
        Ok(rows
            .into_iter()
            .map(|row| found(Record::from_row(row, schema.as_deref())))
            .collect())
    }

    /// `UPDATE` over the table without loading models.
    async fn update_all(
        conn: &Connection,
        columns: &[(String, ColumnValue)],
        condition: Option<&Condition>,
    ) -> Result<u64> {
        conn.command("")
            .update(Self::table_name(), columns, condition)?
            .execute()
            .await
    }

    /// Adds to counter columns without loading models.
    async fn update_all_counters(
        conn: &Connection,
        counters: &[(String, i64)],
        condition: Option<&Condition>,
    ) -> Result<u64> {
        conn.command("")
            .update_counters(Self::table_name(), counters, condition)?
            .execute()
            .await
    }

    /// `DELETE` over the table without loading models.
    async fn delete_all(conn: &Connection, condition: Option<&Condition>) -> Result<u64> {
        conn.command("")
            .delete(Self::table_name(), condition)?
            .execute()
            .await
    }

    /// True until inserted or loaded.
    fn is_new_record(&self) -> bool {
        self.record().is_new_record()
    }

    /// Current primary key values.
    async fn primary_key_value(&self, conn: &Connection) -> Result<Vec<SqlValue>> {
        let keys = Self::primary_key_columns(conn).await?;
        Ok(self.record().primary_key_value(&keys))
    }

    /// Persisted primary key values.
    async fn old_primary_key_value(&self, conn: &Connection) -> Result<Vec<SqlValue>> {
        let keys = Self::primary_key_columns(conn).await?;
        Ok(self.record().old_primary_key_value(&keys))
    }

    /// Whether both models are the same persisted row.
    async fn equals(&self, conn: &Connection, other: &Self) -> Result<bool> {
        let keys = Self::primary_key_columns(conn).await?;
        Ok(self.record().equals(other.record(), &keys))
    }

    /// Inserts the dirty attributes, restricted to `names` when given.
    ///
    /// Returns `Ok(false)` when [`before_save`](Self::before_save) cancels
    /// the write and [`DbError::Validation`] when validation fails. An
    /// auto-increment key left unset is read back after the insert.
    async fn insert(&mut self, conn: &Connection, validate: bool, names: Option<&[&str]>) -> Result<bool> {
        if validate {
            let errors = self.validate();
            if !errors.is_empty() {
                return Err(DbError::Validation(errors));
            }
        }
        if !self.before_save(true) {
            return Ok(false);
        }
        let schema = conn.table_schema(Self::table_name(), false).await?;
        let mut values = self.record().dirty_attributes(names);
        let columns: Vec<(String, ColumnValue)> = values
            .iter()
            .map(|(name, value)| (name.clone(), ColumnValue::Value(value.clone())))
            .collect();
        conn.command("")
            .insert(Self::table_name(), &columns)?
            .execute()
            .await?;

        if let Some(schema) = schema {
            for key in &schema.primary_key {
                let unset = self.record().get_attribute(key).is_none_or(SqlValue::is_null);
                let auto = schema.column(key).is_some_and(|c| c.auto_increment);
                if unset && auto {
                    let id = conn.last_insert_id(schema.sequence_name.as_deref()).await?;
                    let id = schema.typecast(key, id);
                    self.record_mut().set_attribute(key.as_str(), id.clone());
                    values.insert(key.clone(), id);
                    break;
                }
            }
        }

        let changed: BTreeMap<String, SqlValue> = values.keys().map(|name| (name.clone(), SqlValue::Null)).collect();
        self.record_mut().set_old_attributes(Some(values));
        debug!(table = Self::table_name(), "record inserted");
        self.after_save(true, &changed);
        Ok(true)
    }

    /// Writes the dirty attributes, restricted to `names` when given.
    ///
    /// Returns `Ok(None)` when [`before_save`](Self::before_save) cancels
    /// the write, otherwise the number of affected rows. With an optimistic
    /// lock the version must still match and is bumped by one; a mismatch is
    /// [`DbError::StaleObject`].
    async fn update(&mut self, conn: &Connection, validate: bool, names: Option<&[&str]>) -> Result<Option<u64>> {
        if self.is_new_record() {
            return Err(DbError::InvalidCall("Unable to update a new record.".into()));
        }
        if validate {
            let errors = self.validate();
            if !errors.is_empty() {
                return Err(DbError::Validation(errors));
            }
        }
        if !self.before_save(false) {
            return Ok(None);
        }
        let mut values = self.record().dirty_attributes(names);
        if values.is_empty() {
            self.after_save(false, &BTreeMap::new());
            return Ok(Some(0));
        }
        let keys = Self::primary_key_columns(conn).await?;
        let mut condition: Vec<(String, SqlValue)> = keys
            .iter()
            .cloned()
            .zip(self.record().old_primary_key_value(&keys))
            .collect();
        let lock = Self::optimistic_lock();
        if let Some(lock) = lock {
            let version = lock_version(self.record(), lock);
            values.insert(lock.to_string(), SqlValue::Int(version + 1));
            condition.push((lock.to_string(), SqlValue::Int(version)));
        }
        let columns: Vec<(String, ColumnValue)> = values
            .iter()
            .map(|(name, value)| (name.clone(), ColumnValue::Value(value.clone())))
            .collect();
        let rows = conn
            .command("")
            .update(Self::table_name(), &columns, Some(&Condition::hash(condition)))?
            .execute()
            .await?;
        if lock.is_some() && rows == 0 {
            return Err(DbError::StaleObject("The object being updated is outdated.".into()));
        }

        let mut changed = BTreeMap::new();
        let record = self.record_mut();
        for (name, value) in values {
            changed.insert(name.clone(), record.old_attribute(&name).cloned().unwrap_or(SqlValue::Null));
            record.set_attribute(name.as_str(), value.clone());
            record.set_old_attribute(name, value);
        }
        self.after_save(false, &changed);
        Ok(Some(rows))
    }

    /// Inserts a new model or updates a persisted one.
    async fn save(&mut self, conn: &Connection, validate: bool) -> Result<bool> {
        if self.is_new_record() {
            self.insert(conn, validate, None).await
        } else {
            Ok(self.update(conn, validate, None).await?.is_some())
        }
    }

    /// Deletes the row. Returns `Ok(None)` when
    /// [`before_delete`](Self::before_delete) cancels it.
    async fn delete(&mut self, conn: &Connection) -> Result<Option<u64>> {
        if self.is_new_record() {
            return Err(DbError::InvalidCall("Unable to delete a new record.".into()));
        }
        if !self.before_delete() {
            return Ok(None);
        }
        let keys = Self::primary_key_columns(conn).await?;
        let mut condition: Vec<(String, SqlValue)> = keys
            .iter()
            .cloned()
            .zip(self.record().old_primary_key_value(&keys))
            .collect();
        let lock = Self::optimistic_lock();
        if let Some(lock) = lock {
            condition.push((lock.to_string(), SqlValue::Int(lock_version(self.record(), lock))));
        }
        let rows = Self::delete_all(conn, Some(&Condition::hash(condition))).await?;
        if lock.is_some() && rows == 0 {
            return Err(DbError::StaleObject("The object being deleted is outdated.".into()));
        }
        self.record_mut().mark_deleted();
        self.after_delete();
        Ok(Some(rows))
    }

    /// Reloads the attributes from the database and drops loaded relations.
    /// Returns `false` when the row no longer exists.
    async fn refresh(&mut self, conn: &Connection) -> Result<bool> {
        let keys = Self::primary_key_columns(conn).await?;
        let condition = Condition::hash(keys.iter().cloned().zip(self.record().old_primary_key_value(&keys)));
        let Some(fresh) = Self::find().where_clause(condition).one(conn).await? else {
            return Ok(false);
        };
        *self.record_mut() = fresh.record().clone();
        self.record_mut().clear_relations();
        Ok(true)
    }

    /// Sets and writes the given attributes, skipping validation, hooks and
    /// the optimistic lock.
    async fn update_attributes(&mut self, conn: &Connection, values: &[(&str, SqlValue)]) -> Result<u64> {
        if self.is_new_record() {
            return Err(DbError::InvalidCall("Unable to update attributes of a new record.".into()));
        }
        let names: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        for (name, value) in values {
            self.record_mut().set_attribute(*name, value.clone());
        }
        let dirty = self.record().dirty_attributes(Some(&names));
        if dirty.is_empty() {
            return Ok(0);
        }
        let keys = Self::primary_key_columns(conn).await?;
        let condition = Condition::hash(keys.iter().cloned().zip(self.record().old_primary_key_value(&keys)));
        let columns: Vec<(String, ColumnValue)> = dirty
            .iter()
            .map(|(name, value)| (name.clone(), ColumnValue::Value(value.clone())))
            .collect();
        let rows = Self::update_all(conn, &columns, Some(&condition)).await?;
        for (name, value) in dirty {
            self.record_mut().set_old_attribute(name, value);
        }
        Ok(rows)
    }

    /// Adds to counter columns of this row and mirrors the change in the
    /// attributes. The snapshot takes the new attribute value, so pending
    /// edits to a counter column count as saved. Returns `false` when no
    /// row was updated.
    async fn update_counters(&mut self, conn: &Connection, counters: &[(&str, i64)]) -> Result<bool> {
        let keys = Self::primary_key_columns(conn).await?;
        let condition = Condition::hash(keys.iter().cloned().zip(self.record().old_primary_key_value(&keys)));
        let owned: Vec<(String, i64)> = counters.iter().map(|(name, by)| ((*name).to_string(), *by)).collect();
        let rows = Self::update_all_counters(conn, &owned, Some(&condition)).await?;
        if rows == 0 {
            return Ok(false);
        }
        let record = self.record_mut();
        for (name, by) in counters {
            let value = record.get_attribute(name).and_then(SqlValue::as_i64).unwrap_or(0) + by;
            record.set_attribute(*name, value);
            record.set_old_attribute(*name, value);
        }
        Ok(true)
    }

    /// The query a relation runs for this model.
    fn relation_query(&self, name: &str) -> Result<quarry_core::Query> {
        let def = resolve(Self::relation, name)?;
        relation_query(&def, Self::relation, self.record())
    }

    /// Loads a single-valued relation, once; later calls use the cache.
    async fn related_one<T: ActiveRecord>(&mut self, conn: &Connection, name: &str) -> Result<Option<T>> {
        if !self.record().is_relation_populated(name) {
            load_relation(self, conn, name).await?;
        }
        Ok(self
            .record()
            .related(name)
            .and_then(|related| related.records().first())
            .map(|record| found(record.clone())))
    }

    /// Loads a multi-valued relation, once; later calls use the cache.
    async fn related_many<T: ActiveRecord>(&mut self, conn: &Connection, name: &str) -> Result<Vec<T>> {
        if !self.record().is_relation_populated(name) {
            load_relation(self, conn, name).await?;
        }
        Ok(self
            .record()
            .related(name)
            .map(|related| related.records().iter().map(|r| found(r.clone())).collect())
            .unwrap_or_default())
    }

    /// Eager-loads relations into this model, as [`ActiveQuery::with`] does.
    async fn populate_relations(&mut self, conn: &Connection, paths: &[&str]) -> Result<()> {
        for path in paths {
            let mut owners = [self.record_mut()];
            populate(conn, Self::relation, &mut owners, path).await?;
        }
        Ok(())
    }

    /// Connects `target` to this model through relation `name`.
    ///
    /// Pivot relations insert a pivot row, with `extra` as additional
    /// columns. Direct relations copy the key into whichever side holds the
    /// foreign key and save that side. The loaded relation is updated.
    async fn link<T: ActiveRecord>(
        &mut self,
        conn: &Connection,
        name: &str,
        target: &mut T,
        extra: &[(&str, SqlValue)],
    ) -> Result<()> {
        let def = resolve(Self::relation, name)?;
        match def.via_hop() {
            Some(via) => {
                if self.is_new_record() || target.is_new_record() {
                    return Err(DbError::InvalidCall(
                        "Unable to link models: both models must NOT be newly created.".into(),
                    ));
                }
                let (table, via_link) = match via {
                    Via::Table { table, link } => (table.clone(), link.clone()),
                    Via::Relation(via_name) => {
                        let via_def = resolve(Self::relation, via_name)?;
                        (via_def.table().to_string(), via_def.link().to_vec())
                    }
                };
                let mut columns: Vec<(String, ColumnValue)> = Vec::new();
                for (pivot, owner) in &via_link {
                    columns.push((pivot.clone(), key_value(self.record(), owner, "link")?.into()));
                }
                for (target_column, pivot) in def.link() {
                    columns.push((pivot.clone(), key_value(target.record(), target_column, "link")?.into()));
                }
                for (column, value) in extra {
                    columns.push(((*column).to_string(), value.clone().into()));
                }
                conn.command("").insert(&table, &columns)?.execute().await?;
            }
            None => {
                let target_is_pk = is_primary_key(&def.target_columns(), &T::primary_key_columns(conn).await?);
                let owner_is_pk = is_primary_key(&def.owner_columns(), &Self::primary_key_columns(conn).await?);
                let into_self = match (target_is_pk, owner_is_pk) {
                    (true, true) => {
                        if self.is_new_record() && target.is_new_record() {
                            return Err(DbError::InvalidCall(
                                "Unable to link models: at most one model can be newly created.".into(),
                            ));
                        }
                        self.is_new_record()
                    }
                    (true, false) => true,
                    (false, true) => false,
                    (false, false) => {
                        return Err(DbError::InvalidCall(
                            "Unable to link models: the link defining the relation does not involve any primary key."
                                .into(),
                        ))
                    }
                };
                if into_self {
                    let values = def
                        .link()
                        .iter()
                        .map(|(t, o)| Ok((o.clone(), key_value(target.record(), t, "link")?)))
                        .collect::<Result<Vec<_>>>()?;
                    self.record_mut().set_attributes(values);
                    self.save(conn, false).await?;
                } else {
                    let values = def
                        .link()
                        .iter()
                        .map(|(t, o)| Ok((t.clone(), key_value(self.record(), o, "link")?)))
                        .collect::<Result<Vec<_>>>()?;
                    target.record_mut().set_attributes(values);
                    target.save(conn, false).await?;
                }
            }
        }

        let linked = target.record().clone();
        if !def.is_multiple() {
            self.record_mut().populate_relation(name, Related::One(Some(linked)));
        } else if let Some(Related::Many(records)) = self.record_mut().related_mut(name) {
            records.push(linked);
        }
        Ok(())
    }

    /// Disconnects `target` from this model through relation `name`.
    ///
    /// Pivot rows are deleted when `delete` is set, otherwise their key
    /// columns are nulled. For direct relations the side holding the
    /// foreign key is deleted or has the key nulled and is saved.
    async fn unlink<T: ActiveRecord>(&mut self, conn: &Connection, name: &str, target: &mut T, delete: bool) -> Result<()> {
        let def = resolve(Self::relation, name)?;
        match def.via_hop() {
            Some(via) => {
                let (table, via_link) = match via {
                    Via::Table { table, link } => (table.clone(), link.clone()),
                    Via::Relation(via_name) => {
                        let via_def = resolve(Self::relation, via_name)?;
                        (via_def.table().to_string(), via_def.link().to_vec())
                    }
                };
                let mut pairs: Vec<(String, SqlValue)> = Vec::new();
                for (pivot, owner) in &via_link {
                    pairs.push((pivot.clone(), key_value(self.record(), owner, "unlink")?));
                }
                for (target_column, pivot) in def.link() {
                    pairs.push((pivot.clone(), key_value(target.record(), target_column, "unlink")?));
                }
                let condition = Condition::hash(pairs.clone());
                let command = if delete {
                    conn.command("").delete(&table, Some(&condition))?
                } else {
                    let nulls: Vec<(String, ColumnValue)> = pairs
                        .into_iter()
                        .map(|(column, _)| (column, ColumnValue::Value(SqlValue::Null)))
                        .collect();
                    conn.command("").update(&table, &nulls, Some(&condition))?
                };
                command.execute().await?;
            }
            None => {
                let target_is_pk = is_primary_key(&def.target_columns(), &T::primary_key_columns(conn).await?);
                let owner_is_pk = is_primary_key(&def.owner_columns(), &Self::primary_key_columns(conn).await?);
                if owner_is_pk {
                    if delete {
                        target.delete(conn).await?;
                    } else {
                        for column in def.target_columns() {
                            target.record_mut().set_attribute(column, SqlValue::Null);
                        }
                        target.save(conn, false).await?;
                    }
                } else if target_is_pk {
                    for column in def.owner_columns() {
                        self.record_mut().set_attribute(column, SqlValue::Null);
                    }
                    if delete {
                        self.delete(conn).await?;
                    } else {
                        self.save(conn, false).await?;
                    }
                } else {
                    return Err(DbError::InvalidCall(
                        "Unable to unlink models: the link does not involve any primary key.".into(),
                    ));
                }
            }
        }

        if !def.is_multiple() {
            self.record_mut().clear_relation(name);
        } else {
            let keys = T::primary_key_columns(conn).await?;
            let unlinked = target.record().old_primary_key_value(&keys);
            if let Some(Related::Many(records)) = self.record_mut().related_mut(name) {
                records.retain(|r| r.old_primary_key_value(&keys) != unlinked);
            }
        }
        Ok(())
    }
}

/// Builds a model from a fetched record and runs its find hook.
pub(crate) fn found<M: ActiveRecord>(record: Record) -> M {
    let mut model = M::from_record(record);
    model.after_find();
    model
}

fn lock_version(record: &Record, lock: &str) -> i64 {
    record.get_attribute(lock).and_then(SqlValue::as_i64).unwrap_or(0)
}

fn is_primary_key(columns: &[&str], keys: &[String]) -> bool {
    columns.len() == keys.len() && columns.iter().all(|c| keys.iter().any(|k| k == c))
}

fn key_value(record: &Record, column: &str, action: &str) -> Result<SqlValue> {
    match record.get_attribute(column) {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(DbError::InvalidCall(format!(
            "Unable to {action} models: the key column {column} is null."
        ))),
    }
}

async fn load_relation<M: ActiveRecord>(model: &mut M, conn: &Connection, name: &str) -> Result<()> {
    let def = resolve(M::relation, name)?;
    let query = relation_query(&def, M::relation, model.record())?;
    let query = if def.is_multiple() { query } else { query.limit(1) };
    let records = load_records(conn, def.table(), &query).await?;
    let related = if def.is_multiple() {
        Related::Many(records)
    } else {
        Related::One(records.into_iter().next())
    };
    model.record_mut().populate_relation(name, related);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_primary_key_ignores_order() {
        let keys = vec!["order_id".to_string(), "item_id".to_string()];
        assert!(is_primary_key(&["item_id", "order_id"], &keys));
        assert!(!is_primary_key(&["item_id"], &keys));
        assert!(!is_primary_key(&["customer_id"], &["id".to_string()]));
    }

    #[test]
    fn test_key_value_rejects_null() {
        let mut record = Record::new();
        record.set_attribute("id", SqlValue::Null);
        let err = key_value(&record, "id", "link").unwrap_err();
        assert!(matches!(err, DbError::InvalidCall(m) if m.contains("key column id is null")));
        record.set_attribute("id", 3);
        assert_eq!(key_value(&record, "id", "link").unwrap(), SqlValue::Int(3));
    }

    #[test]
    fn test_lock_version_defaults_to_zero() {
        let mut record = Record::new();
        assert_eq!(lock_version(&record, "version"), 0);
        record.set_attribute("version", 4);
        assert_eq!(lock_version(&record, "version"), 4);
    }
}
