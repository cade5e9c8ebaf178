//! Attribute storage with dirty tracking.
//!
//! A [`Record`] holds the current attribute values, the snapshot of values
//! last read from or written to the database, and the cache of loaded
//! relations. Models wrap one and expose it through
//! [`ActiveRecord::record`](crate::ActiveRecord::record).

use std::collections::{BTreeMap, HashMap};

use quarry_core::{SqlValue, ToSqlValue};

use crate::row::DataRow;
use crate::schema::TableSchema;

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Not yet inserted.
    New,
    /// Persisted and unchanged.
    Clean,
    /// Persisted with pending changes.
    Dirty,
    /// Deleted from the database. Saving inserts the row again.
    Deleted,
}

/// A loaded relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Single-valued relation; `None` when nothing matched.
    One(Option<Record>),
    /// Multi-valued relation.
    Many(Vec<Record>),
}

impl Related {
    /// Records of the relation as a slice.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        match self {
            Self::One(record) => record.as_slice(),
            Self::Many(records) => records,
        }
    }

    fn records_mut(&mut self) -> &mut [Record] {
        match self {
            Self::One(record) => record.as_mut_slice(),
            Self::Many(records) => records,
        }
    }
}

/// Attributes of one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    attributes: BTreeMap<String, SqlValue>,
    old_attributes: Option<BTreeMap<String, SqlValue>>,
    related: HashMap<String, Related>,
    deleted: bool,
}

impl Record {
    /// A new record with no attributes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A persisted record built from a fetched row. Values are typecast
    /// through `schema` when one is given.
    #[must_use]
    pub fn from_row(row: DataRow, schema: Option<&TableSchema>) -> Self {
        let attributes: BTreeMap<String, SqlValue> = row
            .into_iter()
            .map(|(name, value)| {
                let value = match schema {
                    Some(schema) => schema.typecast(&name, value),
                    None => value,
                };
                (name, value)
            })
            .collect();
        Self {
            old_attributes: Some(attributes.clone()),
            attributes,
            related: HashMap::new(),
            deleted: false,
        }
    }

    /// Value of an attribute.
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<&SqlValue> {
        self.attributes.get(name)
    }

    /// Sets an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl ToSqlValue) {
        self.attributes.insert(name.into(), value.to_sql_value());
    }

    /// Sets several attributes.
    pub fn set_attributes<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: ToSqlValue,
    {
        for (name, value) in values {
            self.set_attribute(name, value);
        }
    }

    /// All attributes.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, SqlValue> {
        &self.attributes
    }

    /// The persisted snapshot; `None` for new records.
    #[must_use]
    pub const fn old_attributes(&self) -> Option<&BTreeMap<String, SqlValue>> {
        self.old_attributes.as_ref()
    }

    /// Persisted value of an attribute.
    #[must_use]
    pub fn old_attribute(&self, name: &str) -> Option<&SqlValue> {
        self.old_attributes.as_ref().and_then(|old| old.get(name))
    }

    /// Overwrites the persisted value of an attribute. On a new record this
    /// starts the snapshot, making the record persisted.
    pub fn set_old_attribute(&mut self, name: impl Into<String>, value: impl ToSqlValue) {
        self.old_attributes
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.to_sql_value());
    }

    /// Replaces the whole snapshot. `None` turns the record into a new one.
    pub fn set_old_attributes(&mut self, old: Option<BTreeMap<String, SqlValue>>) {
        if old.is_some() {
            self.deleted = false;
        }
        self.old_attributes = old;
    }

    /// Whether the attribute has a value.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Whether the attribute differs from its persisted value.
    #[must_use]
    pub fn is_attribute_changed(&self, name: &str) -> bool {
        match (self.attributes.get(name), self.old_attribute(name)) {
            (Some(current), Some(old)) => current != old,
            (None, None) => false,
            _ => true,
        }
    }

    /// Attributes that differ from the snapshot, restricted to `names` when
    /// given. Every attribute of a new record is dirty.
    #[must_use]
    pub fn dirty_attributes(&self, names: Option<&[&str]>) -> BTreeMap<String, SqlValue> {
        self.attributes
            .iter()
            .filter(|(name, _)| names.is_none_or(|names| names.contains(&name.as_str())))
            .filter(|(name, value)| match &self.old_attributes {
                None => true,
                Some(old) => old.get(*name) != Some(*value),
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Forces the attribute to be written on the next save.
    pub fn mark_attribute_dirty(&mut self, name: &str) {
        if let Some(old) = &mut self.old_attributes {
            old.remove(name);
        }
    }

    /// Current values of `keys`, `Null` for missing ones.
    #[must_use]
    pub fn values_of<S: AsRef<str>>(&self, keys: &[S]) -> Vec<SqlValue> {
        keys.iter()
            .map(|key| self.attributes.get(key.as_ref()).cloned().unwrap_or(SqlValue::Null))
            .collect()
    }

    /// Current primary key values.
    #[must_use]
    pub fn primary_key_value<S: AsRef<str>>(&self, keys: &[S]) -> Vec<SqlValue> {
        self.values_of(keys)
    }

    /// Persisted primary key values, falling back to the current ones for
    /// attributes missing from the snapshot.
    #[must_use]
    pub fn old_primary_key_value<S: AsRef<str>>(&self, keys: &[S]) -> Vec<SqlValue> {
        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                self.old_attribute(key)
                    .or_else(|| self.attributes.get(key))
                    .cloned()
                    .unwrap_or(SqlValue::Null)
            })
            .collect()
    }

    /// True while there is no persisted snapshot: before insert or load,
    /// and again after delete.
    #[must_use]
    pub const fn is_new_record(&self) -> bool {
        self.old_attributes.is_none()
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> RecordState {
        if self.old_attributes.is_none() {
            if self.deleted {
                RecordState::Deleted
            } else {
                RecordState::New
            }
        } else if self.dirty_attributes(None).is_empty() {
            RecordState::Clean
        } else {
            RecordState::Dirty
        }
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.old_attributes = None;
        self.deleted = true;
    }

    /// Whether both records are persisted rows with the same key.
    #[must_use]
    pub fn equals<S: AsRef<str>>(&self, other: &Self, keys: &[S]) -> bool {
        if self.is_new_record() || other.is_new_record() || keys.is_empty() {
            return false;
        }
        let mine = self.primary_key_value(keys);
        !mine.iter().any(SqlValue::is_null) && mine == other.primary_key_value(keys)
    }

    /// Stores a loaded relation.
    pub fn populate_relation(&mut self, name: impl Into<String>, related: Related) {
        self.related.insert(name.into(), related);
    }

    /// Whether the relation is loaded.
    #[must_use]
    pub fn is_relation_populated(&self, name: &str) -> bool {
        self.related.contains_key(name)
    }

    /// A loaded relation.
    #[must_use]
    pub fn related(&self, name: &str) -> Option<&Related> {
        self.related.get(name)
    }

    pub(crate) fn related_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.related.get_mut(name)
    }

    /// Drops a loaded relation.
    pub fn clear_relation(&mut self, name: &str) -> Option<Related> {
        self.related.remove(name)
    }

    pub(crate) fn clear_relations(&mut self) {
        self.related.clear();
    }

    pub(crate) fn related_records_mut(&mut self, name: &str) -> &mut [Record] {
        match self.related.get_mut(name) {
            Some(related) => related.records_mut(),
            None => &mut [],
        }
    }
}
