//! Relation declarations and their loading.
//!
//! A relation links columns of a target table to columns of the owning
//! record, optionally through a pivot table or another relation:
//!
//! ```
//! # use quarry_orm::{ActiveRecord, Record, RelationDef};
//! # #[derive(Debug, Clone, Default)] struct Item(Record);
//! # impl ActiveRecord for Item {
//! #     fn table_name() -> &'static str { "item" }
//! #     fn from_record(r: Record) -> Self { Self(r) }
//! #     fn record(&self) -> &Record { &self.0 }
//! #     fn record_mut(&mut self) -> &mut Record { &mut self.0 }
//! # }
//! // order.id = order_item.order_id, item.id = order_item.item_id
//! let items = RelationDef::has_many::<Item>(&[("id", "item_id")])
//!     .via_table("order_item", &[("order_id", "id")]);
//! assert_eq!(items.table(), "item");
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use quarry_core::{Condition, InValues, Query, SqlValue};
use tracing::debug;

use crate::active_record::ActiveRecord;
use crate::connection::Connection;
use crate::error::{DbError, Result};
use crate::query_ext::QueryExt;
use crate::record::{Record, Related};

/// Looks up a relation by name on some model.
pub type RelationResolver = fn(&str) -> Option<RelationDef>;

/// Intermediate hop of a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Via {
    /// A pivot table; `link` pairs pivot columns with owner columns.
    Table {
        /// Pivot table name.
        table: String,
        /// `(pivot column, owner column)` pairs.
        link: Vec<(String, String)>,
    },
    /// Another relation of the owner, whose records feed this one.
    Relation(String),
}

/// Declaration of a relation.
#[derive(Debug, Clone)]
pub struct RelationDef {
    table: String,
    link: Vec<(String, String)>,
    multiple: bool,
    via: Option<Via>,
    condition: Option<Condition>,
    order_by: Option<String>,
    target_relations: RelationResolver,
}

fn no_relations(_: &str) -> Option<RelationDef> {
    None
}

fn owned_link(link: &[(&str, &str)]) -> Vec<(String, String)> {
    link.iter()
        .map(|(target, owner)| ((*target).to_string(), (*owner).to_string()))
        .collect()
}

impl RelationDef {
    /// Single-valued relation; `link` pairs target columns with owner
    /// columns.
    #[must_use]
    pub fn has_one<T: ActiveRecord>(link: &[(&str, &str)]) -> Self {
        Self::to_model::<T>(link, false)
    }

    /// Multi-valued relation; `link` pairs target columns with owner
    /// columns.
    #[must_use]
    pub fn has_many<T: ActiveRecord>(link: &[(&str, &str)]) -> Self {
        Self::to_model::<T>(link, true)
    }

    fn to_model<T: ActiveRecord>(link: &[(&str, &str)], multiple: bool) -> Self {
        Self {
            table: T::table_name().to_string(),
            link: owned_link(link),
            multiple,
            via: None,
            condition: None,
            order_by: None,
            target_relations: T::relation,
        }
    }

    /// Relation to a bare table with no model behind it.
    #[must_use]
    pub fn to_table(table: impl Into<String>, link: &[(&str, &str)], multiple: bool) -> Self {
        Self {
            table: table.into(),
            link: owned_link(link),
            multiple,
            via: None,
            condition: None,
            order_by: None,
            target_relations: no_relations,
        }
    }

    /// Goes through a pivot table. `link` pairs pivot columns with owner
    /// columns; the relation's own link then pairs target columns with pivot
    /// columns.
    #[must_use]
    pub fn via_table(mut self, table: impl Into<String>, link: &[(&str, &str)]) -> Self {
        self.via = Some(Via::Table {
            table: table.into(),
            link: owned_link(link),
        });
        self
    }

    /// Goes through another relation of the owner. The relation's link then
    /// pairs target columns with columns of the intermediate records.
    #[must_use]
    pub fn via(mut self, relation: impl Into<String>) -> Self {
        self.via = Some(Via::Relation(relation.into()));
        self
    }

    /// Extra condition on target rows.
    #[must_use]
    pub fn and_where(mut self, condition: impl Into<Condition>) -> Self {
        let condition = condition.into();
        self.condition = Some(match self.condition.take() {
            Some(current) => Condition::and([current, condition]),
            None => condition,
        });
        self
    }

    /// Ordering of target rows.
    #[must_use]
    pub fn order_by(mut self, spec: impl Into<String>) -> Self {
        self.order_by = Some(spec.into());
        self
    }

    /// Target table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// `(target column, owner column)` pairs.
    #[must_use]
    pub fn link(&self) -> &[(String, String)] {
        &self.link
    }

    /// Whether the relation yields many records.
    #[must_use]
    pub const fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// The intermediate hop, if any.
    #[must_use]
    pub const fn via_hop(&self) -> Option<&Via> {
        self.via.as_ref()
    }

    pub(crate) fn target_columns(&self) -> Vec<&str> {
        self.link.iter().map(|(target, _)| target.as_str()).collect()
    }

    pub(crate) fn owner_columns(&self) -> Vec<&str> {
        self.link.iter().map(|(_, owner)| owner.as_str()).collect()
    }

    fn base_query(&self) -> Query {
        let mut query = Query::new().from([self.table.as_str()]);
        if let Some(condition) = &self.condition {
            query = query.where_clause(condition.clone());
        }
        if let Some(order_by) = &self.order_by {
            query = query.order_by(order_by);
        }
        query
    }

    fn pivot(table: &str, link: &[(String, String)]) -> Self {
        Self {
            table: table.to_string(),
            link: link.to_vec(),
            multiple: true,
            via: None,
            condition: None,
            order_by: None,
            target_relations: no_relations,
        }
    }
}

pub(crate) fn resolve(resolver: RelationResolver, name: &str) -> Result<RelationDef> {
    resolver(name).ok_or_else(|| DbError::InvalidCall(format!("Unknown relation: {name}")))
}

/// `columns IN (query)` for one or more columns.
fn in_query(columns: &[&str], query: Query) -> Condition {
    match columns {
        [column] => Condition::in_query(*column, query),
        _ => Condition::In {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            values: InValues::Query(Box::new(query)),
            negate: false,
        },
    }
}

/// `columns IN values` for distinct, fully non-null keys.
fn in_keys(columns: &[&str], keys: Vec<Vec<SqlValue>>) -> Condition {
    match columns {
        [column] => Condition::in_list(*column, keys.into_iter().flatten()),
        _ => Condition::in_tuples(columns.iter().copied(), keys),
    }
}

/// Condition matching a single owner, or `0=1` when any key is null.
fn match_owner(columns: &[&str], values: Vec<SqlValue>) -> Condition {
    if values.iter().any(SqlValue::is_null) {
        return Condition::raw("0=1");
    }
    Condition::hash(columns.iter().map(|c| (*c).to_string()).zip(values))
}

/// The query yielding the related rows of one owner.
pub(crate) fn relation_query(def: &RelationDef, resolver: RelationResolver, owner: &Record) -> Result<Query> {
    let target_columns = def.target_columns();
    let condition = match &def.via {
        None => match_owner(&target_columns, owner.values_of(&def.owner_columns())),
        Some(Via::Table { table, link }) => {
            let pivot_owner: Vec<&str> = link.iter().map(|(pivot, _)| pivot.as_str()).collect();
            let owner_columns: Vec<&str> = link.iter().map(|(_, owner)| owner.as_str()).collect();
            let sub = Query::new()
                .select(def.owner_columns())
                .from([table.as_str()])
                .where_clause(match_owner(&pivot_owner, owner.values_of(&owner_columns)));
            in_query(&target_columns, sub)
        }
        Some(Via::Relation(name)) => {
            let via = resolve(resolver, name)?;
            let sub = relation_query(&via, resolver, owner)?.select(def.owner_columns());
            in_query(&target_columns, sub.clear_order_by())
        }
    };
    Ok(def.base_query().and_where(condition))
}

fn key_of(values: &[SqlValue]) -> Option<String> {
    if values.iter().any(SqlValue::is_null) {
        return None;
    }
    Some(
        values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\u{1f}"),
    )
}

/// Distinct non-null keys of `columns` across `records`, in first-seen order.
fn distinct_keys<'r>(records: impl IntoIterator<Item = &'r Record>, columns: &[&str]) -> Vec<Vec<SqlValue>> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .map(|record| record.values_of(columns))
        .filter(|values| key_of(values).is_some_and(|key| seen.insert(key)))
        .collect()
}

pub(crate) async fn load_records(conn: &Connection, table: &str, query: &Query) -> Result<Vec<Record>> {
    let rows = query.all(conn).await?;
    let schema = conn.table_schema(table, false).await?;
    Ok(rows
        .into_iter()
        .map(|row| Record::from_row(row, schema.as_deref()))
        .collect())
}

type RelatedFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Vec<Record>>>> + 'a>>;

/// Loads the related records of every owner with one query per hop.
/// The result is parallel to `owners`.
pub(crate) fn fetch_related<'a>(
    conn: &'a Connection,
    def: &'a RelationDef,
    resolver: RelationResolver,
    owners: &'a [&'a Record],
) -> RelatedFuture<'a> {
    Box::pin(async move {
        let target_columns = def.target_columns();
        let owner_columns = def.owner_columns();

        // Records whose `owner_columns` feed the target lookup, per owner.
        let intermediates: Option<Vec<Vec<Record>>> = match &def.via {
            None => None,
            Some(Via::Table { table, link }) => {
                let pivot = RelationDef::pivot(table, link);
                Some(fetch_related(conn, &pivot, resolver, owners).await?)
            }
            Some(Via::Relation(name)) => {
                let via = resolve(resolver, name)?;
                Some(fetch_related(conn, &via, resolver, owners).await?)
            }
        };

        let keys = match &intermediates {
            None => distinct_keys(owners.iter().copied(), &owner_columns),
            Some(per_owner) => distinct_keys(per_owner.iter().flatten(), &owner_columns),
        };
        if keys.is_empty() {
            return Ok(vec![Vec::new(); owners.len()]);
        }
        debug!(table = %def.table, keys = keys.len(), "eager loading relation");
        let query = def.base_query().and_where(in_keys(&target_columns, keys));
        let targets = load_records(conn, &def.table, &query).await?;

        let result = match intermediates {
            None => {
                let mut buckets: HashMap<String, Vec<Record>> = HashMap::new();
                for target in targets {
                    if let Some(key) = key_of(&target.values_of(&target_columns)) {
                        buckets.entry(key).or_default().push(target);
                    }
                }
                owners
                    .iter()
                    .map(|owner| {
                        key_of(&owner.values_of(&owner_columns))
                            .and_then(|key| buckets.get(&key).cloned())
                            .unwrap_or_default()
                    })
                    .collect()
            }
            Some(per_owner) => per_owner
                .iter()
                .map(|hops| {
                    let wanted: HashSet<String> = hops
                        .iter()
                        .filter_map(|hop| key_of(&hop.values_of(&owner_columns)))
                        .collect();
                    targets
                        .iter()
                        .filter(|target| {
                            key_of(&target.values_of(&target_columns)).is_some_and(|key| wanted.contains(&key))
                        })
                        .cloned()
                        .collect()
                })
                .collect(),
        };
        Ok(result)
    })
}

type PopulateFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a>>;

/// Eager-loads `path` (dot-separated for nested relations) into `owners`.
pub(crate) fn populate<'a, 'r: 'a>(
    conn: &'a Connection,
    resolver: RelationResolver,
    owners: &'a mut [&'r mut Record],
    path: &'a str,
) -> PopulateFuture<'a> {
    Box::pin(async move {
        let (name, rest) = match path.split_once('.') {
            Some((name, rest)) => (name, Some(rest)),
            None => (path, None),
        };
        let def = resolve(resolver, name)?;

        // Owners that already hold the relation keep it; only the rest load.
        let pending: Vec<usize> = (0..owners.len())
            .filter(|&i| !owners[i].is_relation_populated(name))
            .collect();
        if !pending.is_empty() {
            let loaded = {
                let refs: Vec<&Record> = pending.iter().map(|&i| &*owners[i]).collect();
                fetch_related(conn, &def, resolver, &refs).await?
            };
            for (i, records) in pending.into_iter().zip(loaded) {
                let related = if def.multiple {
                    Related::Many(records)
                } else {
                    Related::One(records.into_iter().next())
                };
                owners[i].populate_relation(name, related);
            }
        }

        if let Some(rest) = rest {
            let mut nested: Vec<&mut Record> = owners
                .iter_mut()
                .flat_map(|owner| owner.related_records_mut(name).iter_mut())
                .collect();
            if !nested.is_empty() {
                populate(conn, def.target_relations, &mut nested, rest).await?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::DataRow;
    use quarry_core::{QueryBuilder, SqliteDialect};

    fn owner(id: i64) -> Record {
        Record::from_row(DataRow::new(vec!["id".into()], vec![SqlValue::Int(id)]), None)
    }

    fn build(query: &Query) -> String {
        QueryBuilder::new(&SqliteDialect).build(query).unwrap().0
    }

    #[test]
    fn test_direct_relation_query() {
        let def = RelationDef::to_table("order", &[("customer_id", "id")], true).order_by("id");
        let query = relation_query(&def, no_relations, &owner(1)).unwrap();
        assert_eq!(
            build(&query),
            "SELECT * FROM `order` WHERE `customer_id`=:qp0 ORDER BY `id`"
        );
    }

    #[test]
    fn test_null_owner_key_matches_nothing() {
        let def = RelationDef::to_table("order", &[("customer_id", "id")], true);
        let query = relation_query(&def, no_relations, &Record::new()).unwrap();
        assert_eq!(build(&query), "SELECT * FROM `order` WHERE 0=1");
    }

    #[test]
    fn test_pivot_relation_query() {
        let def = RelationDef::to_table("item", &[("id", "item_id")], true)
            .via_table("order_item", &[("order_id", "id")]);
        let query = relation_query(&def, no_relations, &owner(2)).unwrap();
        assert_eq!(
            build(&query),
            "SELECT * FROM `item` WHERE `id` IN (SELECT `item_id` FROM `order_item` WHERE `order_id`=:qp0)"
        );
    }

    #[test]
    fn test_unknown_via_relation() {
        let def = RelationDef::to_table("item", &[("id", "item_id")], true).via("missing");
        let err = relation_query(&def, no_relations, &owner(1)).unwrap_err();
        assert!(matches!(err, DbError::InvalidCall(m) if m == "Unknown relation: missing"));
    }

    #[test]
    fn test_distinct_keys_skip_nulls() {
        let records = [owner(1), owner(1), Record::new(), owner(3)];
        let keys = distinct_keys(records.iter(), &["id"]);
        assert_eq!(keys, vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(3)]]);
    }
}
