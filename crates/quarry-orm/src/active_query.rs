//! Queries that return models.

use std::fmt;
use std::marker::PhantomData;

use quarry_core::{Condition, JoinType, Params, Query, SqlValue, ToSqlValue};

use crate::active_record::{found, ActiveRecord};
use crate::connection::Connection;
use crate::error::{DbError, Result};
use crate::query_ext::{index_rows, QueryExt};
use crate::record::Record;
use crate::relation::populate;
use crate::row::DataRow;

/// A [`Query`] over the table of `M` that builds models from its rows and
/// eager-loads the relations named with [`with`](Self::with).
pub struct ActiveQuery<M> {
    query: Query,
    with: Vec<String>,
    model: PhantomData<fn() -> M>,
}

impl<M> Clone for ActiveQuery<M> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            with: self.with.clone(),
            model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for ActiveQuery<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveQuery")
            .field("query", &self.query)
            .field("with", &self.with)
            .finish()
    }
}

impl<M: ActiveRecord> Default for ActiveQuery<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ActiveRecord> ActiveQuery<M> {
    /// `SELECT * FROM` the model's table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            query: Query::new().from([M::table_name()]),
            with: Vec::new(),
            model: PhantomData,
        }
    }

    /// The underlying query.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Consumes into the underlying query.
    #[must_use]
    pub fn into_query(self) -> Query {
        self.query
    }

    /// Applies a transformation to the underlying query.
    #[must_use]
    pub fn map_query(mut self, f: impl FnOnce(Query) -> Query) -> Self {
        self.query = f(self.query);
        self
    }

    /// Eager-loads a relation; dotted paths load nested relations.
    #[must_use]
    pub fn with(mut self, relation: impl Into<String>) -> Self {
        self.with.push(relation.into());
        self
    }

    #[must_use]
    pub fn select<S: Into<String>>(self, columns: impl IntoIterator<Item = S>) -> Self {
        self.map_query(|q| q.select(columns))
    }

    #[must_use]
    pub fn add_select<S: Into<String>>(self, columns: impl IntoIterator<Item = S>) -> Self {
        self.map_query(|q| q.add_select(columns))
    }

    #[must_use]
    pub fn distinct(self, distinct: bool) -> Self {
        self.map_query(|q| q.distinct(distinct))
    }

    /// Replaces the FROM clause, e.g. to alias the table.
    #[must_use]
    pub fn from<S: Into<String>>(self, tables: impl IntoIterator<Item = S>) -> Self {
        self.map_query(|q| q.from(tables))
    }

    #[must_use]
    pub fn where_clause(self, condition: impl Into<Condition>) -> Self {
        self.map_query(|q| q.where_clause(condition))
    }

    #[must_use]
    pub fn and_where(self, condition: impl Into<Condition>) -> Self {
        self.map_query(|q| q.and_where(condition))
    }

    #[must_use]
    pub fn or_where(self, condition: impl Into<Condition>) -> Self {
        self.map_query(|q| q.or_where(condition))
    }

    #[must_use]
    pub fn join(self, kind: JoinType, table: impl Into<String>, on: Option<Condition>) -> Self {
        self.map_query(|q| q.join(kind, table, on))
    }

    #[must_use]
    pub fn inner_join(self, table: impl Into<String>, on: impl Into<Condition>) -> Self {
        self.map_query(|q| q.inner_join(table, on))
    }

    #[must_use]
    pub fn left_join(self, table: impl Into<String>, on: impl Into<Condition>) -> Self {
        self.map_query(|q| q.left_join(table, on))
    }

    #[must_use]
    pub fn group_by<S: Into<String>>(self, columns: impl IntoIterator<Item = S>) -> Self {
        self.map_query(|q| q.group_by(columns))
    }

    #[must_use]
    pub fn having(self, condition: impl Into<Condition>) -> Self {
        self.map_query(|q| q.having(condition))
    }

    #[must_use]
    pub fn order_by(self, spec: &str) -> Self {
        self.map_query(|q| q.order_by(spec))
    }

    #[must_use]
    pub fn add_order_by(self, spec: &str) -> Self {
        self.map_query(|q| q.add_order_by(spec))
    }

    #[must_use]
    pub fn limit(self, limit: u64) -> Self {
        self.map_query(|q| q.limit(limit))
    }

    #[must_use]
    pub fn offset(self, offset: u64) -> Self {
        self.map_query(|q| q.offset(offset))
    }

    #[must_use]
    pub fn index_by(self, column: impl Into<String>) -> Self {
        self.map_query(|q| q.index_by(column))
    }

    #[must_use]
    pub fn params(self, params: Params) -> Self {
        self.map_query(|q| q.params(params))
    }

    #[must_use]
    pub fn add_param(self, name: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.map_query(|q| q.add_param(name, value))
    }

    async fn records(&self, conn: &Connection, query: &Query) -> Result<Vec<Record>> {
        let rows = query.all(conn).await?;
        let schema = conn.table_schema(M::table_name(), false).await?;
        let mut records: Vec<Record> = rows
            .into_iter()
            .map(|row| Record::from_row(row, schema.as_deref()))
            .collect();
        if !records.is_empty() {
            for path in &self.with {
                let mut owners: Vec<&mut Record> = records.iter_mut().collect();
                populate(conn, M::relation, &mut owners, path).await?;
            }
        }
        Ok(records)
    }

    /// All matching models.
    pub async fn all(&self, conn: &Connection) -> Result<Vec<M>> {
        let records = self.records(conn, &self.query).await?;
        Ok(records.into_iter().map(found).collect())
    }

    /// Models keyed by the index-by column, in result order.
    pub async fn all_indexed(&self, conn: &Connection) -> Result<Vec<(String, M)>> {
        let records = self.records(conn, &self.query).await?;
        let indexed = match self.query.index_column() {
            Some(column) => index_rows(records, |r| {
                r.get_attribute(column).map(ToString::to_string).unwrap_or_default()
            }),
            None => records
                .into_iter()
                .enumerate()
                .map(|(i, r)| (i.to_string(), r))
                .collect(),
        };
        Ok(indexed.into_iter().map(|(key, r)| (key, found(r))).collect())
    }

    /// The first matching model.
    pub async fn one(&self, conn: &Connection) -> Result<Option<M>> {
        let records = self.records(conn, &self.query.clone().limit(1)).await?;
        Ok(records.into_iter().next().map(found))
    }

    /// The first matching model, or [`DbError::NotFound`].
    pub async fn one_or_fail(&self, conn: &Connection) -> Result<M> {
        self.one(conn).await?.ok_or(DbError::NotFound)
    }

    /// Rows without building models.
    pub async fn all_rows(&self, conn: &Connection) -> Result<Vec<DataRow>> {
        self.query.all(conn).await
    }

    /// The first row without building a model.
    pub async fn one_row(&self, conn: &Connection) -> Result<Option<DataRow>> {
        self.query.one(conn).await
    }

    pub async fn count(&self, conn: &Connection, q: &str) -> Result<i64> {
        self.query.count(conn, q).await
    }

    pub async fn sum(&self, conn: &Connection, q: &str) -> Result<Option<SqlValue>> {
        self.query.sum(conn, q).await
    }

    pub async fn average(&self, conn: &Connection, q: &str) -> Result<Option<SqlValue>> {
        self.query.average(conn, q).await
    }

    pub async fn min(&self, conn: &Connection, q: &str) -> Result<Option<SqlValue>> {
        self.query.min(conn, q).await
    }

    pub async fn max(&self, conn: &Connection, q: &str) -> Result<Option<SqlValue>> {
        self.query.max(conn, q).await
    }

    pub async fn scalar(&self, conn: &Connection) -> Result<Option<SqlValue>> {
        self.query.scalar(conn).await
    }

    pub async fn column(&self, conn: &Connection) -> Result<Vec<SqlValue>> {
        self.query.column(conn).await
    }

    pub async fn exists(&self, conn: &Connection) -> Result<bool> {
        self.query.exists(conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{QueryBuilder, SqliteDialect};

    #[derive(Debug, Clone, Default)]
    struct Customer(Record);

    impl ActiveRecord for Customer {
        fn table_name() -> &'static str {
            "customer"
        }
        fn from_record(record: Record) -> Self {
            Self(record)
        }
        fn record(&self) -> &Record {
            &self.0
        }
        fn record_mut(&mut self) -> &mut Record {
            &mut self.0
        }
    }

    #[test]
    fn test_find_targets_model_table() {
        let query = Customer::find()
            .where_clause(Condition::eq("status", 1))
            .order_by("id DESC")
            .limit(2)
            .into_query();
        let (sql, _) = QueryBuilder::new(&SqliteDialect).build(&query).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM `customer` WHERE `status`=:qp0 ORDER BY `id` DESC LIMIT 2"
        );
    }
}
