//! Running a [`Query`] on a [`Connection`].

use std::collections::HashMap;

use quarry_core::{Query, SqlValue};

use crate::command::Command;
use crate::connection::Connection;
use crate::error::Result;
use crate::row::DataRow;

/// Execution methods for [`Query`].
///
/// ```no_run
/// # async fn demo(db: &quarry_orm::Connection) -> quarry_orm::Result<()> {
/// use quarry_core::{Condition, Query};
/// use quarry_orm::QueryExt;
///
/// let active = Query::new().from(["customer"]).where_clause(Condition::eq("status", 1));
/// let total = active.count(db, "*").await?;
/// let rows = active.clone().order_by("name").limit(10).all(db).await?;
/// # Ok(())
/// # }
/// ```
#[allow(async_fn_in_trait)]
pub trait QueryExt {
    /// Compiles the query into a command.
    fn create_command<'c>(&self, db: &'c Connection) -> Result<Command<'c>>;

    /// All rows.
    async fn all(&self, db: &Connection) -> Result<Vec<DataRow>>;

    /// All rows keyed by the index-by column, in result order. A later row
    /// with the same key replaces the earlier one.
    async fn all_indexed(&self, db: &Connection) -> Result<Vec<(String, DataRow)>>;

    /// The first row.
    async fn one(&self, db: &Connection) -> Result<Option<DataRow>>;

    /// First cell of the first row.
    async fn scalar(&self, db: &Connection) -> Result<Option<SqlValue>>;

    /// First column of every row.
    async fn column(&self, db: &Connection) -> Result<Vec<SqlValue>>;

    /// `COUNT(q)`.
    async fn count(&self, db: &Connection, q: &str) -> Result<i64>;

    /// `SUM(q)`.
    async fn sum(&self, db: &Connection, q: &str) -> Result<Option<SqlValue>>;

    /// `AVG(q)`.
    async fn average(&self, db: &Connection, q: &str) -> Result<Option<SqlValue>>;

    /// `MIN(q)`.
    async fn min(&self, db: &Connection, q: &str) -> Result<Option<SqlValue>>;

    /// `MAX(q)`.
    async fn max(&self, db: &Connection, q: &str) -> Result<Option<SqlValue>>;

    /// Whether any row matches.
    async fn exists(&self, db: &Connection) -> Result<bool>;
}

impl QueryExt for Query {
    fn create_command<'c>(&self, db: &'c Connection) -> Result<Command<'c>> {
        let (sql, params) = db.query_builder().build(self)?;
        Ok(db.create_command(sql, params))
    }

    async fn all(&self, db: &Connection) -> Result<Vec<DataRow>> {
        self.create_command(db)?.query_all().await
    }

    async fn all_indexed(&self, db: &Connection) -> Result<Vec<(String, DataRow)>> {
        let rows = self.all(db).await?;
        let Some(column) = self.index_column() else {
            return Ok(rows
                .into_iter()
                .enumerate()
                .map(|(i, row)| (i.to_string(), row))
                .collect());
        };
        Ok(index_rows(rows, |row| {
            row.get(column).map(ToString::to_string).unwrap_or_default()
        }))
    }

    async fn one(&self, db: &Connection) -> Result<Option<DataRow>> {
        self.create_command(db)?.query_one().await
    }

    async fn scalar(&self, db: &Connection) -> Result<Option<SqlValue>> {
        self.create_command(db)?.query_scalar().await
    }

    async fn column(&self, db: &Connection) -> Result<Vec<SqlValue>> {
        self.create_command(db)?.query_column().await
    }

    async fn count(&self, db: &Connection, q: &str) -> Result<i64> {
        let value = aggregate_scalar(self, db, &format!("COUNT({q})")).await?;
        Ok(value
            .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or_default())
    }

    async fn sum(&self, db: &Connection, q: &str) -> Result<Option<SqlValue>> {
        aggregate_scalar(self, db, &format!("SUM({q})")).await
    }

    async fn average(&self, db: &Connection, q: &str) -> Result<Option<SqlValue>> {
        aggregate_scalar(self, db, &format!("AVG({q})")).await
    }

    async fn min(&self, db: &Connection, q: &str) -> Result<Option<SqlValue>> {
        aggregate_scalar(self, db, &format!("MIN({q})")).await
    }

    async fn max(&self, db: &Connection, q: &str) -> Result<Option<SqlValue>> {
        aggregate_scalar(self, db, &format!("MAX({q})")).await
    }

    async fn exists(&self, db: &Connection) -> Result<bool> {
        let (sql, params) = db.query_builder().build(self)?;
        let value = db
            .create_command(format!("SELECT EXISTS({sql})"), params)
            .query_scalar()
            .await?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }
}

/// Selects `expression` over the query. Grouped, distinct or combined
/// queries are wrapped in a sub-select so the aggregate sees their rows.
async fn aggregate_scalar(query: &Query, db: &Connection, expression: &str) -> Result<Option<SqlValue>> {
    let query = if query.is_compound() {
        Query::new().select([expression]).from_query(query.clone(), "c")
    } else {
        query
            .clone()
            .select([expression])
            .clear_order_by()
            .clear_limit()
    };
    query
        .scalar(db)
        .await
        .map(|value| value.filter(|v| !v.is_null()))
}

pub(crate) fn index_rows<T>(items: Vec<T>, key: impl Fn(&T) -> String) -> Vec<(String, T)> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut indexed: Vec<(String, T)> = Vec::with_capacity(items.len());
    for item in items {
        let k = key(&item);
        match positions.get(&k) {
            Some(&at) => indexed[at].1 = item,
            None => {
                positions.insert(k.clone(), indexed.len());
                indexed.push((k, item));
            }
        }
    }
    indexed
}
