//! SQL commands.
//!
//! A [`Command`] is SQL text plus bound params, tied to a [`Connection`].
//! Results come back in four shapes: all rows, the first row, the first
//! column and the first cell. Query results go through the connection's
//! cache when caching is enabled.

use std::time::{Duration, Instant};

use quarry_core::{ColumnValue, Condition, Params, SqlValue, ToSqlValue};
use tracing::{debug, error};

use crate::cache::{Cache, CacheDependency};
use crate::connection::Connection;
use crate::error::{DbError, Result};
use crate::placeholders;
use crate::row::DataRow;

/// Per-command override of the query cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum CacheMode {
    /// Follow the connection settings.
    #[default]
    Inherit,
    /// Never cache this command.
    Disabled,
    /// Cache with an explicit lifetime and dependency.
    Enabled {
        ttl: Option<Duration>,
        dependency: Option<CacheDependency>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fetch {
    All,
    One,
    Column,
    Scalar,
}

impl Fetch {
    const fn method(self) -> &'static str {
        match self {
            Self::All => "fetchAll",
            Self::One => "fetch",
            Self::Column => "fetchColumn",
            Self::Scalar => "fetchScalar",
        }
    }
}

/// A statement ready to run on a connection.
#[derive(Debug, Clone)]
pub struct Command<'c> {
    connection: &'c Connection,
    sql: String,
    params: Params,
    prepared: bool,
    cache_mode: CacheMode,
}

impl<'c> Command<'c> {
    pub(crate) fn new(connection: &'c Connection, sql: String) -> Self {
        Self {
            sql: connection.quote_sql(&sql),
            connection,
            params: Params::new(),
            prepared: false,
            cache_mode: CacheMode::Inherit,
        }
    }

    /// The connection this command runs on.
    #[must_use]
    pub const fn connection(&self) -> &'c Connection {
        self.connection
    }

    /// SQL text with table and column markers expanded.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Replaces the SQL text. Bound params and the prepared state are
    /// discarded.
    pub fn set_sql(&mut self, sql: impl Into<String>) -> &mut Self {
        self.sql = self.connection.quote_sql(&sql.into());
        self.params = Params::new();
        self.prepared = false;
        self
    }

    /// Bound params.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Whether [`prepare`](Self::prepare) succeeded for the current SQL.
    #[must_use]
    pub const fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Binds one value to `:name`, or to the n-th `?` when `name` is `"n"`.
    #[must_use]
    pub fn bind_value(mut self, name: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.params.set(name, value);
        self
    }

    /// Binds every param in `params`.
    #[must_use]
    pub fn bind_values(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    /// Caches the result of this command for `ttl` (`None` never expires),
    /// optionally tagged with `dependency`.
    #[must_use]
    pub fn cache(mut self, ttl: Option<Duration>, dependency: Option<CacheDependency>) -> Self {
        self.cache_mode = CacheMode::Enabled { ttl, dependency };
        self
    }

    /// Bypasses the query cache for this command.
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.cache_mode = CacheMode::Disabled;
        self
    }

    /// SQL with params substituted as literals, for logging and cache keys.
    #[must_use]
    pub fn raw_sql(&self) -> String {
        placeholders::inline(&self.sql, &self.params, self.connection.dialect())
    }

    /// Asks the server to prepare the statement, which validates it.
    pub async fn prepare(&mut self) -> Result<()> {
        if self.prepared {
            return Ok(());
        }
        let (sql, _) = placeholders::to_positional(&self.sql, &self.params, self.connection.dialect())?;
        let mut handle = self.connection.handle().await?;
        let result = handle.prepare(&sql).await;
        drop(handle);
        result.map_err(|e| self.fail(e))?;
        self.prepared = true;
        Ok(())
    }

    /// Drops the prepared state.
    pub fn cancel(&mut self) {
        self.prepared = false;
    }

    /// Runs a statement that returns no rows. Returns the affected row
    /// count.
    pub async fn execute(&self) -> Result<u64> {
        let (sql, values) = placeholders::to_positional(&self.sql, &self.params, self.connection.dialect())?;
        let start = Instant::now();
        let mut handle = self.connection.handle().await?;
        let result = handle.execute(&sql, values).await;
        drop(handle);
        let rows = result.map_err(|e| self.fail(e))?;
        debug!(
            sql = %self.raw_sql(),
            elapsed_ms = elapsed_ms(start),
            rows,
            "executed statement"
        );
        Ok(rows)
    }

    /// All result rows.
    pub async fn query_all(&self) -> Result<Vec<DataRow>> {
        self.fetch(Fetch::All).await
    }

    /// The first result row.
    pub async fn query_one(&self) -> Result<Option<DataRow>> {
        Ok(self.fetch(Fetch::One).await?.into_iter().next())
    }

    /// First value of every row.
    pub async fn query_column(&self) -> Result<Vec<SqlValue>> {
        Ok(self
            .fetch(Fetch::Column)
            .await?
            .into_iter()
            .filter_map(DataRow::into_first)
            .collect())
    }

    /// First value of the first row.
    pub async fn query_scalar(&self) -> Result<Option<SqlValue>> {
        Ok(self
            .fetch(Fetch::Scalar)
            .await?
            .into_iter()
            .next()
            .and_then(DataRow::into_first))
    }

    fn cache_slot(&self) -> Option<(&'c dyn Cache, Option<Duration>, Option<&CacheDependency>)> {
        let connection = self.connection;
        let cache = connection.cache()?;
        if !connection.is_query_cache_enabled() {
            return None;
        }
        match &self.cache_mode {
            CacheMode::Disabled => None,
            CacheMode::Inherit => Some((cache.as_ref(), connection.config().query_cache_ttl(), None)),
            CacheMode::Enabled { ttl, dependency } => Some((cache.as_ref(), *ttl, dependency.as_ref())),
        }
    }

    fn cache_key(&self, fetch: Fetch, raw_sql: &str) -> String {
        let config = self.connection.config();
        format!(
            "quarry_orm::Command|{}|{}|{}|{raw_sql}",
            fetch.method(),
            config.dsn,
            config.username.as_deref().unwrap_or_default()
        )
    }

    async fn fetch(&self, fetch: Fetch) -> Result<Vec<DataRow>> {
        let raw_sql = self.raw_sql();
        let slot = self.cache_slot();
        let key = slot.as_ref().map(|_| self.cache_key(fetch, &raw_sql));
        if let (Some((cache, ..)), Some(key)) = (&slot, &key) {
            if let Some(value) = cache.get(key) {
                debug!(sql = %raw_sql, "query result served from cache");
                return Ok(serde_json::from_value(value)?);
            }
        }

        let (sql, values) = placeholders::to_positional(&self.sql, &self.params, self.connection.dialect())?;
        let start = Instant::now();
        let mut handle = self.connection.handle().await?;
        let result = match fetch {
            Fetch::One | Fetch::Scalar => handle
                .fetch_optional(&sql, values)
                .await
                .map(|row| row.into_iter().collect::<Vec<_>>()),
            Fetch::All | Fetch::Column => handle.fetch_all(&sql, values).await,
        };
        drop(handle);
        let rows = result.map_err(|e| self.fail(e))?;
        debug!(
            sql = %raw_sql,
            elapsed_ms = elapsed_ms(start),
            rows = rows.len(),
            "executed query"
        );

        if let (Some((cache, ttl, dependency)), Some(key)) = (slot, key) {
            cache.set(&key, serde_json::to_value(&rows)?, ttl, dependency);
            debug!(key = %key, "saved query result in cache");
        }
        Ok(rows)
    }

    fn fail(&self, source: sqlx::Error) -> DbError {
        let raw_sql = self.raw_sql();
        error!(sql = %raw_sql, error = %source, "statement failed");
        DbError::driver(source, raw_sql)
    }

    fn with_statement(mut self, sql: String, params: Params) -> Self {
        self.set_sql(sql);
        self.params = params;
        self
    }

    /// INSERT of one row.
    pub fn insert(self, table: &str, columns: &[(String, ColumnValue)]) -> Result<Self> {
        let (sql, params) = self.connection.query_builder().insert(table, columns)?;
        Ok(self.with_statement(sql, params))
    }

    /// Multi-row INSERT.
    pub fn batch_insert<S: AsRef<str>>(self, table: &str, columns: &[S], rows: &[Vec<SqlValue>]) -> Result<Self> {
        let (sql, params) = self.connection.query_builder().batch_insert(table, columns, rows)?;
        Ok(self.with_statement(sql, params))
    }

    /// UPDATE of the rows matching `condition`.
    pub fn update(self, table: &str, columns: &[(String, ColumnValue)], condition: Option<&Condition>) -> Result<Self> {
        let (sql, params) = self.connection.query_builder().update(table, columns, condition)?;
        Ok(self.with_statement(sql, params))
    }

    /// Counter increments on the rows matching `condition`.
    pub fn update_counters(self, table: &str, counters: &[(String, i64)], condition: Option<&Condition>) -> Result<Self> {
        let (sql, params) = self
            .connection
            .query_builder()
            .update_counters(table, counters, condition)?;
        Ok(self.with_statement(sql, params))
    }

    /// DELETE of the rows matching `condition`.
    pub fn delete(self, table: &str, condition: Option<&Condition>) -> Result<Self> {
        let (sql, params) = self.connection.query_builder().delete(table, condition)?;
        Ok(self.with_statement(sql, params))
    }

    /// CREATE TABLE with abstract column types.
    #[must_use]
    pub fn create_table(self, table: &str, columns: &[(&str, &str)], options: Option<&str>) -> Self {
        let sql = self.connection.query_builder().create_table(table, columns, options);
        self.with_statement(sql, Params::new())
    }

    /// DROP TABLE.
    #[must_use]
    pub fn drop_table(self, table: &str) -> Self {
        let sql = self.connection.query_builder().drop_table(table);
        self.with_statement(sql, Params::new())
    }

    /// Removes every row of a table.
    #[must_use]
    pub fn truncate_table(self, table: &str) -> Self {
        let sql = self.connection.query_builder().truncate_table(table);
        self.with_statement(sql, Params::new())
    }

    /// Renames a table.
    #[must_use]
    pub fn rename_table(self, from: &str, to: &str) -> Self {
        let sql = self.connection.query_builder().rename_table(from, to);
        self.with_statement(sql, Params::new())
    }

    /// Adds a column.
    #[must_use]
    pub fn add_column(self, table: &str, column: &str, column_type: &str) -> Self {
        let sql = self.connection.query_builder().add_column(table, column, column_type);
        self.with_statement(sql, Params::new())
    }

    /// Drops a column.
    #[must_use]
    pub fn drop_column(self, table: &str, column: &str) -> Self {
        let sql = self.connection.query_builder().drop_column(table, column);
        self.with_statement(sql, Params::new())
    }

    /// Creates an index.
    #[must_use]
    pub fn create_index<S: AsRef<str>>(self, name: &str, table: &str, columns: &[S], unique: bool) -> Self {
        let sql = self.connection.query_builder().create_index(name, table, columns, unique);
        self.with_statement(sql, Params::new())
    }

    /// Drops an index.
    #[must_use]
    pub fn drop_index(self, name: &str, table: &str) -> Self {
        let sql = self.connection.query_builder().drop_index(name, table);
        self.with_statement(sql, Params::new())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
