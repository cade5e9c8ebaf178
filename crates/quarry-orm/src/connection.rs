//! Database connection.
//!
//! A [`Connection`] owns one native handle, opened lazily on first use, and
//! everything that is memoized per handle: the transaction nesting level,
//! loaded table schemas and the query-cache switch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use quarry_core::{Dialect, Params, QueryBuilder, SqlValue};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::cache::Cache;
use crate::command::Command;
use crate::config::ConnectionConfig;
use crate::driver::{Driver, Handle};
use crate::error::{DbError, Result};
use crate::schema::{self, TableSchema};
use crate::transaction::Transaction;

/// A database connection.
///
/// ```no_run
/// # async fn demo() -> quarry_orm::Result<()> {
/// use quarry_orm::{Connection, ConnectionConfig};
///
/// let db = Connection::new(ConnectionConfig::new("sqlite::memory:"))?;
/// db.command("CREATE TABLE t (id INTEGER PRIMARY KEY)").execute().await?;
/// let count = db.command("SELECT COUNT(*) FROM t").query_scalar().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    driver: Driver,
    dialect: Box<dyn Dialect>,
    handle: Mutex<Option<Handle>>,
    transaction_level: AtomicUsize,
    // Lowest level of a transaction dropped while active; rolled back on the
    // next statement.
    orphaned_level: StdMutex<Option<usize>>,
    schemas: StdMutex<HashMap<String, Arc<TableSchema>>>,
    cache: Option<Arc<dyn Cache>>,
    query_cache_enabled: AtomicBool,
}

impl Connection {
    /// Creates a connection. Nothing is opened until the first statement.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        if config.dsn.trim().is_empty() {
            return Err(DbError::Configuration(String::from("Connection::dsn cannot be empty.")));
        }
        let driver = Driver::from_dsn(&config.dsn).ok_or_else(|| {
            DbError::Configuration(format!("unsupported DSN scheme: {}", config.dsn))
        })?;
        let dialect = quarry_core::dialect_for_dsn(&config.dsn).ok_or_else(|| {
            DbError::Configuration(format!("no dialect for DSN: {}", config.dsn))
        })?;
        let query_cache_enabled = AtomicBool::new(config.enable_query_cache);
        Ok(Self {
            config,
            driver,
            dialect,
            handle: Mutex::new(None),
            transaction_level: AtomicUsize::new(0),
            orphaned_level: StdMutex::new(None),
            schemas: StdMutex::new(HashMap::new()),
            cache: None,
            query_cache_enabled,
        })
    }

    /// Attaches the cache used for query results and schema metadata.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Backend selected by the DSN.
    #[must_use]
    pub const fn driver(&self) -> Driver {
        self.driver
    }

    /// Name of the active driver (`sqlite`, `pgsql`, `mysql`).
    #[must_use]
    pub const fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    /// SQL dialect of the backend.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Query builder for this connection's dialect.
    #[must_use]
    pub fn query_builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self.dialect())
    }

    /// The attached cache component.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    /// Turns query result caching on or off at runtime.
    pub fn set_query_cache_enabled(&self, enabled: bool) {
        self.query_cache_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether query results are cached.
    #[must_use]
    pub fn is_query_cache_enabled(&self) -> bool {
        self.query_cache_enabled.load(Ordering::Relaxed)
    }

    /// Opens the native handle if it is not open yet.
    pub async fn open(&self) -> Result<()> {
        let mut guard = self.handle.lock().await;
        self.open_locked(&mut guard).await
    }

    async fn open_locked(&self, slot: &mut Option<Handle>) -> Result<()> {
        if slot.is_some() {
            return Ok(());
        }
        info!(dsn = %self.config.dsn, "opening DB connection");
        let url = self.connect_url();
        let handle = Handle::connect(self.driver, &url).await.map_err(|e| {
            error!(dsn = %self.config.dsn, error = %e, "failed to open DB connection");
            DbError::driver(e, String::new())
        })?;
        *slot = Some(handle);
        Ok(())
    }

    /// Closes the native handle. Schema memo and transaction level are
    /// reset; the next statement reopens the connection.
    pub async fn close(&self) -> Result<()> {
        let handle = self.handle.lock().await.take();
        self.transaction_level.store(0, Ordering::SeqCst);
        *self.orphaned_level.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.schemas.lock().unwrap_or_else(PoisonError::into_inner).clear();
        if let Some(handle) = handle {
            info!(dsn = %self.config.dsn, "closing DB connection");
            handle.close().await.map_err(|e| DbError::driver(e, String::new()))?;
        }
        Ok(())
    }

    /// Whether the native handle is open.
    pub async fn is_active(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    // DSN with configured credentials added when the URL carries none.
    fn connect_url(&self) -> String {
        let dsn = &self.config.dsn;
        let Some(username) = self.config.username.as_deref() else {
            return dsn.clone();
        };
        let Some(scheme_end) = dsn.find("://") else {
            return dsn.clone();
        };
        let rest = &dsn[scheme_end + 3..];
        let authority = rest.split('/').next().unwrap_or_default();
        if authority.contains('@') {
            return dsn.clone();
        }
        let credentials = match self.config.password.as_deref() {
            Some(password) if !password.is_empty() => format!("{username}:{password}"),
            _ => username.to_string(),
        };
        format!("{}://{credentials}@{rest}", &dsn[..scheme_end])
    }

    /// Locks the native handle, opening it on first use and rolling back any
    /// transaction that was dropped while active.
    pub(crate) async fn handle(&self) -> Result<MappedMutexGuard<'_, Handle>> {
        let mut guard = self.handle.lock().await;
        self.open_locked(&mut guard).await?;
        let orphaned = self
            .orphaned_level
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let (Some(level), Some(handle)) = (orphaned, guard.as_mut()) {
            let sql = rollback_sql(level);
            warn!(level, sql = %sql, "rolling back transaction dropped while active");
            handle.execute(&sql, Vec::new()).await.map_err(|e| DbError::driver(e, sql))?;
            self.transaction_level.store(level - 1, Ordering::SeqCst);
        }
        MutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| DbError::InvalidCall(String::from("the DB connection is not open")))
    }

    /// Creates a command for `sql`.
    pub fn command(&self, sql: impl Into<String>) -> Command<'_> {
        Command::new(self, sql.into())
    }

    /// Creates a command for `sql` with params already bound.
    pub fn create_command(&self, sql: impl Into<String>, params: Params) -> Command<'_> {
        Command::new(self, sql.into()).bind_values(params)
    }

    /// Starts a transaction, or a savepoint when one is already active.
    pub async fn begin_transaction(&self) -> Result<Transaction<'_>> {
        // Acquire first: a pending orphan rollback may lower the level.
        let mut handle = self.handle().await?;
        let level = self.transaction_level();
        let sql = if level == 0 {
            String::from("BEGIN")
        } else {
            format!("SAVEPOINT LEVEL{level}")
        };
        handle
            .execute(&sql, Vec::new())
            .await
            .map_err(|e| DbError::driver(e, sql.clone()))?;
        drop(handle);
        let level = self.transaction_level.fetch_add(1, Ordering::SeqCst) + 1;
        info!(level, "transaction started");
        Ok(Transaction::new(self, level))
    }

    /// Current nesting depth; 0 outside transactions.
    #[must_use]
    pub fn transaction_level(&self) -> usize {
        self.transaction_level.load(Ordering::SeqCst)
    }

    pub(crate) async fn end_transaction(&self, level: usize, commit: bool) -> Result<()> {
        // Acquiring the handle first rolls back savepoints of dropped inner
        // transactions, which lowers the level.
        let mut handle = self.handle().await?;
        let current = self.transaction_level();
        if current != level {
            return Err(DbError::Transaction(format!(
                "transaction at level {level} is not the innermost one (current level {current})"
            )));
        }
        let sql = match (commit, level) {
            (true, 1) => String::from("COMMIT"),
            (true, n) => format!("RELEASE SAVEPOINT LEVEL{}", n - 1),
            (false, n) => rollback_sql(n),
        };
        let result = handle.execute(&sql, Vec::new()).await;
        drop(handle);
        self.transaction_level.store(level - 1, Ordering::SeqCst);
        result.map_err(|e| {
            error!(sql = %sql, error = %e, "failed to end transaction");
            DbError::driver(e, sql.clone())
        })?;
        info!(level, commit, "transaction ended");
        Ok(())
    }

    pub(crate) fn orphan_transaction(&self, level: usize) {
        let mut orphaned = self.orphaned_level.lock().unwrap_or_else(PoisonError::into_inner);
        *orphaned = Some(orphaned.map_or(level, |current| current.min(level)));
    }

    /// ID of the last inserted row, or the last value of `sequence`.
    pub async fn last_insert_id(&self, sequence: Option<&str>) -> Result<SqlValue> {
        let sql = self.dialect.last_insert_id_sql(sequence);
        Ok(self
            .command(sql)
            .no_cache()
            .query_scalar()
            .await?
            .unwrap_or(SqlValue::Null))
    }

    /// Quotes a table name.
    #[must_use]
    pub fn quote_table_name(&self, name: &str) -> String {
        self.dialect.quote_table_name(name)
    }

    /// Quotes a column name.
    #[must_use]
    pub fn quote_column_name(&self, name: &str) -> String {
        self.dialect.quote_column_name(name)
    }

    /// Quotes a value as an SQL literal.
    #[must_use]
    pub fn quote_value(&self, value: &SqlValue) -> String {
        self.dialect.quote_value(value)
    }

    /// Expands `{{table}}`, `{{%table}}` and `[[column]]` markers.
    #[must_use]
    pub fn quote_sql(&self, sql: &str) -> String {
        self.dialect.quote_sql(sql, &self.config.table_prefix)
    }

    /// Real table name for `{{%name}}` style references.
    #[must_use]
    pub fn raw_table_name(&self, name: &str) -> String {
        name.strip_prefix("{{")
            .and_then(|n| n.strip_suffix("}}"))
            .map_or_else(|| name.to_string(), |n| n.replace('%', &self.config.table_prefix))
    }

    /// Metadata of a table, `None` when it does not exist. Loaded once per
    /// connection; `refresh` reloads it.
    pub async fn table_schema(&self, name: &str, refresh: bool) -> Result<Option<Arc<TableSchema>>> {
        let raw = self.raw_table_name(name);
        if !refresh {
            if let Some(schema) = self.memoized_schema(&raw) {
                return Ok(Some(schema));
            }
        }
        let cache_key = self.schema_cache_key(&raw);
        let cache = self.schema_cache(&raw);
        if !refresh {
            if let (Some(cache), Some(key)) = (cache, cache_key.as_deref()) {
                if let Some(value) = cache.get(key) {
                    let schema: Arc<TableSchema> = Arc::new(serde_json::from_value(value)?);
                    self.memoize_schema(&raw, Arc::clone(&schema));
                    return Ok(Some(schema));
                }
            }
        }
        let Some(loaded) = schema::load_table_schema(self, &raw).await? else {
            return Ok(None);
        };
        debug!(table = %raw, columns = loaded.columns.len(), "loaded table schema");
        if let (Some(cache), Some(key)) = (cache, cache_key.as_deref()) {
            cache.set(key, serde_json::to_value(&loaded)?, self.config.schema_cache_ttl(), None);
        }
        let loaded = Arc::new(loaded);
        self.memoize_schema(&raw, Arc::clone(&loaded));
        Ok(Some(loaded))
    }

    /// Metadata of a table that must exist.
    pub async fn require_table_schema(&self, name: &str) -> Result<Arc<TableSchema>> {
        self.table_schema(name, false).await?.ok_or_else(|| {
            DbError::Configuration(format!("The table does not exist: {}", self.raw_table_name(name)))
        })
    }

    /// Names of all tables in the default schema.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        schema::load_table_names(self).await
    }

    /// Drops every memoized and cached table schema.
    pub fn refresh_schema(&self) {
        let names: Vec<String> = {
            let mut schemas = self.schemas.lock().unwrap_or_else(PoisonError::into_inner);
            schemas.drain().map(|(name, _)| name).collect()
        };
        if let Some(cache) = &self.cache {
            for name in names {
                if let Some(key) = self.schema_cache_key(&name) {
                    cache.delete(&key);
                }
            }
        }
    }

    /// Drops the memoized and cached schema of one table.
    pub fn refresh_table_schema(&self, name: &str) {
        let raw = self.raw_table_name(name);
        self.schemas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&raw);
        if let (Some(cache), Some(key)) = (&self.cache, self.schema_cache_key(&raw)) {
            cache.delete(&key);
        }
    }

    fn memoized_schema(&self, raw: &str) -> Option<Arc<TableSchema>> {
        self.schemas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(raw)
            .cloned()
    }

    fn memoize_schema(&self, raw: &str, schema: Arc<TableSchema>) {
        self.schemas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(raw.to_string(), schema);
    }

    fn schema_cache(&self, raw: &str) -> Option<&Arc<dyn Cache>> {
        if !self.config.enable_schema_cache || self.config.schema_cache_exclude.iter().any(|t| t == raw) {
            return None;
        }
        self.cache.as_ref()
    }

    fn schema_cache_key(&self, raw: &str) -> Option<String> {
        self.cache.as_ref().map(|_| {
            format!(
                "quarry_orm::Schema|{}|{}|{raw}",
                self.config.dsn,
                self.config.username.as_deref().unwrap_or_default()
            )
        })
    }
}

fn rollback_sql(level: usize) -> String {
    if level <= 1 {
        String::from("ROLLBACK")
    } else {
        format!("ROLLBACK TO SAVEPOINT LEVEL{}", level - 1)
    }
}
