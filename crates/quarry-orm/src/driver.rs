//! The native database handle.
//!
//! A [`Connection`](crate::Connection) owns exactly one sqlx connection. The
//! backend is picked from the DSN scheme, and every statement goes through
//! [`Handle`], which binds [`SqlValue`]s and decodes rows into [`DataRow`]s.

use std::str::FromStr;

use quarry_core::SqlValue;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection as _, Executor};

use crate::row::DataRow;

/// Database backend selected by the DSN scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// `sqlite:`
    Sqlite,
    /// `postgres:` / `postgresql:`
    Postgres,
    /// `mysql:` / `mariadb:`
    Mysql,
}

impl Driver {
    /// Driver for a DSN, or `None` for an unknown scheme.
    #[must_use]
    pub fn from_dsn(dsn: &str) -> Option<Self> {
        let scheme = dsn.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" | "pgsql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::Mysql),
            _ => None,
        }
    }

    /// Short driver name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "pgsql",
            Self::Mysql => "mysql",
        }
    }
}

macro_rules! bind_values {
    ($db:ty, $sql:expr, $values:expr) => {{
        let mut query = sqlx::query::<$db>($sql);
        for value in $values {
            query = match value {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Bool(b) => query.bind(b),
                SqlValue::Int(i) => query.bind(i),
                SqlValue::Float(f) => query.bind(f),
                SqlValue::Text(s) => query.bind(s),
                SqlValue::Blob(b) => query.bind(b),
            };
        }
        query
    }};
}

pub(crate) enum Handle {
    Sqlite(SqliteConnection),
    Postgres(PgConnection),
    Mysql(MySqlConnection),
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sqlite(_) => "Sqlite",
            Self::Postgres(_) => "Postgres",
            Self::Mysql(_) => "Mysql",
        };
        f.debug_tuple("Handle").field(&name).finish()
    }
}

impl Handle {
    pub(crate) async fn connect(driver: Driver, url: &str) -> Result<Self, sqlx::Error> {
        Ok(match driver {
            Driver::Sqlite => {
                let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
                Self::Sqlite(options.connect().await?)
            }
            Driver::Postgres => Self::Postgres(PgConnectOptions::from_str(url)?.connect().await?),
            Driver::Mysql => Self::Mysql(MySqlConnectOptions::from_str(url)?.connect().await?),
        })
    }

    pub(crate) async fn close(self) -> Result<(), sqlx::Error> {
        match self {
            Self::Sqlite(conn) => conn.close().await,
            Self::Postgres(conn) => conn.close().await,
            Self::Mysql(conn) => conn.close().await,
        }
    }

    /// Runs a statement and returns the affected row count. Statements
    /// without values use the simple protocol, so transaction control and
    /// DDL work on every backend.
    pub(crate) async fn execute(&mut self, sql: &str, values: Vec<SqlValue>) -> Result<u64, sqlx::Error> {
        if values.is_empty() {
            return Ok(match self {
                Self::Sqlite(conn) => conn.execute(sql).await?.rows_affected(),
                Self::Postgres(conn) => conn.execute(sql).await?.rows_affected(),
                Self::Mysql(conn) => conn.execute(sql).await?.rows_affected(),
            });
        }
        Ok(match self {
            Self::Sqlite(conn) => bind_values!(sqlx::Sqlite, sql, values).execute(conn).await?.rows_affected(),
            Self::Postgres(conn) => bind_values!(sqlx::Postgres, sql, values).execute(conn).await?.rows_affected(),
            Self::Mysql(conn) => bind_values!(sqlx::MySql, sql, values).execute(conn).await?.rows_affected(),
        })
    }

    pub(crate) async fn fetch_all(&mut self, sql: &str, values: Vec<SqlValue>) -> Result<Vec<DataRow>, sqlx::Error> {
        match self {
            Self::Sqlite(conn) => {
                let rows = if values.is_empty() {
                    conn.fetch_all(sql).await?
                } else {
                    bind_values!(sqlx::Sqlite, sql, values).fetch_all(conn).await?
                };
                rows.iter().map(DataRow::from_sqlite_row).collect()
            }
            Self::Postgres(conn) => {
                let rows = if values.is_empty() {
                    conn.fetch_all(sql).await?
                } else {
                    bind_values!(sqlx::Postgres, sql, values).fetch_all(conn).await?
                };
                rows.iter().map(DataRow::from_pg_row).collect()
            }
            Self::Mysql(conn) => {
                let rows = if values.is_empty() {
                    conn.fetch_all(sql).await?
                } else {
                    bind_values!(sqlx::MySql, sql, values).fetch_all(conn).await?
                };
                rows.iter().map(DataRow::from_mysql_row).collect()
            }
        }
    }

    pub(crate) async fn fetch_optional(
        &mut self,
        sql: &str,
        values: Vec<SqlValue>,
    ) -> Result<Option<DataRow>, sqlx::Error> {
        match self {
            Self::Sqlite(conn) => bind_values!(sqlx::Sqlite, sql, values)
                .fetch_optional(conn)
                .await?
                .as_ref()
                .map(DataRow::from_sqlite_row)
                .transpose(),
            Self::Postgres(conn) => bind_values!(sqlx::Postgres, sql, values)
                .fetch_optional(conn)
                .await?
                .as_ref()
                .map(DataRow::from_pg_row)
                .transpose(),
            Self::Mysql(conn) => bind_values!(sqlx::MySql, sql, values)
                .fetch_optional(conn)
                .await?
                .as_ref()
                .map(DataRow::from_mysql_row)
                .transpose(),
        }
    }

    /// Asks the server to prepare `sql`, which checks its syntax.
    pub(crate) async fn prepare(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        match self {
            Self::Sqlite(conn) => conn.prepare(sql).await.map(|_| ()),
            Self::Postgres(conn) => conn.prepare(sql).await.map(|_| ()),
            Self::Mysql(conn) => conn.prepare(sql).await.map(|_| ()),
        }
    }
}
