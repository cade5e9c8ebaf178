//! # quarry-orm
//!
//! Database access on top of `quarry-core`.
//!
//! This crate provides:
//! - [`Connection`]: a lazily opened driver handle for SQLite, PostgreSQL or
//!   MySQL, with nested transactions and schema metadata
//! - [`Command`]: SQL text plus bound params, with optional result caching
//! - [`QueryExt`]: execution methods for [`quarry_core::Query`]
//! - [`ActiveRecord`] and [`ActiveQuery`]: table-backed models with dirty
//!   tracking, optimistic locking and relations
//!
//! ## Quick Start
//!
//! ```no_run
//! use quarry_core::{Condition, Query};
//! use quarry_orm::{Connection, ConnectionConfig, QueryExt};
//!
//! # async fn demo() -> quarry_orm::Result<()> {
//! let db = Connection::new(ConnectionConfig::new("sqlite::memory:"))?;
//! db.command("CREATE TABLE customer (id INTEGER PRIMARY KEY, name TEXT, status INTEGER)")
//!     .execute()
//!     .await?;
//!
//! let mut tx = db.begin_transaction().await?;
//! db.command("INSERT INTO customer (name, status) VALUES (:name, 1)")
//!     .bind_value(":name", "user1")
//!     .execute()
//!     .await?;
//! tx.commit().await?;
//!
//! let active = Query::new()
//!     .from(["customer"])
//!     .where_clause(Condition::eq("status", 1))
//!     .count(&db, "*")
//!     .await?;
//! assert_eq!(active, 1);
//! # Ok(())
//! # }
//! ```

pub mod active_query;
pub mod active_record;
pub mod cache;
pub mod command;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
mod placeholders;
pub mod query_ext;
pub mod record;
pub mod relation;
pub mod row;
pub mod schema;
pub mod transaction;

pub use active_query::ActiveQuery;
pub use active_record::ActiveRecord;
pub use cache::{Cache, CacheDependency, MemoryCache};
pub use command::Command;
pub use config::ConnectionConfig;
pub use connection::Connection;
pub use driver::Driver;
pub use error::{DbError, Result, ValidationError};
pub use query_ext::QueryExt;
pub use record::{Record, RecordState, Related};
pub use relation::{RelationDef, RelationResolver, Via};
pub use row::DataRow;
pub use schema::{ColumnSchema, ColumnType, ForeignKey, TableSchema, ValueKind};
pub use transaction::Transaction;

pub use quarry_core;
