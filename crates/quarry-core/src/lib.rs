//! # quarry-core
//!
//! Dialect-aware SQL compilation for the quarry data layer.
//!
//! This crate provides:
//! - [`SqlValue`], [`Params`] and [`Expression`]: values and raw fragments
//! - [`Dialect`] implementations for SQLite, PostgreSQL and MySQL
//! - [`Condition`]: the WHERE/HAVING operator grammar
//! - [`Query`]: a declarative SELECT description
//! - [`QueryBuilder`]: lowering of queries, DML and DDL into SQL text plus
//!   named parameters
//!
//! Nothing here performs I/O; `quarry-orm` executes what this crate builds.
//!
//! ## Building a query
//!
//! ```rust
//! use quarry_core::{Condition, PgsqlDialect, Query, QueryBuilder, SqlValue};
//!
//! let user_input = "'; DROP TABLE users; --";
//! let query = Query::new()
//!     .select(["id"])
//!     .from(["users"])
//!     .where_clause(Condition::eq("name", user_input));
//! let (sql, params) = QueryBuilder::new(&PgsqlDialect).build(&query).unwrap();
//!
//! assert_eq!(sql, "SELECT \"id\" FROM \"users\" WHERE \"name\"=:qp0");
//! assert_eq!(params.get(":qp0"), Some(&SqlValue::Text(user_input.to_string())));
//! ```

pub mod builder;
pub mod condition;
pub mod dialect;
pub mod error;
pub mod query;
pub mod value;

pub use builder::QueryBuilder;
pub use condition::{CompareOp, Condition, HashValue, InValues};
pub use dialect::{dialect_for_dsn, Dialect, MysqlDialect, PgsqlDialect, SqliteDialect};
pub use error::{Error, Result};
pub use query::{parse_order_by, FromItem, Join, JoinType, Query, SortOrder, Union};
pub use value::{ColumnValue, Expression, Params, SqlValue, ToSqlValue, COUNTER_PARAM_PREFIX, PARAM_PREFIX};
