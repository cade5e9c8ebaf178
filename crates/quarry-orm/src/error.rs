//! Error types for connections, commands and records.

use std::fmt;

use thiserror::Error;

/// A validation failure on one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Attribute name.
    pub attribute: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error.
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.attribute, self.message)
    }
}

/// Errors raised by the data layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The driver rejected a statement or the connection failed.
    #[error("{message}")]
    Database {
        /// Driver message.
        message: String,
        /// Statement with params inlined, empty for connection failures.
        sql: String,
        /// SQLSTATE or vendor code, when the driver reports one.
        code: Option<String>,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// An optimistic-lock update or delete affected no rows.
    #[error("stale object: {0}")]
    StaleObject(String),

    /// A call that is invalid in the current state.
    #[error("invalid call: {0}")]
    InvalidCall(String),

    /// Commit or rollback on an inactive transaction.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// No row matched when one was required.
    #[error("object not found")]
    NotFound,

    /// Record validation failed.
    #[error("validation failed: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation(Vec<ValidationError>),

    /// Query compilation failed.
    #[error("query build error: {0}")]
    Build(#[from] quarry_core::Error),

    /// A cached value could not be (de)serialized.
    #[error("cache serialization error: {0}")]
    Cache(#[from] serde_json::Error),
}

impl DbError {
    /// Wraps a driver error raised while running `sql`.
    pub(crate) fn driver(source: sqlx::Error, sql: impl Into<String>) -> Self {
        let code = source
            .as_database_error()
            .and_then(|e| e.code())
            .map(|c| c.into_owned());
        let sql = sql.into();
        let message = if sql.is_empty() {
            source.to_string()
        } else {
            format!("{source}\nThe SQL being executed was: {sql}")
        };
        Self::Database {
            message,
            sql,
            code,
            source,
        }
    }

    /// SQLSTATE or vendor code of a database error.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// True for optimistic-lock conflicts.
    #[must_use]
    pub const fn is_stale_object(&self) -> bool {
        matches!(self, Self::StaleObject(_))
    }
}

/// Result type alias for data-layer operations.
pub type Result<T> = std::result::Result<T, DbError>;
