//! Errors raised while compiling queries.

use thiserror::Error;

/// Errors produced by the query builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A condition cannot be lowered to SQL.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// An argument passed to a builder method is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operator name is not part of the condition grammar.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
}

/// Result type for query compilation.
pub type Result<T> = std::result::Result<T, Error>;
