//! Condition trees for WHERE and HAVING clauses.
//!
//! A [`Condition`] is a closed grammar of operators. Leaves reference
//! columns and values; values are never spliced into SQL text but bound as
//! parameters when the tree is compiled by the
//! [`QueryBuilder`](crate::QueryBuilder).
//!
//! ```
//! use quarry_core::{Condition, HashValue};
//!
//! let cond = Condition::and([
//!     Condition::hash([("status", HashValue::from(1)), ("type", HashValue::from("a"))]),
//!     Condition::or([Condition::gt("age", 18), Condition::is_null("age")]),
//! ]);
//! assert!(!cond.is_empty());
//! ```

use std::fmt;

use crate::error::{Error, Result};
use crate::query::Query;
use crate::value::{Expression, SqlValue, ToSqlValue};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
}

impl CompareOp {
    /// Parses an operator symbol.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "=" => Some(Self::Eq),
            "<>" | "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
        }
    }
}

/// Right-hand side of a hash condition entry.
#[derive(Debug, Clone, PartialEq)]
pub enum HashValue {
    /// `column = value`, or `column IS NULL` for null.
    Value(SqlValue),
    /// `column IN (...)`.
    List(Vec<SqlValue>),
    /// `column IN (sub-query)`.
    Query(Box<Query>),
    /// `column = expression`.
    Expression(Expression),
}

impl HashValue {
    /// Creates a list value.
    pub fn list<V: ToSqlValue>(values: impl IntoIterator<Item = V>) -> Self {
        Self::List(values.into_iter().map(ToSqlValue::to_sql_value).collect())
    }
}

impl<T: ToSqlValue> From<T> for HashValue {
    fn from(value: T) -> Self {
        Self::Value(value.to_sql_value())
    }
}

impl From<Expression> for HashValue {
    fn from(expr: Expression) -> Self {
        Self::Expression(expr)
    }
}

impl From<Query> for HashValue {
    fn from(query: Query) -> Self {
        Self::Query(Box::new(query))
    }
}

/// Operands of an IN condition.
#[derive(Debug, Clone, PartialEq)]
pub enum InValues {
    /// Scalar values for a single column.
    List(Vec<SqlValue>),
    /// One tuple per row for multi-column IN.
    Tuples(Vec<Vec<SqlValue>>),
    /// A sub-query.
    Query(Box<Query>),
}

/// A node of the condition grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Raw SQL with its own params.
    Raw(Expression),
    /// Column/value pairs joined by AND.
    Hash(Vec<(String, HashValue)>),
    /// All operands must hold.
    And(Vec<Condition>),
    /// At least one operand must hold.
    Or(Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
    /// Binary comparison.
    Compare {
        /// Column name.
        column: String,
        /// Operator.
        op: CompareOp,
        /// Compared value.
        value: SqlValue,
    },
    /// `column [NOT] BETWEEN low AND high`.
    Between {
        /// Column name.
        column: String,
        /// Lower bound.
        low: SqlValue,
        /// Upper bound.
        high: SqlValue,
        /// Emit NOT BETWEEN.
        negate: bool,
    },
    /// `columns [NOT] IN values`.
    In {
        /// One or more columns.
        columns: Vec<String>,
        /// Candidate values.
        values: InValues,
        /// Emit NOT IN.
        negate: bool,
    },
    /// LIKE family.
    Like {
        /// Column name.
        column: String,
        /// Patterns.
        values: Vec<String>,
        /// Emit NOT LIKE.
        negate: bool,
        /// Join several patterns with OR instead of AND.
        any: bool,
        /// Use the dialect's case-insensitive operator.
        case_insensitive: bool,
        /// Escape wildcards and wrap each pattern in `%`.
        escape: bool,
    },
    /// `[NOT] EXISTS (sub-query)`.
    Exists {
        /// Sub-query.
        query: Box<Query>,
        /// Emit NOT EXISTS.
        negate: bool,
    },
}

impl Condition {
    /// Raw SQL without params.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(Expression::new(sql))
    }

    /// Raw SQL referencing `params`.
    pub fn raw_with<K: Into<String>, V: ToSqlValue>(
        sql: impl Into<String>,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self::Raw(Expression::with_params(sql, params.into_iter().collect()))
    }

    /// Hash condition from column/value pairs.
    pub fn hash<K: Into<String>, V: Into<HashValue>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::Hash(
            pairs
                .into_iter()
                .map(|(column, value)| (column.into(), value.into()))
                .collect(),
        )
    }

    /// Single-column hash condition (`column = value`).
    pub fn eq(column: impl Into<String>, value: impl Into<HashValue>) -> Self {
        Self::Hash(vec![(column.into(), value.into())])
    }

    /// `column IS NULL`.
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::eq(column, SqlValue::Null)
    }

    /// AND of all operands.
    pub fn and(operands: impl IntoIterator<Item = Self>) -> Self {
        Self::And(operands.into_iter().collect())
    }

    /// OR of all operands.
    pub fn or(operands: impl IntoIterator<Item = Self>) -> Self {
        Self::Or(operands.into_iter().collect())
    }

    /// Negation.
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(operand: Self) -> Self {
        Self::Not(Box::new(operand))
    }

    /// Binary comparison.
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl ToSqlValue) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.to_sql_value(),
        }
    }

    /// `column <> value`.
    pub fn ne(column: impl Into<String>, value: impl ToSqlValue) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    /// `column > value`.
    pub fn gt(column: impl Into<String>, value: impl ToSqlValue) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    /// `column >= value`.
    pub fn gte(column: impl Into<String>, value: impl ToSqlValue) -> Self {
        Self::compare(column, CompareOp::Gte, value)
    }

    /// `column < value`.
    pub fn lt(column: impl Into<String>, value: impl ToSqlValue) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    /// `column <= value`.
    pub fn lte(column: impl Into<String>, value: impl ToSqlValue) -> Self {
        Self::compare(column, CompareOp::Lte, value)
    }

    /// `column BETWEEN low AND high`.
    pub fn between(column: impl Into<String>, low: impl ToSqlValue, high: impl ToSqlValue) -> Self {
        Self::Between {
            column: column.into(),
            low: low.to_sql_value(),
            high: high.to_sql_value(),
            negate: false,
        }
    }

    /// `column NOT BETWEEN low AND high`.
    pub fn not_between(column: impl Into<String>, low: impl ToSqlValue, high: impl ToSqlValue) -> Self {
        Self::Between {
            column: column.into(),
            low: low.to_sql_value(),
            high: high.to_sql_value(),
            negate: true,
        }
    }

    /// `column IN (values)`.
    pub fn in_list<V: ToSqlValue>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            columns: vec![column.into()],
            values: InValues::List(values.into_iter().map(ToSqlValue::to_sql_value).collect()),
            negate: false,
        }
    }

    /// `column NOT IN (values)`.
    pub fn not_in_list<V: ToSqlValue>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            columns: vec![column.into()],
            values: InValues::List(values.into_iter().map(ToSqlValue::to_sql_value).collect()),
            negate: true,
        }
    }

    /// `(a, b) IN ((..), (..))`.
    pub fn in_tuples<C: Into<String>>(
        columns: impl IntoIterator<Item = C>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        Self::In {
            columns: columns.into_iter().map(Into::into).collect(),
            values: InValues::Tuples(rows),
            negate: false,
        }
    }

    /// `column IN (sub-query)`.
    pub fn in_query(column: impl Into<String>, query: Query) -> Self {
        Self::In {
            columns: vec![column.into()],
            values: InValues::Query(Box::new(query)),
            negate: false,
        }
    }

    /// `column NOT IN (sub-query)`.
    pub fn not_in_query(column: impl Into<String>, query: Query) -> Self {
        Self::In {
            columns: vec![column.into()],
            values: InValues::Query(Box::new(query)),
            negate: true,
        }
    }

    fn like_family(
        column: impl Into<String>,
        values: Vec<String>,
        negate: bool,
        any: bool,
        case_insensitive: bool,
    ) -> Self {
        Self::Like {
            column: column.into(),
            values,
            negate,
            any,
            case_insensitive,
            escape: true,
        }
    }

    /// `column LIKE %value%`.
    pub fn like(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::like_family(column, vec![value.into()], false, false, false)
    }

    /// Every pattern must match.
    pub fn like_all<S: Into<String>>(column: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::like_family(column, collect_strings(values), false, false, false)
    }

    /// Any pattern may match.
    pub fn or_like<S: Into<String>>(column: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::like_family(column, collect_strings(values), false, true, false)
    }

    /// `column NOT LIKE %value%`.
    pub fn not_like(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::like_family(column, vec![value.into()], true, false, false)
    }

    /// Any NOT LIKE pattern may hold.
    pub fn or_not_like<S: Into<String>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::like_family(column, collect_strings(values), true, true, false)
    }

    /// Case-insensitive LIKE.
    pub fn ilike(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::like_family(column, vec![value.into()], false, false, true)
    }

    /// Case-insensitive LIKE where any pattern may match.
    pub fn or_ilike<S: Into<String>>(column: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::like_family(column, collect_strings(values), false, true, true)
    }

    /// Case-insensitive NOT LIKE.
    pub fn not_ilike(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::like_family(column, vec![value.into()], true, false, true)
    }

    /// Case-insensitive NOT LIKE where any pattern may hold.
    pub fn or_not_ilike<S: Into<String>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::like_family(column, collect_strings(values), true, true, true)
    }

    /// Turns off wildcard escaping on a LIKE condition. Other conditions are
    /// returned unchanged.
    #[must_use]
    pub fn without_escaping(self) -> Self {
        match self {
            Self::Like {
                column,
                values,
                negate,
                any,
                case_insensitive,
                ..
            } => Self::Like {
                column,
                values,
                negate,
                any,
                case_insensitive,
                escape: false,
            },
            other => other,
        }
    }

    /// `EXISTS (sub-query)`.
    #[must_use]
    pub fn exists(query: Query) -> Self {
        Self::Exists {
            query: Box::new(query),
            negate: false,
        }
    }

    /// `NOT EXISTS (sub-query)`.
    #[must_use]
    pub fn not_exists(query: Query) -> Self {
        Self::Exists {
            query: Box::new(query),
            negate: true,
        }
    }

    /// Builds a condition from a textual operator name and its operands,
    /// mirroring the `[operator, column, operand...]` form.
    ///
    /// Accepted names: `in`, `not in`, `like`, `or like`, `not like`,
    /// `or not like`, their `ilike` counterparts, `between`, `not between`
    /// and the comparison symbols.
    pub fn operator(name: &str, column: impl Into<String>, operands: Vec<SqlValue>) -> Result<Self> {
        let column = column.into();
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase();
        let like = |negate: bool, any: bool, ci: bool| -> Result<Self> {
            let values = operands
                .iter()
                .map(|v| match v {
                    SqlValue::Text(s) => Ok(s.clone()),
                    SqlValue::Null | SqlValue::Blob(_) => Err(Error::InvalidArgument(format!(
                        "operator '{name}' requires text operands"
                    ))),
                    other => Ok(other.to_string()),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Self::like_family(column.clone(), values, negate, any, ci))
        };
        match normalized.as_str() {
            "in" | "not in" => Ok(Self::In {
                columns: vec![column.clone()],
                values: InValues::List(operands.clone()),
                negate: normalized == "not in",
            }),
            "like" => like(false, false, false),
            "or like" => like(false, true, false),
            "not like" => like(true, false, false),
            "or not like" => like(true, true, false),
            "ilike" => like(false, false, true),
            "or ilike" => like(false, true, true),
            "not ilike" => like(true, false, true),
            "or not ilike" => like(true, true, true),
            "between" | "not between" => match operands.as_slice() {
                [low, high] => Ok(Self::Between {
                    column: column.clone(),
                    low: low.clone(),
                    high: high.clone(),
                    negate: normalized == "not between",
                }),
                _ => Err(Error::InvalidArgument(format!(
                    "operator '{name}' requires two operands"
                ))),
            },
            symbol => match (CompareOp::from_symbol(symbol), operands.as_slice()) {
                (Some(op), [value]) => Ok(Self::Compare {
                    column: column.clone(),
                    op,
                    value: value.clone(),
                }),
                (Some(_), _) => Err(Error::InvalidArgument(format!(
                    "operator '{name}' requires one operand"
                ))),
                (None, _) => Err(Error::UnknownOperator(name.to_string())),
            },
        }
    }

    /// True when the condition compiles to nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Raw(expr) => expr.sql().trim().is_empty(),
            Self::Hash(pairs) => pairs.is_empty(),
            Self::And(operands) | Self::Or(operands) => operands.iter().all(Self::is_empty),
            Self::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }
}

fn collect_strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Vec<String> {
    values.into_iter().map(Into::into).collect()
}

impl From<&str> for Condition {
    fn from(sql: &str) -> Self {
        Self::raw(sql)
    }
}

impl From<String> for Condition {
    fn from(sql: String) -> Self {
        Self::raw(sql)
    }
}

impl From<Expression> for Condition {
    fn from(expr: Expression) -> Self {
        Self::Raw(expr)
    }
}
