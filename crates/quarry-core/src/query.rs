//! Declarative description of a SELECT statement.
//!
//! [`Query`] accumulates clauses; it does not know any dialect. The
//! [`QueryBuilder`](crate::QueryBuilder) turns it into SQL text and params.

use std::sync::LazyLock;

use regex::Regex;

use crate::condition::Condition;
use crate::value::{Params, ToSqlValue};

static ORDER_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.*?)\s+(asc|desc)$").expect("valid order term pattern"));

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending (the default, emitted without suffix).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// INNER JOIN
    Inner,
    /// LEFT JOIN
    Left,
    /// RIGHT JOIN
    Right,
    /// CROSS JOIN
    Cross,
}

impl JoinType {
    /// SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// A join clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join type.
    pub kind: JoinType,
    /// Joined table, optionally with alias (`"item i"`).
    pub table: String,
    /// ON condition.
    pub on: Option<Condition>,
}

/// An entry of the FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    /// Table name, optionally followed by an alias.
    Table(String),
    /// Aliased sub-query.
    SubQuery {
        /// The nested query.
        query: Box<Query>,
        /// Alias.
        alias: String,
    },
}

/// A UNION operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    /// The united query.
    pub query: Box<Query>,
    /// UNION ALL.
    pub all: bool,
}

/// A SELECT statement under construction.
///
/// # Example
///
/// ```
/// use quarry_core::{Condition, Query};
///
/// let query = Query::new()
///     .select(["id", "name"])
///     .from(["customer"])
///     .where_clause(Condition::eq("status", 1))
///     .and_where(Condition::gt("id", 10))
///     .order_by("name, id DESC")
///     .limit(20);
/// assert_eq!(query.limit_value(), Some(20));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub(crate) select: Vec<String>,
    pub(crate) select_option: Option<String>,
    pub(crate) distinct: bool,
    pub(crate) from: Vec<FromItem>,
    pub(crate) condition: Option<Condition>,
    pub(crate) joins: Vec<Join>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having: Option<Condition>,
    pub(crate) unions: Vec<Union>,
    pub(crate) params: Params,
    pub(crate) order_by: Vec<(String, SortOrder)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) index_by: Option<String>,
}

fn combine(
    current: Option<Condition>,
    next: Condition,
    wrap: fn(Vec<Condition>) -> Condition,
) -> Option<Condition> {
    Some(match current {
        None => next,
        Some(current) => wrap(vec![current, next]),
    })
}

impl Query {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the selected columns.
    #[must_use]
    pub fn select<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Appends selected columns.
    #[must_use]
    pub fn add_select<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.select.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Option emitted right after SELECT (e.g. `SQL_CALC_FOUND_ROWS`).
    #[must_use]
    pub fn select_option(mut self, option: impl Into<String>) -> Self {
        self.select_option = Some(option.into());
        self
    }

    /// SELECT DISTINCT.
    #[must_use]
    pub const fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Replaces the FROM tables.
    #[must_use]
    pub fn from<S: Into<String>>(mut self, tables: impl IntoIterator<Item = S>) -> Self {
        self.from = tables
            .into_iter()
            .map(|t| FromItem::Table(t.into()))
            .collect();
        self
    }

    /// Selects from an aliased sub-query.
    #[must_use]
    pub fn from_query(mut self, query: Self, alias: impl Into<String>) -> Self {
        self.from = vec![FromItem::SubQuery {
            query: Box::new(query),
            alias: alias.into(),
        }];
        self
    }

    /// Replaces the WHERE condition.
    #[must_use]
    pub fn where_clause(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// ANDs a condition onto WHERE; on an empty WHERE this equals
    /// [`where_clause`](Self::where_clause).
    #[must_use]
    pub fn and_where(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = combine(self.condition.take(), condition.into(), Condition::And);
        self
    }

    /// ORs a condition onto WHERE.
    #[must_use]
    pub fn or_where(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = combine(self.condition.take(), condition.into(), Condition::Or);
        self
    }

    /// Appends a join.
    #[must_use]
    pub fn join(mut self, kind: JoinType, table: impl Into<String>, on: Option<Condition>) -> Self {
        self.joins.push(Join {
            kind,
            table: table.into(),
            on,
        });
        self
    }

    /// INNER JOIN.
    #[must_use]
    pub fn inner_join(self, table: impl Into<String>, on: impl Into<Condition>) -> Self {
        self.join(JoinType::Inner, table, Some(on.into()))
    }

    /// LEFT JOIN.
    #[must_use]
    pub fn left_join(self, table: impl Into<String>, on: impl Into<Condition>) -> Self {
        self.join(JoinType::Left, table, Some(on.into()))
    }

    /// RIGHT JOIN.
    #[must_use]
    pub fn right_join(self, table: impl Into<String>, on: impl Into<Condition>) -> Self {
        self.join(JoinType::Right, table, Some(on.into()))
    }

    /// Replaces GROUP BY columns.
    #[must_use]
    pub fn group_by<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Appends GROUP BY columns.
    #[must_use]
    pub fn add_group_by<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Replaces the HAVING condition.
    #[must_use]
    pub fn having(mut self, condition: impl Into<Condition>) -> Self {
        self.having = Some(condition.into());
        self
    }

    /// ANDs a condition onto HAVING.
    #[must_use]
    pub fn and_having(mut self, condition: impl Into<Condition>) -> Self {
        self.having = combine(self.having.take(), condition.into(), Condition::And);
        self
    }

    /// ORs a condition onto HAVING.
    #[must_use]
    pub fn or_having(mut self, condition: impl Into<Condition>) -> Self {
        self.having = combine(self.having.take(), condition.into(), Condition::Or);
        self
    }

    /// Appends a UNION (or UNION ALL) operand.
    #[must_use]
    pub fn union(mut self, query: Self, all: bool) -> Self {
        self.unions.push(Union {
            query: Box::new(query),
            all,
        });
        self
    }

    /// Replaces the bound params.
    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Merges params into the bound params.
    #[must_use]
    pub fn add_params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    /// Binds a single param.
    #[must_use]
    pub fn add_param(mut self, name: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.params.set(name, value);
        self
    }

    /// Replaces ORDER BY with a textual spec such as `"name, id DESC"`.
    #[must_use]
    pub fn order_by(mut self, spec: &str) -> Self {
        self.order_by = parse_order_by(spec);
        self
    }

    /// Appends ORDER BY terms from a textual spec.
    #[must_use]
    pub fn add_order_by(mut self, spec: &str) -> Self {
        self.order_by.extend(parse_order_by(spec));
        self
    }

    /// Appends one ORDER BY term.
    #[must_use]
    pub fn order_by_column(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    /// Removes ORDER BY.
    #[must_use]
    pub fn clear_order_by(mut self) -> Self {
        self.order_by.clear();
        self
    }

    /// LIMIT.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// OFFSET.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Removes LIMIT and OFFSET.
    #[must_use]
    pub const fn clear_limit(mut self) -> Self {
        self.limit = None;
        self.offset = None;
        self
    }

    /// Column whose value keys indexed results.
    #[must_use]
    pub fn index_by(mut self, column: impl Into<String>) -> Self {
        self.index_by = Some(column.into());
        self
    }

    /// Selected columns.
    #[must_use]
    pub fn selected(&self) -> &[String] {
        &self.select
    }

    /// FROM entries.
    #[must_use]
    pub fn from_items(&self) -> &[FromItem] {
        &self.from
    }

    /// WHERE condition.
    #[must_use]
    pub const fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Bound params.
    #[must_use]
    pub const fn bound_params(&self) -> &Params {
        &self.params
    }

    /// ORDER BY terms.
    #[must_use]
    pub fn order_terms(&self) -> &[(String, SortOrder)] {
        &self.order_by
    }

    /// LIMIT value.
    #[must_use]
    pub const fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// OFFSET value.
    #[must_use]
    pub const fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    /// Index-by column.
    #[must_use]
    pub fn index_column(&self) -> Option<&str> {
        self.index_by.as_deref()
    }

    /// True when the result set is grouped or combined, so aggregates must
    /// wrap the query as a sub-select.
    #[must_use]
    pub fn is_compound(&self) -> bool {
        self.distinct || !self.group_by.is_empty() || self.having.is_some() || !self.unions.is_empty()
    }
}

/// Splits `"a, b DESC"` into ordered terms.
#[must_use]
pub fn parse_order_by(spec: &str) -> Vec<(String, SortOrder)> {
    spec.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| match ORDER_TERM.captures(term) {
            Some(caps) => {
                let order = if caps[2].eq_ignore_ascii_case("desc") {
                    SortOrder::Desc
                } else {
                    SortOrder::Asc
                };
                (caps[1].to_string(), order)
            }
            None => (term.to_string(), SortOrder::Asc),
        })
        .collect()
}
