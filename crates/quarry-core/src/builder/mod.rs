//! Compilation of [`Query`] descriptions and DML/DDL requests into SQL.
//!
//! The builder owns no state beyond the dialect. Every method returns the SQL
//! text together with the params it references; generated placeholders are
//! named `:qp{n}` where `n` is the number of params already bound.

mod condition;
mod ddl;
mod dml;

use std::sync::LazyLock;

use regex::Regex;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::query::{FromItem, Query, SortOrder};
use crate::value::Params;

static COLUMN_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)(?i:\s+as\s+|\s+)([\w\-_\.]+)$").expect("valid column alias pattern")
});

static TABLE_ALIAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)(?i:\s+as|)\s+([^ ]+)$").expect("valid table alias pattern"));

/// Turns queries and DML/DDL requests into dialect-specific SQL.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> QueryBuilder<'d> {
    /// Creates a builder for `dialect`.
    #[must_use]
    pub const fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    /// The dialect this builder emits.
    #[must_use]
    pub const fn dialect(&self) -> &'d dyn Dialect {
        self.dialect
    }

    /// Builds a SELECT statement and the params it references.
    pub fn build(&self, query: &Query) -> Result<(String, Params)> {
        let mut params = Params::new();
        let sql = self.build_query(query, &mut params)?;
        Ok((sql, params))
    }

    /// Builds `query` into `params`, merging the query's own params first.
    pub(crate) fn build_query(&self, query: &Query, params: &mut Params) -> Result<String> {
        params.extend(query.params.clone());

        let clauses = [
            self.build_select(query),
            self.build_from(&query.from, params)?,
            self.build_joins(query, params)?,
            self.build_where(query.condition.as_ref(), params)?,
            self.build_group_by(&query.group_by),
            self.build_having(query, params)?,
            self.build_order_by(&query.order_by),
            self.dialect.build_limit(query.limit, query.offset),
        ];
        let sql = clauses
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if query.unions.is_empty() {
            return Ok(sql);
        }
        let parenthesized = self.dialect.parenthesized_unions();
        let mut unions = Vec::with_capacity(query.unions.len());
        for union in &query.unions {
            let sub = self.build_query(&union.query, params)?;
            let keyword = if union.all { "UNION ALL" } else { "UNION" };
            unions.push(if parenthesized {
                format!("{keyword} ( {sub} )")
            } else {
                format!("{keyword} {sub}")
            });
        }
        let unions = unions.join(" ");
        Ok(if parenthesized {
            format!("({sql}) {unions}")
        } else {
            format!("{sql} {unions}")
        })
    }

    fn build_select(&self, query: &Query) -> String {
        let mut select = String::from(if query.distinct {
            "SELECT DISTINCT"
        } else {
            "SELECT"
        });
        if let Some(option) = &query.select_option {
            select.push(' ');
            select.push_str(option);
        }
        if query.select.is_empty() {
            return format!("{select} *");
        }
        let columns: Vec<String> = query
            .select
            .iter()
            .map(|column| self.quote_selected_column(column))
            .collect();
        format!("{select} {}", columns.join(", "))
    }

    fn quote_selected_column(&self, column: &str) -> String {
        if column.contains('(') {
            return column.to_string();
        }
        match COLUMN_ALIAS.captures(column) {
            Some(caps) => format!(
                "{} AS {}",
                self.dialect.quote_column_name(&caps[1]),
                self.dialect.quote_column_name(&caps[2])
            ),
            None => self.dialect.quote_column_name(column),
        }
    }

    /// Quotes a table reference, keeping an optional alias.
    pub(crate) fn quote_table_reference(&self, table: &str) -> String {
        if table.contains('(') {
            return table.to_string();
        }
        match TABLE_ALIAS.captures(table.trim()) {
            Some(caps) => format!(
                "{} {}",
                self.dialect.quote_table_name(&caps[1]),
                self.dialect.quote_table_name(&caps[2])
            ),
            None => self.dialect.quote_table_name(table.trim()),
        }
    }

    fn build_from(&self, from: &[FromItem], params: &mut Params) -> Result<String> {
        if from.is_empty() {
            return Ok(String::new());
        }
        let mut tables = Vec::with_capacity(from.len());
        for item in from {
            tables.push(match item {
                FromItem::Table(name) => self.quote_table_reference(name),
                FromItem::SubQuery { query, alias } => format!(
                    "({}) {}",
                    self.build_query(query, params)?,
                    self.dialect.quote_table_name(alias)
                ),
            });
        }
        Ok(format!("FROM {}", tables.join(", ")))
    }

    fn build_joins(&self, query: &Query, params: &mut Params) -> Result<String> {
        let mut joins = Vec::with_capacity(query.joins.len());
        for join in &query.joins {
            let mut sql = format!(
                "{} {}",
                join.kind.as_sql(),
                self.quote_table_reference(&join.table)
            );
            if let Some(on) = &join.on {
                let on = self.build_condition(on, params)?;
                if !on.is_empty() {
                    sql.push_str(" ON ");
                    sql.push_str(&on);
                }
            }
            joins.push(sql);
        }
        Ok(joins.join(" "))
    }

    /// Builds `WHERE ...`, or an empty string when the condition is empty.
    pub(crate) fn build_where(
        &self,
        condition: Option<&crate::Condition>,
        params: &mut Params,
    ) -> Result<String> {
        let Some(condition) = condition else {
            return Ok(String::new());
        };
        let sql = self.build_condition(condition, params)?;
        Ok(if sql.is_empty() {
            sql
        } else {
            format!("WHERE {sql}")
        })
    }

    fn build_group_by(&self, columns: &[String]) -> String {
        if columns.is_empty() {
            return String::new();
        }
        format!("GROUP BY {}", self.quote_column_list(columns))
    }

    fn build_having(&self, query: &Query, params: &mut Params) -> Result<String> {
        let Some(having) = &query.having else {
            return Ok(String::new());
        };
        let sql = self.build_condition(having, params)?;
        Ok(if sql.is_empty() {
            sql
        } else {
            format!("HAVING {sql}")
        })
    }

    fn build_order_by(&self, terms: &[(String, SortOrder)]) -> String {
        if terms.is_empty() {
            return String::new();
        }
        let terms: Vec<String> = terms
            .iter()
            .map(|(column, order)| {
                let column = self.dialect.quote_column_name(column);
                match order {
                    SortOrder::Asc => column,
                    SortOrder::Desc => format!("{column} DESC"),
                }
            })
            .collect();
        format!("ORDER BY {}", terms.join(", "))
    }

    pub(crate) fn quote_column_list<S: AsRef<str>>(&self, columns: &[S]) -> String {
        columns
            .iter()
            .map(|c| self.dialect.quote_column_name(c.as_ref()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
