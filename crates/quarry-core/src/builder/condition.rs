//! Lowering of [`Condition`] trees.

use super::QueryBuilder;
use crate::condition::{CompareOp, Condition, HashValue, InValues};
use crate::error::{Error, Result};
use crate::query::Query;
use crate::value::{Expression, Params, SqlValue, PARAM_PREFIX};

impl QueryBuilder<'_> {
    /// Compiles a condition, binding its values into `params`.
    ///
    /// Returns an empty string for conditions that reduce to nothing.
    pub fn build_condition(&self, condition: &Condition, params: &mut Params) -> Result<String> {
        match condition {
            // Blank SQL reduces to nothing, like an empty junction.
            Condition::Raw(expr) if expr.sql().trim().is_empty() => Ok(String::new()),
            Condition::Raw(expr) => Ok(self.embed_expression(expr, params)),
            Condition::Hash(pairs) => self.build_hash_condition(pairs, params),
            Condition::And(operands) => self.build_junction("AND", operands, params),
            Condition::Or(operands) => self.build_junction("OR", operands, params),
            Condition::Not(inner) => {
                let inner = self.build_condition(inner, params)?;
                Ok(if inner.is_empty() {
                    inner
                } else {
                    format!("NOT ({inner})")
                })
            }
            Condition::Compare { column, op, value } => {
                Ok(self.build_compare(column, *op, value, params))
            }
            Condition::Between {
                column,
                low,
                high,
                negate,
            } => {
                let low = params.bind(PARAM_PREFIX, low.clone());
                let high = params.bind(PARAM_PREFIX, high.clone());
                let keyword = if *negate { "NOT BETWEEN" } else { "BETWEEN" };
                Ok(format!(
                    "{} {keyword} {low} AND {high}",
                    self.dialect.quote_column_name(column)
                ))
            }
            Condition::In {
                columns,
                values,
                negate,
            } => self.build_in_condition(columns, values, *negate, params),
            Condition::Like {
                column,
                values,
                negate,
                any,
                case_insensitive,
                escape,
            } => Ok(self.build_like_condition(
                column,
                values,
                *negate,
                *any,
                *case_insensitive,
                *escape,
                params,
            )),
            Condition::Exists { query, negate } => {
                let sub = self.build_query(query, params)?;
                let keyword = if *negate { "NOT EXISTS" } else { "EXISTS" };
                Ok(format!("{keyword} ({sub})"))
            }
        }
    }

    fn embed_expression(&self, expr: &Expression, params: &mut Params) -> String {
        params.extend(expr.params().clone());
        expr.sql().to_string()
    }

    fn build_hash_condition(&self, pairs: &[(String, HashValue)], params: &mut Params) -> Result<String> {
        let mut parts = Vec::with_capacity(pairs.len());
        for (column, value) in pairs {
            let part = match value {
                HashValue::List(values) => self.build_in_condition(
                    std::slice::from_ref(column),
                    &InValues::List(values.clone()),
                    false,
                    params,
                )?,
                HashValue::Query(query) => {
                    self.build_in_subquery(std::slice::from_ref(column), query, false, params)?
                }
                HashValue::Expression(expr) => format!(
                    "{}={}",
                    self.dialect.quote_column_name(column),
                    self.embed_expression(expr, params)
                ),
                HashValue::Value(SqlValue::Null) => {
                    format!("{} IS NULL", self.dialect.quote_column_name(column))
                }
                HashValue::Value(value) => {
                    let placeholder = params.bind(PARAM_PREFIX, value.clone());
                    format!("{}={placeholder}", self.dialect.quote_column_name(column))
                }
            };
            parts.push(part);
        }
        Ok(wrap_parts(parts, "AND"))
    }

    fn build_junction(&self, glue: &str, operands: &[Condition], params: &mut Params) -> Result<String> {
        let mut parts = Vec::with_capacity(operands.len());
        for operand in operands {
            let sql = self.build_condition(operand, params)?;
            if !sql.is_empty() {
                parts.push(sql);
            }
        }
        Ok(if parts.is_empty() {
            String::new()
        } else {
            format!("({})", parts.join(&format!(") {glue} (")))
        })
    }

    fn build_compare(&self, column: &str, op: CompareOp, value: &SqlValue, params: &mut Params) -> String {
        let column = self.dialect.quote_column_name(column);
        match (op, value) {
            (CompareOp::Eq, SqlValue::Null) => format!("{column} IS NULL"),
            (CompareOp::Ne, SqlValue::Null) => format!("{column} IS NOT NULL"),
            _ => {
                let placeholder = params.bind(PARAM_PREFIX, value.clone());
                format!("{column} {op} {placeholder}")
            }
        }
    }

    fn build_in_condition(
        &self,
        columns: &[String],
        values: &InValues,
        negate: bool,
        params: &mut Params,
    ) -> Result<String> {
        let empty = || {
            if negate {
                String::new()
            } else {
                String::from("0=1")
            }
        };
        if columns.is_empty() {
            return Err(Error::InvalidCondition(String::from(
                "IN requires at least one column",
            )));
        }
        match values {
            InValues::Query(query) => self.build_in_subquery(columns, query, negate, params),
            InValues::List(list) => {
                if list.is_empty() {
                    return Ok(empty());
                }
                if columns.len() > 1 {
                    return Err(Error::InvalidCondition(String::from(
                        "multi-column IN requires tuple values",
                    )));
                }
                let column = self.dialect.quote_column_name(&columns[0]);
                if let [single] = list.as_slice() {
                    return Ok(match single {
                        SqlValue::Null if negate => format!("{column} IS NOT NULL"),
                        SqlValue::Null => format!("{column} IS NULL"),
                        value => {
                            let placeholder = params.bind(PARAM_PREFIX, value.clone());
                            let op = if negate { "<>" } else { "=" };
                            format!("{column}{op}{placeholder}")
                        }
                    });
                }
                let placeholders = self.bind_list(list, params);
                let keyword = if negate { "NOT IN" } else { "IN" };
                Ok(format!("{column} {keyword} ({placeholders})"))
            }
            InValues::Tuples(rows) => {
                if rows.is_empty() {
                    return Ok(empty());
                }
                let mut tuples = Vec::with_capacity(rows.len());
                for row in rows {
                    if row.len() != columns.len() {
                        return Err(Error::InvalidCondition(format!(
                            "IN tuple has {} values for {} columns",
                            row.len(),
                            columns.len()
                        )));
                    }
                    tuples.push(format!("({})", self.bind_list(row, params)));
                }
                let keyword = if negate { "NOT IN" } else { "IN" };
                Ok(format!(
                    "({}) {keyword} ({})",
                    self.quote_column_list(columns),
                    tuples.join(", ")
                ))
            }
        }
    }

    fn build_in_subquery(
        &self,
        columns: &[String],
        query: &Query,
        negate: bool,
        params: &mut Params,
    ) -> Result<String> {
        let sub = self.build_query(query, params)?;
        let keyword = if negate { "NOT IN" } else { "IN" };
        let columns = if columns.len() == 1 {
            self.dialect.quote_column_name(&columns[0])
        } else {
            format!("({})", self.quote_column_list(columns))
        };
        Ok(format!("{columns} {keyword} ({sub})"))
    }

    fn bind_list(&self, values: &[SqlValue], params: &mut Params) -> String {
        values
            .iter()
            .map(|value| match value {
                SqlValue::Null => String::from("NULL"),
                value => params.bind(PARAM_PREFIX, value.clone()),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
    fn build_like_condition(
        &self,
        column: &str,
        values: &[String],
        negate: bool,
        any: bool,
        case_insensitive: bool,
        escape: bool,
        params: &mut Params,
    ) -> String {
        if values.is_empty() {
            return if negate {
                String::new()
            } else {
                String::from("0=1")
            };
        }
        let column = self.dialect.quote_column_name(column);
        let operator = format!(
            "{}{}",
            if negate { "NOT " } else { "" },
            self.dialect.like_operator(case_insensitive)
        );
        let suffix = if escape {
            self.dialect.like_escape_clause()
        } else {
            ""
        };
        let parts: Vec<String> = values
            .iter()
            .map(|value| {
                let pattern = if escape {
                    format!("%{}%", self.dialect.escape_like_value(value))
                } else {
                    value.clone()
                };
                let placeholder = params.bind(PARAM_PREFIX, SqlValue::Text(pattern));
                format!("{column} {operator} {placeholder}{suffix}")
            })
            .collect();
        parts.join(if any { " OR " } else { " AND " })
    }
}

fn wrap_parts(mut parts: Vec<String>, glue: &str) -> String {
    match parts.len() {
        0 => String::new(),
        1 => parts.remove(0),
        _ => format!("({})", parts.join(&format!(") {glue} ("))),
    }
}
