//! INSERT, UPDATE and DELETE statements.

use super::QueryBuilder;
use crate::condition::Condition;
use crate::error::{Error, Result};
use crate::value::{ColumnValue, Expression, Params, SqlValue, COUNTER_PARAM_PREFIX, PARAM_PREFIX};

impl QueryBuilder<'_> {
    fn column_placeholder(&self, value: &ColumnValue, params: &mut Params) -> String {
        match value {
            ColumnValue::Value(value) => params.bind(PARAM_PREFIX, value.clone()),
            ColumnValue::Expression(expr) => {
                params.extend(expr.params().clone());
                expr.sql().to_string()
            }
        }
    }

    /// `INSERT INTO table (cols) VALUES (...)`.
    ///
    /// No columns yields the dialect's default-values form.
    pub fn insert(&self, table: &str, columns: &[(String, ColumnValue)]) -> Result<(String, Params)> {
        let mut params = Params::new();
        let table = self.dialect.quote_table_name(table);
        if columns.is_empty() {
            return Ok((
                format!("INSERT INTO {table} {}", self.dialect.insert_default_values()),
                params,
            ));
        }
        let mut names = Vec::with_capacity(columns.len());
        let mut placeholders = Vec::with_capacity(columns.len());
        for (name, value) in columns {
            names.push(self.dialect.quote_column_name(name));
            placeholders.push(self.column_placeholder(value, &mut params));
        }
        Ok((
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                names.join(", "),
                placeholders.join(", ")
            ),
            params,
        ))
    }

    /// Multi-row insert with bound values. Every row must have one value per
    /// column.
    pub fn batch_insert<S: AsRef<str>>(
        &self,
        table: &str,
        columns: &[S],
        rows: &[Vec<SqlValue>],
    ) -> Result<(String, Params)> {
        if columns.is_empty() {
            return Err(Error::InvalidArgument(String::from(
                "batch insert requires at least one column",
            )));
        }
        if rows.is_empty() {
            return Err(Error::InvalidArgument(String::from(
                "batch insert requires at least one row",
            )));
        }
        let mut params = Params::new();
        let mut tuples = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::InvalidArgument(format!(
                    "row {index} has {} values for {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            let placeholders: Vec<String> = row
                .iter()
                .map(|value| params.bind(PARAM_PREFIX, value.clone()))
                .collect();
            tuples.push(format!("({})", placeholders.join(", ")));
        }
        Ok((
            format!(
                "INSERT INTO {} ({}) VALUES {}",
                self.dialect.quote_table_name(table),
                self.quote_column_list(columns),
                tuples.join(", ")
            ),
            params,
        ))
    }

    /// `UPDATE table SET ... [WHERE ...]`.
    pub fn update(
        &self,
        table: &str,
        columns: &[(String, ColumnValue)],
        condition: Option<&Condition>,
    ) -> Result<(String, Params)> {
        if columns.is_empty() {
            return Err(Error::InvalidArgument(String::from(
                "update requires at least one column",
            )));
        }
        let mut params = Params::new();
        let lines: Vec<String> = columns
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    self.dialect.quote_column_name(name),
                    self.column_placeholder(value, &mut params)
                )
            })
            .collect();
        let mut sql = format!(
            "UPDATE {} SET {}",
            self.dialect.quote_table_name(table),
            lines.join(", ")
        );
        let where_clause = self.build_where(condition, &mut params)?;
        if !where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&where_clause);
        }
        Ok((sql, params))
    }

    /// Increments each counter column by its delta: `"c"="c"+:bp0`.
    pub fn update_counters(
        &self,
        table: &str,
        counters: &[(String, i64)],
        condition: Option<&Condition>,
    ) -> Result<(String, Params)> {
        let columns: Vec<(String, ColumnValue)> = counters
            .iter()
            .enumerate()
            .map(|(n, (name, delta))| {
                let placeholder = format!("{COUNTER_PARAM_PREFIX}{n}");
                let sql = format!("{}+{placeholder}", self.dialect.quote_column_name(name));
                let params = [(placeholder, *delta)].into_iter().collect();
                (name.clone(), ColumnValue::Expression(Expression::with_params(sql, params)))
            })
            .collect();
        self.update(table, &columns, condition)
    }

    /// `DELETE FROM table [WHERE ...]`.
    pub fn delete(&self, table: &str, condition: Option<&Condition>) -> Result<(String, Params)> {
        let mut params = Params::new();
        let mut sql = format!("DELETE FROM {}", self.dialect.quote_table_name(table));
        let where_clause = self.build_where(condition, &mut params)?;
        if !where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&where_clause);
        }
        Ok((sql, params))
    }
}
