//! PostgreSQL dialect.

use super::Dialect;
use crate::value::SqlValue;

const COLUMN_TYPES: &[(&str, &str)] = &[
    ("pk", "serial NOT NULL PRIMARY KEY"),
    ("bigpk", "bigserial NOT NULL PRIMARY KEY"),
    ("string", "varchar(255)"),
    ("text", "text"),
    ("smallint", "smallint"),
    ("integer", "integer"),
    ("bigint", "bigint"),
    ("float", "double precision"),
    ("decimal", "numeric(10,0)"),
    ("datetime", "timestamp(0)"),
    ("timestamp", "timestamp(0)"),
    ("time", "time(0)"),
    ("date", "date"),
    ("binary", "bytea"),
    ("boolean", "boolean"),
    ("money", "numeric(19,4)"),
];

/// PostgreSQL dialect: `"` quoting, `$n` placeholders, native ILIKE.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgsqlDialect;

impl Dialect for PgsqlDialect {
    fn name(&self) -> &'static str {
        "pgsql"
    }

    fn positional_placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn quote_value(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Text(s) => self.quote_string(s),
            SqlValue::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                format!("'\\x{hex}'::bytea")
            }
            other => other.to_sql_inline(),
        }
    }

    fn like_operator(&self, case_insensitive: bool) -> &'static str {
        if case_insensitive {
            "ILIKE"
        } else {
            "LIKE"
        }
    }

    fn column_type_map(&self) -> &'static [(&'static str, &'static str)] {
        COLUMN_TYPES
    }

    fn last_insert_id_sql(&self, sequence: Option<&str>) -> String {
        match sequence.filter(|s| !s.is_empty()) {
            Some(sequence) => format!("SELECT currval({})", self.quote_string(sequence)),
            None => String::from("SELECT lastval()"),
        }
    }
}
