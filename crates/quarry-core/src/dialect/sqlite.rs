//! SQLite dialect.

use super::Dialect;

const COLUMN_TYPES: &[(&str, &str)] = &[
    ("pk", "integer PRIMARY KEY AUTOINCREMENT NOT NULL"),
    ("bigpk", "integer PRIMARY KEY AUTOINCREMENT NOT NULL"),
    ("string", "varchar(255)"),
    ("text", "text"),
    ("smallint", "smallint"),
    ("integer", "integer"),
    ("bigint", "bigint"),
    ("float", "float"),
    ("decimal", "decimal(10,0)"),
    ("datetime", "datetime"),
    ("timestamp", "timestamp"),
    ("time", "time"),
    ("date", "date"),
    ("binary", "blob"),
    ("boolean", "boolean"),
    ("money", "decimal(19,4)"),
];

/// SQLite dialect.
///
/// Identifiers are quoted with backticks, compound selects are not
/// parenthesized and TRUNCATE is emulated with DELETE.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn like_escape_clause(&self) -> &'static str {
        " ESCAPE '\\'"
    }

    fn build_limit(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let offset = offset.filter(|o| *o > 0);
        let mut sql = match (limit, offset) {
            (Some(limit), _) => format!("LIMIT {limit}"),
            (None, Some(_)) => format!("LIMIT {}", i64::MAX),
            (None, None) => String::new(),
        };
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    fn parenthesized_unions(&self) -> bool {
        false
    }

    fn column_type_map(&self) -> &'static [(&'static str, &'static str)] {
        COLUMN_TYPES
    }

    fn truncate_table_sql(&self, quoted_table: &str) -> String {
        format!("DELETE FROM {quoted_table}")
    }

    fn last_insert_id_sql(&self, _sequence: Option<&str>) -> String {
        String::from("SELECT last_insert_rowid()")
    }
}
