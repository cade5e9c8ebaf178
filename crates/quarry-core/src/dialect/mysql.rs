//! MySQL / MariaDB dialect.

use super::Dialect;

const COLUMN_TYPES: &[(&str, &str)] = &[
    ("pk", "int(11) NOT NULL AUTO_INCREMENT PRIMARY KEY"),
    ("bigpk", "bigint(20) NOT NULL AUTO_INCREMENT PRIMARY KEY"),
    ("string", "varchar(255)"),
    ("text", "text"),
    ("smallint", "smallint(6)"),
    ("integer", "int(11)"),
    ("bigint", "bigint(20)"),
    ("float", "float"),
    ("decimal", "decimal(10,0)"),
    ("datetime", "datetime"),
    ("timestamp", "timestamp"),
    ("time", "time"),
    ("date", "date"),
    ("binary", "blob"),
    ("boolean", "tinyint(1)"),
    ("money", "decimal(19,4)"),
];

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    // Backslash is an escape character inside MySQL string literals.
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn build_limit(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let offset = offset.filter(|o| *o > 0);
        let mut sql = match (limit, offset) {
            (Some(limit), _) => format!("LIMIT {limit}"),
            (None, Some(_)) => format!("LIMIT {}", u64::MAX),
            (None, None) => String::new(),
        };
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    fn insert_default_values(&self) -> &'static str {
        "() VALUES ()"
    }

    fn column_type_map(&self) -> &'static [(&'static str, &'static str)] {
        COLUMN_TYPES
    }

    fn rename_table_sql(&self, quoted_from: &str, quoted_to: &str) -> String {
        format!("RENAME TABLE {quoted_from} TO {quoted_to}")
    }

    fn drop_index_sql(&self, quoted_index: &str, quoted_table: &str) -> String {
        format!("DROP INDEX {quoted_index} ON {quoted_table}")
    }

    fn last_insert_id_sql(&self, _sequence: Option<&str>) -> String {
        String::from("SELECT LAST_INSERT_ID()")
    }
}
