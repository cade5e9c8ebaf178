//! SQL dialect support.
//!
//! Each supported database quotes identifiers, writes placeholders, handles
//! LIKE escaping and LIMIT clauses slightly differently. The [`Dialect`]
//! trait collects those differences; [`QueryBuilder`](crate::QueryBuilder)
//! asks it whenever it emits dialect-sensitive SQL.

mod mysql;
mod pgsql;
mod sqlite;

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::value::SqlValue;

pub use mysql::MysqlDialect;
pub use pgsql::PgsqlDialect;
pub use sqlite::SqliteDialect;

static TABLE_COLUMN_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\{\{(%?[\w\-\. ]+%?)\}\}|\[\[([\w\-\. ]+)\]\])")
        .expect("valid table/column marker pattern")
});

/// Trait for SQL dialect-specific behavior.
pub trait Dialect: std::fmt::Debug + Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Placeholder for the `index`-th (1-based) positional parameter.
    fn positional_placeholder(&self, _index: usize) -> String {
        String::from("?")
    }

    /// Quotes a table name that has no schema prefix.
    fn quote_simple_table_name(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        if name.contains(quote) {
            name.to_string()
        } else {
            format!("{quote}{name}{quote}")
        }
    }

    /// Quotes a column name that has no table prefix. `*` is left alone.
    fn quote_simple_column_name(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        if name == "*" || name.contains(quote) {
            name.to_string()
        } else {
            format!("{quote}{name}{quote}")
        }
    }

    /// Quotes a possibly schema-qualified table name.
    ///
    /// Names containing `(` or `{{` are treated as expressions and returned
    /// unchanged.
    fn quote_table_name(&self, name: &str) -> String {
        if name.contains('(') || name.contains("{{") {
            return name.to_string();
        }
        name.split('.')
            .map(|part| self.quote_simple_table_name(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quotes a possibly table-qualified column name.
    ///
    /// Names containing `(`, `[[` or `{{` are returned unchanged.
    fn quote_column_name(&self, name: &str) -> String {
        if name.contains('(') || name.contains("[[") || name.contains("{{") {
            return name.to_string();
        }
        match name.rfind('.') {
            Some(pos) => format!(
                "{}.{}",
                self.quote_table_name(&name[..pos]),
                self.quote_simple_column_name(&name[pos + 1..])
            ),
            None => self.quote_simple_column_name(name),
        }
    }

    /// Quotes a string literal.
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Renders a value as an inline SQL literal.
    fn quote_value(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Text(s) => self.quote_string(s),
            other => other.to_sql_inline(),
        }
    }

    /// Replaces `{{table}}`, `{{%table}}` and `[[column]]` markers with quoted
    /// names. `%` inside a table marker becomes `table_prefix`.
    fn quote_sql(&self, sql: &str, table_prefix: &str) -> String {
        if !sql.contains("{{") && !sql.contains("[[") {
            return sql.to_string();
        }
        TABLE_COLUMN_MARKERS
            .replace_all(sql, |caps: &Captures<'_>| {
                if let Some(column) = caps.get(3) {
                    self.quote_column_name(column.as_str())
                } else {
                    let table = caps
                        .get(2)
                        .map_or("", |m| m.as_str())
                        .replace('%', table_prefix);
                    self.quote_table_name(&table)
                }
            })
            .into_owned()
    }

    /// LIKE operator keyword.
    fn like_operator(&self, _case_insensitive: bool) -> &'static str {
        "LIKE"
    }

    /// Suffix appended after an escaped LIKE pattern placeholder.
    fn like_escape_clause(&self) -> &'static str {
        ""
    }

    /// Escapes LIKE wildcards so `value` matches literally.
    fn escape_like_value(&self, value: &str) -> String {
        let mut escaped = String::with_capacity(value.len());
        for c in value.chars() {
            if matches!(c, '\\' | '%' | '_') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }

    /// Builds the LIMIT/OFFSET clause, empty when neither is set.
    fn build_limit(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut parts = Vec::new();
        if let Some(limit) = limit {
            parts.push(format!("LIMIT {limit}"));
        }
        if let Some(offset) = offset.filter(|o| *o > 0) {
            parts.push(format!("OFFSET {offset}"));
        }
        parts.join(" ")
    }

    /// Whether compound selects wrap each operand in parentheses.
    fn parenthesized_unions(&self) -> bool {
        true
    }

    /// Tail of an INSERT statement without columns.
    fn insert_default_values(&self) -> &'static str {
        "DEFAULT VALUES"
    }

    /// Physical column types for the abstract type names.
    fn column_type_map(&self) -> &'static [(&'static str, &'static str)];

    /// Statement that empties `quoted_table`.
    fn truncate_table_sql(&self, quoted_table: &str) -> String {
        format!("TRUNCATE TABLE {quoted_table}")
    }

    /// Statement that renames a table.
    fn rename_table_sql(&self, quoted_from: &str, quoted_to: &str) -> String {
        format!("ALTER TABLE {quoted_from} RENAME TO {quoted_to}")
    }

    /// Statement that drops an index.
    fn drop_index_sql(&self, quoted_index: &str, _quoted_table: &str) -> String {
        format!("DROP INDEX {quoted_index}")
    }

    /// Query returning the id generated by the last insert.
    fn last_insert_id_sql(&self, sequence: Option<&str>) -> String;
}

/// Picks the dialect matching a DSN scheme (`sqlite:`, `postgres:`,
/// `postgresql:`, `mysql:`, `mariadb:`).
#[must_use]
pub fn dialect_for_dsn(dsn: &str) -> Option<Box<dyn Dialect>> {
    let scheme = dsn.split(':').next()?.to_ascii_lowercase();
    match scheme.as_str() {
        "sqlite" => Some(Box::new(SqliteDialect)),
        "postgres" | "postgresql" | "pgsql" => Some(Box::new(PgsqlDialect)),
        "mysql" | "mariadb" => Some(Box::new(MysqlDialect)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_table_and_column_names() {
        let d = PgsqlDialect;
        assert_eq!(d.quote_table_name("public.user"), "\"public\".\"user\"");
        assert_eq!(d.quote_column_name("t.name"), "\"t\".\"name\"");
        assert_eq!(d.quote_column_name("t.*"), "\"t\".*");
        assert_eq!(d.quote_column_name("COUNT(*)"), "COUNT(*)");
        assert_eq!(d.quote_column_name("\"already\""), "\"already\"");
        assert_eq!(d.quote_column_name("[[raw]]"), "[[raw]]");
    }

    #[test]
    fn test_quote_sql_markers() {
        let d = SqliteDialect;
        assert_eq!(
            d.quote_sql("SELECT [[id]] FROM {{%customer}} c JOIN {{item}}", "tbl_"),
            "SELECT `id` FROM `tbl_customer` c JOIN `item`"
        );
        assert_eq!(d.quote_sql("SELECT 1", "tbl_"), "SELECT 1");
    }

    #[test]
    fn test_escape_like_value() {
        let d = SqliteDialect;
        assert_eq!(d.escape_like_value(r"50%_a\b"), r"50\%\_a\\b");
    }

    #[test]
    fn test_dialect_for_dsn() {
        assert_eq!(dialect_for_dsn("sqlite::memory:").map(|d| d.name()), Some("sqlite"));
        assert_eq!(
            dialect_for_dsn("postgres://u@localhost/db").map(|d| d.name()),
            Some("pgsql")
        );
        assert_eq!(dialect_for_dsn("mariadb://localhost/db").map(|d| d.name()), Some("mysql"));
        assert!(dialect_for_dsn("oracle://x").is_none());
    }

    #[test]
    fn test_limit_clauses() {
        assert_eq!(PgsqlDialect.build_limit(Some(10), Some(5)), "LIMIT 10 OFFSET 5");
        assert_eq!(PgsqlDialect.build_limit(None, Some(5)), "OFFSET 5");
        assert_eq!(
            SqliteDialect.build_limit(None, Some(5)),
            "LIMIT 9223372036854775807 OFFSET 5"
        );
        assert_eq!(
            MysqlDialect.build_limit(None, Some(5)),
            "LIMIT 18446744073709551615 OFFSET 5"
        );
        assert_eq!(MysqlDialect.build_limit(Some(3), None), "LIMIT 3");
        assert_eq!(SqliteDialect.build_limit(None, None), "");
    }
}
