//! Placeholder rewriting.
//!
//! Commands carry SQL with named (`:name`) or positional (`?`) placeholders.
//! Drivers want their own positional syntax, so statements are rewritten in
//! order of appearance before they reach sqlx. Quoted strings, quoted
//! identifiers and PostgreSQL `::` casts are copied verbatim.

use quarry_core::{Dialect, Params, SqlValue};

use crate::error::{DbError, Result};

/// A placeholder found in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder<'a> {
    /// `:name`, including the colon.
    Named(&'a str),
    /// The n-th `?` (1-based).
    Positional(usize),
}

impl Placeholder<'_> {
    fn key(self) -> String {
        match self {
            Self::Named(name) => name.to_string(),
            Self::Positional(n) => n.to_string(),
        }
    }

    fn text(self) -> String {
        match self {
            Self::Named(name) => name.to_string(),
            Self::Positional(_) => String::from("?"),
        }
    }
}

fn rewrite<F>(sql: &str, mut replace: F) -> Result<String>
where
    F: FnMut(Placeholder<'_>) -> Result<String>,
{
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    let mut positional = 0;
    while let Some((start, c)) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                out.push(c);
                while let Some((_, d)) = chars.next() {
                    out.push(d);
                    if d == c {
                        // A doubled quote stays inside the literal.
                        if chars.peek().is_some_and(|&(_, n)| n == c) {
                            out.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            ':' => {
                if chars.peek().is_some_and(|&(_, n)| n == ':') {
                    out.push_str("::");
                    chars.next();
                    continue;
                }
                let mut end = start + 1;
                while let Some(&(i, n)) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        end = i + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if end == start + 1 {
                    out.push(':');
                } else {
                    out.push_str(&replace(Placeholder::Named(&sql[start..end]))?);
                }
            }
            '?' => {
                positional += 1;
                out.push_str(&replace(Placeholder::Positional(positional))?);
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// Rewrites placeholders into the dialect's positional syntax and collects
/// the values in binding order. Null values are written as `NULL` so the
/// driver never has to guess a parameter type for them.
pub(crate) fn to_positional(sql: &str, params: &Params, dialect: &dyn Dialect) -> Result<(String, Vec<SqlValue>)> {
    let mut values = Vec::new();
    let sql = rewrite(sql, |placeholder| {
        let value = params.get(&placeholder.key()).ok_or_else(|| {
            DbError::InvalidCall(format!(
                "parameter {} is not bound",
                placeholder.text()
            ))
        })?;
        if value.is_null() {
            return Ok(String::from("NULL"));
        }
        values.push(value.clone());
        Ok(dialect.positional_placeholder(values.len()))
    })?;
    Ok((sql, values))
}

/// Inlines bound values for logging and cache keys. Unbound placeholders
/// are left as written.
pub(crate) fn inline(sql: &str, params: &Params, dialect: &dyn Dialect) -> String {
    if params.is_empty() {
        return sql.to_string();
    }
    rewrite(sql, |placeholder| {
        Ok(params
            .get(&placeholder.key())
            .map_or_else(|| placeholder.text(), |value| dialect.quote_value(value)))
    })
    .unwrap_or_else(|_| sql.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{PgsqlDialect, SqliteDialect};

    fn params() -> Params {
        [(":id", SqlValue::Int(3)), (":name", SqlValue::Text("it's".into()))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_named_to_dollar() {
        let (sql, values) = to_positional(
            "SELECT * FROM t WHERE id=:id AND name=:name OR id=:id",
            &params(),
            &PgsqlDialect,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id=$1 AND name=$2 OR id=$3");
        assert_eq!(values.len(), 3);
        assert_eq!(values[2], SqlValue::Int(3));
    }

    #[test]
    fn test_skips_literals_and_casts() {
        let (sql, values) = to_positional(
            "SELECT ':id', `a:b`, x::text, \"q\"\"x:name\" FROM t WHERE id = :id",
            &params(),
            &SqliteDialect,
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT ':id', `a:b`, x::text, \"q\"\"x:name\" FROM t WHERE id = ?"
        );
        assert_eq!(values, vec![SqlValue::Int(3)]);
    }

    #[test]
    fn test_positional_params_by_index() {
        let params: Params = [("1", 10), ("2", 20)].into_iter().collect();
        let (sql, values) = to_positional("a = ? AND b = ?", &params, &PgsqlDialect).unwrap();
        assert_eq!(sql, "a = $1 AND b = $2");
        assert_eq!(values, vec![SqlValue::Int(10), SqlValue::Int(20)]);
    }

    #[test]
    fn test_null_is_inlined() {
        let params: Params = [(":a", SqlValue::Null), (":b", SqlValue::Int(1))].into_iter().collect();
        let (sql, values) = to_positional("x = :a AND y = :b", &params, &PgsqlDialect).unwrap();
        assert_eq!(sql, "x = NULL AND y = $1");
        assert_eq!(values, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_unbound_is_invalid_call() {
        let err = to_positional("a = :missing", &params(), &SqliteDialect).unwrap_err();
        assert!(matches!(err, DbError::InvalidCall(_)));
    }

    #[test]
    fn test_inline_quotes_values() {
        assert_eq!(
            inline("SELECT * FROM t WHERE name=:name AND x=:other", &params(), &SqliteDialect),
            "SELECT * FROM t WHERE name='it''s' AND x=:other"
        );
    }
}
