//! SQL values, raw expressions and bound parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of auto-generated parameter names.
pub const PARAM_PREFIX: &str = ":qp";

/// Prefix of parameter names generated for counter updates.
pub const COUNTER_PARAM_PREFIX: &str = ":bp";

/// A SQL value that can be bound as a parameter or stored as an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns true for `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Interprets the value as an integer when that is lossless.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interprets the value as a float.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interprets the value as a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(n) => Some(*n != 0),
            Self::Text(s) => match s.to_ascii_lowercase().as_str() {
                "1" | "t" | "true" | "y" | "yes" | "on" => Some(true),
                "0" | "f" | "false" | "n" | "no" | "off" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Borrows the text content.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the SQL representation for inline use (escaped).
    ///
    /// **Warning**: Prefer using parameterized queries instead.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => format!("{f}"),
            Self::Text(s) => {
                let escaped = s.replace('\'', "''");
                format!("'{escaped}'")
            }
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }
}

/// Plain textual form, used for index keys and relation buckets.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => f.write_str(if *b { "1" } else { "0" }),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for &SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self.clone()
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(self)
    }
}

impl ToSqlValue for i32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for i16 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for u32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for u8 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

/// Ordered set of named parameters.
///
/// Names carry their leading colon (`:qp0`). Positional parameters use their
/// 1-based index (`"1"`, `"2"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    entries: Vec<(String, SqlValue)>,
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a parameter. The leading colon is optional.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        let name = normalize_name(name);
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Binds `value` under `name`, replacing an earlier binding.
    pub fn set(&mut self, name: impl Into<String>, value: impl ToSqlValue) {
        let name = normalize_name(&name.into());
        let value = value.to_sql_value();
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Binds `value` under a generated name `{prefix}{n}` and returns it.
    /// `n` starts at the current length and skips names already bound.
    pub fn bind(&mut self, prefix: &str, value: SqlValue) -> String {
        let mut n = self.entries.len();
        let mut name = format!("{prefix}{n}");
        while self.get(&name).is_some() {
            n += 1;
            name = format!("{prefix}{n}");
        }
        self.entries.push((name.clone(), value));
        name
    }

    /// Merges `other` into this set; later bindings win.
    pub fn extend(&mut self, other: Self) {
        for (name, value) in other.entries {
            self.set(name, value);
        }
    }

    /// Iterates over `(name, value)` pairs in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

fn normalize_name(name: &str) -> String {
    if name.starts_with(':') || name.chars().all(|c| c.is_ascii_digit()) {
        name.to_string()
    } else {
        format!(":{name}")
    }
}

impl<K: Into<String>, V: ToSqlValue> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.set(name, value);
        }
        params
    }
}

impl IntoIterator for Params {
    type Item = (String, SqlValue);
    type IntoIter = std::vec::IntoIter<(String, SqlValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A raw SQL fragment together with the parameters it references.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expression {
    sql: String,
    params: Params,
}

impl Expression {
    /// Creates an expression without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Params::new(),
        }
    }

    /// Creates an expression bound to `params`.
    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// The SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The parameters referenced by the SQL text.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Splits into SQL text and parameters.
    #[must_use]
    pub fn into_parts(self) -> (String, Params) {
        (self.sql, self.params)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Value of a column in INSERT and UPDATE statements.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// Bound as a parameter.
    Value(SqlValue),
    /// Embedded verbatim.
    Expression(Expression),
}

impl<T: ToSqlValue> From<T> for ColumnValue {
    fn from(value: T) -> Self {
        Self::Value(value.to_sql_value())
    }
}

impl From<Expression> for ColumnValue {
    fn from(expr: Expression) -> Self {
        Self::Expression(expr)
    }
}

/// Builds a `Vec<(String, ColumnValue)>` for insert and update calls.
///
/// ```
/// use quarry_core::columns;
///
/// let cols = columns!["name" => "user1", "status" => 1];
/// assert_eq!(cols.len(), 2);
/// ```
#[macro_export]
macro_rules! columns {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::ColumnValue)>::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$((::std::string::String::from($name), $crate::ColumnValue::from($value))),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_inline() {
        assert_eq!(SqlValue::Null.to_sql_inline(), "NULL");
        assert_eq!(SqlValue::Bool(false).to_sql_inline(), "FALSE");
        assert_eq!(SqlValue::Int(-100).to_sql_inline(), "-100");
        assert_eq!(
            SqlValue::Text(String::from("O'Brien")).to_sql_inline(),
            "'O''Brien'"
        );
        assert_eq!(
            SqlValue::Blob(vec![0x48, 0x45, 0x4C]).to_sql_inline(),
            "X'48454C'"
        );
    }

    #[test]
    fn test_sql_value_accessors() {
        assert_eq!(SqlValue::Text(String::from(" 12 ")).as_i64(), Some(12));
        assert_eq!(SqlValue::Float(3.0).as_i64(), Some(3));
        assert_eq!(SqlValue::Float(3.5).as_i64(), None);
        assert_eq!(SqlValue::Int(0).as_bool(), Some(false));
        assert_eq!(SqlValue::Text(String::from("t")).as_bool(), Some(true));
        assert_eq!(SqlValue::Int(2).as_f64(), Some(2.0));
    }

    #[test]
    fn test_display_matches_between_int_and_text() {
        assert_eq!(
            SqlValue::Int(7).to_string(),
            SqlValue::Text(String::from("7")).to_string()
        );
        assert_eq!(SqlValue::Null.to_string(), "");
    }

    #[test]
    fn test_params_generated_names_follow_length() {
        let mut params: Params = [(":user", 5)].into_iter().collect();
        let name = params.bind(PARAM_PREFIX, SqlValue::Int(1));
        assert_eq!(name, ":qp1");
        assert_eq!(params.get("user"), Some(&SqlValue::Int(5)));
        assert_eq!(params.get(":qp1"), Some(&SqlValue::Int(1)));
    }

    #[test]
    fn test_params_bind_skips_taken_names() {
        let mut params: Params = [(":qp1", "user")].into_iter().collect();
        let name = params.bind(PARAM_PREFIX, SqlValue::Int(1));
        assert_eq!(name, ":qp2");
        assert_eq!(params.get(":qp1"), Some(&SqlValue::Text("user".into())));
        assert_eq!(params.get(":qp2"), Some(&SqlValue::Int(1)));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_params_set_replaces() {
        let mut params = Params::new();
        params.set(":a", 1);
        params.set("a", 2);
        params.set("1", "x");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get(":a"), Some(&SqlValue::Int(2)));
        assert_eq!(params.get("1"), Some(&SqlValue::Text(String::from("x"))));
    }

    #[test]
    fn test_sql_value_serde_round_trip_keeps_variant() {
        let values = vec![SqlValue::Int(1), SqlValue::Float(1.0), SqlValue::Null];
        let json = serde_json::to_string(&values).unwrap();
        let back: Vec<SqlValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(values, back);
    }

    #[test]
    fn test_columns_macro() {
        let cols = columns!["name" => "a", "age" => 3, "deleted" => None::<i64>];
        assert_eq!(cols[0].0, "name");
        assert_eq!(cols[1].1, ColumnValue::Value(SqlValue::Int(3)));
        assert_eq!(cols[2].1, ColumnValue::Value(SqlValue::Null));
    }
}
