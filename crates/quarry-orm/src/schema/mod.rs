//! Table metadata.
//!
//! Each backend reads its catalog into a [`TableSchema`]. Schemas are
//! memoized on the [`Connection`] and, when schema caching is enabled,
//! stored in the cache as JSON.

mod mysql;
mod pgsql;
mod sqlite;

use std::fmt;
use std::sync::LazyLock;

use quarry_core::SqlValue;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::Result;
use crate::row::DataRow;

static DB_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([a-zA-Z][\w ]*?)\s*(?:\(([^)]*)\))?\s*(unsigned)?\s*(?:zerofill)?\s*$")
        .expect("valid db type pattern")
});

/// Abstract column type, independent of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Fixed-length string.
    Char,
    /// Variable-length string.
    String,
    /// Long text.
    Text,
    /// 8-bit integer.
    TinyInt,
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Exact decimal.
    Decimal,
    /// Date and time.
    DateTime,
    /// Timestamp.
    Timestamp,
    /// Time of day.
    Time,
    /// Calendar date.
    Date,
    /// Binary data.
    Binary,
    /// Boolean.
    Boolean,
    /// Currency amount.
    Money,
    /// JSON document.
    Json,
}

impl ColumnType {
    /// Lowercase name as used in column definitions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::String => "string",
            Self::Text => "text",
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::DateTime => "datetime",
            Self::Timestamp => "timestamp",
            Self::Time => "time",
            Self::Date => "date",
            Self::Binary => "binary",
            Self::Boolean => "boolean",
            Self::Money => "money",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value representation a column's values are cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// [`SqlValue::Int`]
    Integer,
    /// [`SqlValue::Float`]
    Double,
    /// [`SqlValue::Bool`]
    Boolean,
    /// [`SqlValue::Text`]
    String,
    /// [`SqlValue::Blob`]
    Binary,
}

/// Metadata of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Whether NULL is allowed.
    pub allow_null: bool,
    /// Backend type as declared, lowercase (`varchar(255)`).
    pub db_type: String,
    /// Abstract type.
    pub column_type: ColumnType,
    /// Representation values are cast to.
    pub kind: ValueKind,
    /// Default value, already cast.
    pub default_value: Option<SqlValue>,
    /// Default given as an SQL expression (`CURRENT_TIMESTAMP`).
    pub default_expression: Option<String>,
    /// Allowed values of an enum column.
    pub enum_values: Vec<String>,
    /// Display size.
    pub size: Option<u32>,
    /// Numeric precision.
    pub precision: Option<u32>,
    /// Numeric scale.
    pub scale: Option<u32>,
    /// Part of the primary key.
    pub is_primary_key: bool,
    /// Filled by the backend on insert.
    pub auto_increment: bool,
    /// Unsigned numeric.
    pub unsigned: bool,
    /// Column comment.
    pub comment: Option<String>,
}

impl ColumnSchema {
    /// Column metadata from a declared type, mapped through a backend type
    /// table. Unknown types map to [`ColumnType::String`].
    #[must_use]
    pub fn from_db_type(name: impl Into<String>, db_type: &str, type_map: &[(&str, ColumnType)]) -> Self {
        let db_type = db_type.trim().to_ascii_lowercase();
        let mut column = Self {
            name: name.into(),
            allow_null: true,
            db_type: db_type.clone(),
            column_type: ColumnType::String,
            kind: ValueKind::String,
            default_value: None,
            default_expression: None,
            enum_values: Vec::new(),
            size: None,
            precision: None,
            scale: None,
            is_primary_key: false,
            auto_increment: false,
            unsigned: false,
            comment: None,
        };
        if let Some(caps) = DB_TYPE.captures(&db_type) {
            let base = caps[1].trim().to_string();
            column.unsigned = caps.get(3).is_some();
            if let Some((_, column_type)) = type_map.iter().find(|(name, _)| *name == base) {
                column.column_type = *column_type;
            }
            if let Some(args) = caps.get(2).map(|m| m.as_str()) {
                if base == "enum" {
                    column.enum_values = args
                        .split(',')
                        .map(|v| v.trim().trim_matches('\'').replace("''", "'"))
                        .collect();
                } else {
                    let mut parts = args.split(',').map(|p| p.trim().parse::<u32>().ok());
                    column.size = parts.next().flatten();
                    column.precision = column.size;
                    column.scale = parts.next().flatten();
                }
            }
            if column.size == Some(1) && (base == "tinyint" || base == "bit") {
                column.column_type = ColumnType::Boolean;
            }
        }
        column.kind = column.value_kind();
        column
    }

    fn value_kind(&self) -> ValueKind {
        match self.column_type {
            ColumnType::BigInt if self.unsigned => ValueKind::String,
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt => {
                ValueKind::Integer
            }
            ColumnType::Boolean => ValueKind::Boolean,
            ColumnType::Float | ColumnType::Double => ValueKind::Double,
            ColumnType::Binary => ValueKind::Binary,
            _ => ValueKind::String,
        }
    }

    /// Converts a value read from or written to this column into the
    /// column's representation. Empty strings become NULL for non-text
    /// columns; values that do not parse are returned unchanged.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn typecast(&self, value: SqlValue) -> SqlValue {
        if let SqlValue::Text(text) = &value {
            if text.is_empty() && !matches!(self.kind, ValueKind::String | ValueKind::Binary) {
                return SqlValue::Null;
            }
        }
        match (self.kind, value) {
            (_, SqlValue::Null) => SqlValue::Null,
            (ValueKind::Integer, SqlValue::Bool(b)) => SqlValue::Int(i64::from(b)),
            (ValueKind::Integer, SqlValue::Text(text)) => {
                text.trim().parse().map_or(SqlValue::Text(text), SqlValue::Int)
            }
            (ValueKind::Double, SqlValue::Int(i)) => SqlValue::Float(i as f64),
            (ValueKind::Double, SqlValue::Text(text)) => {
                text.trim().parse().map_or(SqlValue::Text(text), SqlValue::Float)
            }
            (ValueKind::Boolean, SqlValue::Int(i)) => SqlValue::Bool(i != 0),
            (ValueKind::Boolean, SqlValue::Text(text)) => {
                match text.trim().to_ascii_lowercase().as_str() {
                    "1" | "t" | "true" | "y" | "yes" | "on" => SqlValue::Bool(true),
                    "0" | "f" | "false" | "n" | "no" | "off" => SqlValue::Bool(false),
                    _ => SqlValue::Text(text),
                }
            }
            (ValueKind::String, SqlValue::Int(i)) => SqlValue::Text(i.to_string()),
            (ValueKind::String, SqlValue::Float(f)) => SqlValue::Text(f.to_string()),
            (ValueKind::String, SqlValue::Bool(b)) => SqlValue::Text(String::from(if b { "1" } else { "0" })),
            (_, value) => value,
        }
    }

    // Default as reported by the catalog: a quoted literal, NULL, a bare
    // literal, or an expression.
    fn set_default_literal(&mut self, raw: Option<&str>) {
        let Some(raw) = raw.map(str::trim) else {
            return;
        };
        if raw.is_empty() && !matches!(self.kind, ValueKind::String) {
            return;
        }
        if raw.eq_ignore_ascii_case("null") {
            return;
        }
        if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
            self.default_value = Some(self.typecast(SqlValue::Text(inner.replace("''", "'"))));
            return;
        }
        let upper = raw.to_ascii_uppercase();
        if raw.contains('(') || upper.starts_with("CURRENT_") || upper == "NOW" || upper == "LOCALTIMESTAMP" {
            self.default_expression = Some(raw.to_string());
            return;
        }
        self.default_value = Some(self.typecast(SqlValue::Text(raw.to_string())));
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name, when the backend reports one.
    pub name: Option<String>,
    /// Referenced table.
    pub foreign_table: String,
    /// `(local column, referenced column)` pairs.
    pub columns: Vec<(String, String)>,
}

/// Metadata of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Schema (namespace) name, when not the default.
    pub schema_name: Option<String>,
    /// Table name without schema.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSchema>,
    /// Primary key columns.
    pub primary_key: Vec<String>,
    /// Sequence feeding the primary key.
    pub sequence_name: Option<String>,
    /// Foreign keys.
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub(crate) fn new(schema_name: Option<String>, name: impl Into<String>) -> Self {
        Self {
            schema_name,
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            sequence_name: None,
            foreign_keys: Vec::new(),
        }
    }

    /// Name including the schema, when one is set.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.schema_name {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Metadata of a column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Casts `value` for column `name`; unknown columns pass through.
    #[must_use]
    pub fn typecast(&self, name: &str, value: SqlValue) -> SqlValue {
        match self.column(name) {
            Some(column) => column.typecast(value),
            None => value,
        }
    }

    fn mark_primary_key(&mut self) {
        for column in &mut self.columns {
            column.is_primary_key = self.primary_key.contains(&column.name);
        }
    }
}

pub(crate) async fn load_table_schema(conn: &Connection, name: &str) -> Result<Option<TableSchema>> {
    match conn.driver() {
        Driver::Sqlite => sqlite::load_table(conn, name).await,
        Driver::Postgres => pgsql::load_table(conn, name).await,
        Driver::Mysql => mysql::load_table(conn, name).await,
    }
}

pub(crate) async fn load_table_names(conn: &Connection) -> Result<Vec<String>> {
    let names = match conn.driver() {
        Driver::Sqlite => sqlite::table_names(conn).await?,
        Driver::Postgres => pgsql::table_names(conn).await?,
        Driver::Mysql => mysql::table_names(conn).await?,
    };
    Ok(names)
}

// Catalog values as text; some backends report names as binary strings.
fn text(row: &DataRow, column: &str) -> Option<String> {
    match row.get(column)? {
        SqlValue::Null => None,
        SqlValue::Text(s) => Some(s.clone()),
        SqlValue::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        other => Some(other.to_string()),
    }
}

fn int(row: &DataRow, column: &str) -> i64 {
    row.get(column)
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &[(&str, ColumnType)] = &[
        ("int", ColumnType::Integer),
        ("varchar", ColumnType::String),
        ("decimal", ColumnType::Decimal),
        ("tinyint", ColumnType::TinyInt),
        ("enum", ColumnType::String),
        ("boolean", ColumnType::Boolean),
        ("double precision", ColumnType::Double),
    ];

    #[test]
    fn test_parse_db_type() {
        let column = ColumnSchema::from_db_type("price", "DECIMAL(10,2) unsigned", MAP);
        assert_eq!(column.column_type, ColumnType::Decimal);
        assert_eq!(column.precision, Some(10));
        assert_eq!(column.scale, Some(2));
        assert!(column.unsigned);
        assert_eq!(column.kind, ValueKind::String);

        let column = ColumnSchema::from_db_type("flag", "tinyint(1)", MAP);
        assert_eq!(column.column_type, ColumnType::Boolean);

        let column = ColumnSchema::from_db_type("status", "enum('a','it''s')", MAP);
        assert_eq!(column.enum_values, vec!["a".to_string(), "it's".to_string()]);

        let column = ColumnSchema::from_db_type("ratio", "double precision", MAP);
        assert_eq!(column.kind, ValueKind::Double);

        let column = ColumnSchema::from_db_type("blob", "geometry", MAP);
        assert_eq!(column.column_type, ColumnType::String);
    }

    #[test]
    fn test_typecast() {
        let int = ColumnSchema::from_db_type("id", "int(11)", MAP);
        assert_eq!(int.typecast(SqlValue::Text("42".into())), SqlValue::Int(42));
        assert_eq!(int.typecast(SqlValue::Text(String::new())), SqlValue::Null);
        assert_eq!(int.typecast(SqlValue::Text("x".into())), SqlValue::Text("x".into()));

        let flag = ColumnSchema::from_db_type("flag", "boolean", MAP);
        assert_eq!(flag.typecast(SqlValue::Int(1)), SqlValue::Bool(true));
        assert_eq!(flag.typecast(SqlValue::Text("f".into())), SqlValue::Bool(false));

        let name = ColumnSchema::from_db_type("name", "varchar(255)", MAP);
        assert_eq!(name.typecast(SqlValue::Int(7)), SqlValue::Text("7".into()));
        assert_eq!(name.typecast(SqlValue::Text(String::new())), SqlValue::Text(String::new()));
    }

    #[test]
    fn test_default_literals() {
        let mut column = ColumnSchema::from_db_type("name", "varchar(255)", MAP);
        column.set_default_literal(Some("'it''s'"));
        assert_eq!(column.default_value, Some(SqlValue::Text("it's".into())));

        let mut column = ColumnSchema::from_db_type("n", "int", MAP);
        column.set_default_literal(Some("3"));
        assert_eq!(column.default_value, Some(SqlValue::Int(3)));

        let mut column = ColumnSchema::from_db_type("at", "timestamp", MAP);
        column.set_default_literal(Some("CURRENT_TIMESTAMP"));
        assert_eq!(column.default_value, None);
        assert_eq!(column.default_expression.as_deref(), Some("CURRENT_TIMESTAMP"));

        let mut column = ColumnSchema::from_db_type("n", "int", MAP);
        column.set_default_literal(Some("NULL"));
        assert_eq!(column.default_value, None);
    }
}
