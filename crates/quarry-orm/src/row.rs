//! Result rows decoded into [`SqlValue`]s.

use quarry_core::SqlValue;
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Row, TypeInfo, ValueRef};

/// One result row: column names and their values, in select order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl DataRow {
    /// Builds a row from parallel column and value lists.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub(crate) fn from_sqlite_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        collect(row, decode_sqlite)
    }

    pub(crate) fn from_pg_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        collect(row, decode_pg)
    }

    pub(crate) fn from_mysql_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        collect(row, decode_mysql)
    }

    /// Value of the named column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Value at a column position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True for a row without columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Consumes the row, returning the first value.
    #[must_use]
    pub fn into_first(self) -> Option<SqlValue> {
        self.values.into_iter().next()
    }
}

impl IntoIterator for DataRow {
    type Item = (String, SqlValue);
    type IntoIter = std::iter::Zip<std::vec::IntoIter<String>, std::vec::IntoIter<SqlValue>>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter().zip(self.values)
    }
}

type Decoder<R> = fn(&R, usize, &str) -> Result<SqlValue, sqlx::Error>;

fn collect<R>(row: &R, decode: Decoder<R>) -> Result<DataRow, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
{
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            decode(row, index, &type_name)?
        };
        columns.push(column.name().to_string());
        values.push(value);
    }
    Ok(DataRow { columns, values })
}

// SQLite reports the storage class of each value.
fn decode_sqlite(row: &SqliteRow, index: usize, type_name: &str) -> Result<SqlValue, sqlx::Error> {
    Ok(match type_name {
        "BOOLEAN" => SqlValue::Bool(row.try_get(index)?),
        "INTEGER" => SqlValue::Int(row.try_get(index)?),
        "REAL" => SqlValue::Float(row.try_get(index)?),
        "BLOB" => SqlValue::Blob(row.try_get(index)?),
        _ => SqlValue::Text(row.try_get(index)?),
    })
}

fn decode_pg(row: &PgRow, index: usize, type_name: &str) -> Result<SqlValue, sqlx::Error> {
    Ok(match type_name {
        "BOOL" => SqlValue::Bool(row.try_get(index)?),
        "INT2" => SqlValue::Int(i64::from(row.try_get::<i16, _>(index)?)),
        "INT4" => SqlValue::Int(i64::from(row.try_get::<i32, _>(index)?)),
        "INT8" => SqlValue::Int(row.try_get(index)?),
        "FLOAT4" => SqlValue::Float(f64::from(row.try_get::<f32, _>(index)?)),
        "FLOAT8" => SqlValue::Float(row.try_get(index)?),
        "BYTEA" => SqlValue::Blob(row.try_get(index)?),
        _ => SqlValue::Text(row.try_get(index)?),
    })
}

fn decode_mysql(row: &MySqlRow, index: usize, type_name: &str) -> Result<SqlValue, sqlx::Error> {
    Ok(match type_name {
        "BOOLEAN" => SqlValue::Bool(row.try_get(index)?),
        "TINYINT" => SqlValue::Int(i64::from(row.try_get::<i8, _>(index)?)),
        "SMALLINT" => SqlValue::Int(i64::from(row.try_get::<i16, _>(index)?)),
        "MEDIUMINT" | "INT" => SqlValue::Int(i64::from(row.try_get::<i32, _>(index)?)),
        "BIGINT" => SqlValue::Int(row.try_get(index)?),
        "TINYINT UNSIGNED" => SqlValue::Int(i64::from(row.try_get::<u8, _>(index)?)),
        "SMALLINT UNSIGNED" => SqlValue::Int(i64::from(row.try_get::<u16, _>(index)?)),
        "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => SqlValue::Int(i64::from(row.try_get::<u32, _>(index)?)),
        "BIGINT UNSIGNED" => {
            let value: u64 = row.try_get(index)?;
            i64::try_from(value).map_or_else(|_| SqlValue::Text(value.to_string()), SqlValue::Int)
        }
        "FLOAT" => SqlValue::Float(f64::from(row.try_get::<f32, _>(index)?)),
        "DOUBLE" => SqlValue::Float(row.try_get(index)?),
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            SqlValue::Blob(row.try_get(index)?)
        }
        _ => SqlValue::Text(row.try_get(index)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> DataRow {
        DataRow::new(
            vec!["id".into(), "name".into()],
            vec![SqlValue::Int(1), SqlValue::Text("a".into())],
        )
    }

    #[test]
    fn test_lookup_by_name_and_index() {
        let row = row();
        assert_eq!(row.get("name"), Some(&SqlValue::Text("a".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_index(0), Some(&SqlValue::Int(1)));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_into_iter_pairs() {
        let pairs: Vec<(String, SqlValue)> = row().into_iter().collect();
        assert_eq!(pairs[0], ("id".to_string(), SqlValue::Int(1)));
        assert_eq!(row().into_first(), Some(SqlValue::Int(1)));
    }
}
