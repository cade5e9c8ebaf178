//! MySQL / MariaDB catalog via `SHOW FULL COLUMNS` and
//! `information_schema.KEY_COLUMN_USAGE`.

use super::{text, ColumnSchema, ColumnType, ForeignKey, TableSchema};
use crate::connection::Connection;
use crate::error::{DbError, Result};

const TYPE_MAP: &[(&str, ColumnType)] = &[
    ("tinyint", ColumnType::TinyInt),
    ("bit", ColumnType::Integer),
    ("smallint", ColumnType::SmallInt),
    ("mediumint", ColumnType::Integer),
    ("int", ColumnType::Integer),
    ("integer", ColumnType::Integer),
    ("bigint", ColumnType::BigInt),
    ("float", ColumnType::Float),
    ("double", ColumnType::Double),
    ("real", ColumnType::Float),
    ("decimal", ColumnType::Decimal),
    ("numeric", ColumnType::Decimal),
    ("tinytext", ColumnType::Text),
    ("mediumtext", ColumnType::Text),
    ("longtext", ColumnType::Text),
    ("longblob", ColumnType::Binary),
    ("blob", ColumnType::Binary),
    ("text", ColumnType::Text),
    ("varchar", ColumnType::String),
    ("string", ColumnType::String),
    ("char", ColumnType::Char),
    ("datetime", ColumnType::DateTime),
    ("year", ColumnType::Date),
    ("date", ColumnType::Date),
    ("time", ColumnType::Time),
    ("timestamp", ColumnType::Timestamp),
    ("enum", ColumnType::String),
    ("set", ColumnType::String),
    ("binary", ColumnType::Binary),
    ("varbinary", ColumnType::Binary),
    ("json", ColumnType::Json),
];

// SQLSTATE of error 1146, unknown table.
const NO_SUCH_TABLE: &str = "42S02";

pub(super) async fn load_table(conn: &Connection, name: &str) -> Result<Option<TableSchema>> {
    let (schema_name, table_name) = match name.split_once('.') {
        Some((schema, table)) => (Some(schema.to_string()), table.to_string()),
        None => (None, name.to_string()),
    };
    let quoted = conn.quote_table_name(name);
    let rows = match conn
        .command(format!("SHOW FULL COLUMNS FROM {quoted}"))
        .no_cache()
        .query_all()
        .await
    {
        Ok(rows) => rows,
        Err(DbError::Database { code: Some(code), .. }) if code == NO_SUCH_TABLE || code == "1146" => {
            return Ok(None)
        }
        Err(e) => return Err(e),
    };

    let mut table = TableSchema::new(schema_name.clone(), table_name.clone());
    for row in &rows {
        let Some(column_name) = text(row, "Field") else {
            continue;
        };
        let db_type = text(row, "Type").unwrap_or_default();
        let mut column = ColumnSchema::from_db_type(column_name.clone(), &db_type, TYPE_MAP);
        column.allow_null = text(row, "Null").as_deref() == Some("YES");
        column.auto_increment = text(row, "Extra").is_some_and(|e| e.to_ascii_lowercase().contains("auto_increment"));
        column.comment = text(row, "Comment").filter(|c| !c.is_empty());
        if text(row, "Key").as_deref() == Some("PRI") {
            table.primary_key.push(column_name);
        }
        let default = text(row, "Default");
        let is_time = matches!(column.column_type, ColumnType::Timestamp | ColumnType::DateTime);
        match default {
            Some(d) if is_time && d.to_ascii_uppercase().starts_with("CURRENT_TIMESTAMP") => {
                column.default_expression = Some(d);
            }
            Some(d) => column.set_default_literal(Some(&format!("'{}'", d.replace('\'', "''")))),
            None => {}
        }
        table.columns.push(column);
    }
    table.mark_primary_key();

    let schema_condition = if schema_name.is_some() { ":schema" } else { "DATABASE()" };
    let mut command = conn
        .command(format!(
            "SELECT CONSTRAINT_NAME AS name, COLUMN_NAME AS column_name, \
             REFERENCED_TABLE_NAME AS foreign_table, REFERENCED_COLUMN_NAME AS foreign_column \
             FROM information_schema.KEY_COLUMN_USAGE \
             WHERE TABLE_SCHEMA = {schema_condition} AND TABLE_NAME = :table \
             AND REFERENCED_TABLE_NAME IS NOT NULL \
             ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION"
        ))
        .no_cache()
        .bind_value(":table", table_name.as_str());
    if let Some(schema) = &schema_name {
        command = command.bind_value(":schema", schema.as_str());
    }
    for row in &command.query_all().await? {
        let (Some(column), Some(foreign_table), Some(foreign_column)) = (
            text(row, "column_name"),
            text(row, "foreign_table"),
            text(row, "foreign_column"),
        ) else {
            continue;
        };
        let name = text(row, "name");
        match table.foreign_keys.iter_mut().find(|fk| fk.name == name) {
            Some(fk) => fk.columns.push((column, foreign_column)),
            None => table.foreign_keys.push(ForeignKey {
                name,
                foreign_table,
                columns: vec![(column, foreign_column)],
            }),
        }
    }
    Ok(Some(table))
}

pub(super) async fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let names = conn.command("SHOW TABLES").no_cache().query_column().await?;
    Ok(names
        .into_iter()
        .map(|v| match v {
            quarry_core::SqlValue::Blob(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            other => other.to_string(),
        })
        .collect())
}
