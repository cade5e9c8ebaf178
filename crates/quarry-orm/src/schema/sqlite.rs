//! SQLite catalog via `PRAGMA table_info` and `PRAGMA foreign_key_list`.

use super::{int, text, ColumnSchema, ColumnType, ForeignKey, TableSchema};
use crate::connection::Connection;
use crate::error::Result;

const TYPE_MAP: &[(&str, ColumnType)] = &[
    ("tinyint", ColumnType::TinyInt),
    ("bit", ColumnType::SmallInt),
    ("boolean", ColumnType::Boolean),
    ("bool", ColumnType::Boolean),
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
    ("text", ColumnType::Text),
    ("varchar", ColumnType::String),
    ("string", ColumnType::String),
    ("char", ColumnType::Char),
    ("blob", ColumnType::Binary),
    ("datetime", ColumnType::DateTime),
    ("year", ColumnType::Date),
    ("date", ColumnType::Date),
    ("time", ColumnType::Time),
    ("timestamp", ColumnType::Timestamp),
    ("enum", ColumnType::String),
    ("json", ColumnType::Json),
    ("money", ColumnType::Money),
];

pub(super) async fn load_table(conn: &Connection, name: &str) -> Result<Option<TableSchema>> {
    let quoted = conn.quote_table_name(name);
    let rows = conn
        .command(format!("PRAGMA table_info({quoted})"))
        .no_cache()
        .query_all()
        .await?;
    if rows.is_empty() {
        return Ok(None);
    }

    let mut table = TableSchema::new(None, name);
    let mut keys: Vec<(i64, String)> = Vec::new();
    for row in &rows {
        let Some(column_name) = text(row, "name") else {
            continue;
        };
        let db_type = text(row, "type").unwrap_or_default();
        let mut column = ColumnSchema::from_db_type(column_name.clone(), &db_type, TYPE_MAP);
        column.allow_null = int(row, "notnull") == 0;
        let position = int(row, "pk");
        if position > 0 {
            keys.push((position, column_name));
        }
        column.set_default_literal(text(row, "dflt_value").as_deref());
        table.columns.push(column);
    }
    keys.sort_by_key(|(position, _)| *position);
    table.primary_key = keys.into_iter().map(|(_, name)| name).collect();
    table.mark_primary_key();

    // A single integer key aliases the rowid.
    if let [key] = table.primary_key.as_slice() {
        let key = key.clone();
        if let Some(column) = table.columns.iter_mut().find(|c| c.name == key) {
            if column.db_type.starts_with("int") {
                column.auto_increment = true;
            }
        }
    }

    let rows = conn
        .command(format!("PRAGMA foreign_key_list({quoted})"))
        .no_cache()
        .query_all()
        .await?;
    for row in &rows {
        let id = int(row, "id");
        let (Some(foreign_table), Some(from)) = (text(row, "table"), text(row, "from")) else {
            continue;
        };
        let to = text(row, "to").unwrap_or_else(|| from.clone());
        let name = Some(format!("fk_{id}"));
        match table.foreign_keys.iter_mut().find(|fk| fk.name == name) {
            Some(fk) => fk.columns.push((from, to)),
            None => table.foreign_keys.push(ForeignKey {
                name,
                foreign_table,
                columns: vec![(from, to)],
            }),
        }
    }
    Ok(Some(table))
}

pub(super) async fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let names = conn
        .command(
            "SELECT DISTINCT tbl_name FROM sqlite_master WHERE tbl_name<>'sqlite_sequence' \
             AND type='table' ORDER BY tbl_name",
        )
        .no_cache()
        .query_column()
        .await?;
    Ok(names.into_iter().map(|v| v.to_string()).collect())
}
