//! PostgreSQL catalog via `information_schema`.

use std::sync::LazyLock;

use quarry_core::SqlValue;
use regex::Regex;

use super::{int, text, ColumnSchema, ColumnType, ForeignKey, TableSchema};
use crate::connection::Connection;
use crate::error::Result;

const DEFAULT_SCHEMA: &str = "public";

static NEXTVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^nextval\('"?([^"']+)"?'(?:::regclass)?\)"#).expect("valid nextval pattern")
});

static CAST_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::[\w ]+(?:\[\])?$").expect("valid cast suffix pattern"));

const TYPE_MAP: &[(&str, ColumnType)] = &[
    ("bit", ColumnType::Integer),
    ("bit varying", ColumnType::Integer),
    ("varbit", ColumnType::Integer),
    ("bool", ColumnType::Boolean),
    ("boolean", ColumnType::Boolean),
    ("box", ColumnType::String),
    ("circle", ColumnType::String),
    ("point", ColumnType::String),
    ("line", ColumnType::String),
    ("lseg", ColumnType::String),
    ("polygon", ColumnType::String),
    ("path", ColumnType::String),
    ("character", ColumnType::Char),
    ("char", ColumnType::Char),
    ("bpchar", ColumnType::Char),
    ("character varying", ColumnType::String),
    ("varchar", ColumnType::String),
    ("text", ColumnType::Text),
    ("bytea", ColumnType::Binary),
    ("cidr", ColumnType::String),
    ("inet", ColumnType::String),
    ("macaddr", ColumnType::String),
    ("real", ColumnType::Float),
    ("float4", ColumnType::Float),
    ("double precision", ColumnType::Double),
    ("float8", ColumnType::Double),
    ("decimal", ColumnType::Decimal),
    ("numeric", ColumnType::Decimal),
    ("money", ColumnType::Money),
    ("smallint", ColumnType::SmallInt),
    ("int2", ColumnType::SmallInt),
    ("int4", ColumnType::Integer),
    ("int", ColumnType::Integer),
    ("integer", ColumnType::Integer),
    ("bigint", ColumnType::BigInt),
    ("int8", ColumnType::BigInt),
    ("oid", ColumnType::BigInt),
    ("smallserial", ColumnType::SmallInt),
    ("serial2", ColumnType::SmallInt),
    ("serial4", ColumnType::Integer),
    ("serial", ColumnType::Integer),
    ("bigserial", ColumnType::BigInt),
    ("serial8", ColumnType::BigInt),
    ("pg_lsn", ColumnType::BigInt),
    ("date", ColumnType::Date),
    ("interval", ColumnType::String),
    ("time without time zone", ColumnType::Time),
    ("time", ColumnType::Time),
    ("time with time zone", ColumnType::Time),
    ("timetz", ColumnType::Time),
    ("timestamp without time zone", ColumnType::Timestamp),
    ("timestamp", ColumnType::Timestamp),
    ("timestamp with time zone", ColumnType::Timestamp),
    ("timestamptz", ColumnType::Timestamp),
    ("abstime", ColumnType::Timestamp),
    ("tsquery", ColumnType::String),
    ("tsvector", ColumnType::String),
    ("txid_snapshot", ColumnType::String),
    ("unknown", ColumnType::String),
    ("uuid", ColumnType::String),
    ("json", ColumnType::Json),
    ("jsonb", ColumnType::Json),
    ("xml", ColumnType::String),
];

fn split_name(name: &str) -> (String, String) {
    match name.split_once('.') {
        Some((schema, table)) => (schema.to_string(), table.to_string()),
        None => (DEFAULT_SCHEMA.to_string(), name.to_string()),
    }
}

pub(super) async fn load_table(conn: &Connection, name: &str) -> Result<Option<TableSchema>> {
    let (schema, table_name) = split_name(name);
    let rows = conn
        .command(
            "SELECT c.column_name::text AS column_name, c.data_type::text AS data_type, \
             c.udt_name::text AS udt_name, c.is_nullable::text AS is_nullable, \
             c.column_default::text AS column_default, c.is_identity::text AS is_identity, \
             c.character_maximum_length::int AS size, c.numeric_precision::int AS precision, \
             c.numeric_scale::int AS scale, \
             col_description(format('%I.%I', c.table_schema, c.table_name)::regclass, c.ordinal_position::int) AS comment \
             FROM information_schema.columns c \
             WHERE c.table_schema = :schema AND c.table_name = :table \
             ORDER BY c.ordinal_position",
        )
        .no_cache()
        .bind_value(":schema", schema.as_str())
        .bind_value(":table", table_name.as_str())
        .query_all()
        .await?;
    if rows.is_empty() {
        return Ok(None);
    }

    let schema_name = (schema != DEFAULT_SCHEMA).then(|| schema.clone());
    let mut table = TableSchema::new(schema_name, table_name.clone());
    for row in &rows {
        let Some(column_name) = text(row, "column_name") else {
            continue;
        };
        let data_type = text(row, "data_type").unwrap_or_default();
        let db_type = if data_type == "USER-DEFINED" || data_type == "ARRAY" {
            text(row, "udt_name").unwrap_or_default()
        } else {
            data_type
        };
        let mut column = ColumnSchema::from_db_type(column_name, &db_type, TYPE_MAP);
        column.allow_null = text(row, "is_nullable").as_deref() == Some("YES");
        column.size = u32::try_from(int(row, "size")).ok().filter(|s| *s > 0);
        column.precision = u32::try_from(int(row, "precision")).ok().filter(|s| *s > 0);
        column.scale = row
            .get("scale")
            .and_then(SqlValue::as_i64)
            .and_then(|s| u32::try_from(s).ok());
        column.comment = text(row, "comment");
        column.auto_increment = text(row, "is_identity").as_deref() == Some("YES");

        let default = text(row, "column_default");
        match default.as_deref().and_then(|d| NEXTVAL.captures(d)) {
            Some(caps) => {
                column.auto_increment = true;
                let sequence = caps[1].to_string();
                table.sequence_name = Some(if sequence.contains('.') || schema == DEFAULT_SCHEMA {
                    sequence
                } else {
                    format!("{schema}.{sequence}")
                });
            }
            None => {
                let literal = default.as_deref().map(|d| CAST_SUFFIX.replace(d, "").into_owned());
                column.set_default_literal(literal.as_deref());
            }
        }
        table.columns.push(column);
    }

    let keys = conn
        .command(
            "SELECT kcu.column_name::text AS column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
             ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             AND tc.table_name = kcu.table_name \
             WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = :schema AND tc.table_name = :table \
             ORDER BY kcu.ordinal_position",
        )
        .no_cache()
        .bind_value(":schema", schema.as_str())
        .bind_value(":table", table_name.as_str())
        .query_column()
        .await?;
    table.primary_key = keys.into_iter().map(|v| v.to_string()).collect();
    table.mark_primary_key();

    let rows = conn
        .command(
            "SELECT tc.constraint_name::text AS name, kcu.column_name::text AS column_name, \
             ccu.table_schema::text AS foreign_schema, ccu.table_name::text AS foreign_table, \
             ccu.column_name::text AS foreign_column \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
             ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             JOIN information_schema.constraint_column_usage ccu \
             ON ccu.constraint_name = tc.constraint_name AND ccu.constraint_schema = tc.constraint_schema \
             WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = :schema AND tc.table_name = :table \
             ORDER BY tc.constraint_name, kcu.ordinal_position",
        )
        .no_cache()
        .bind_value(":schema", schema.as_str())
        .bind_value(":table", table_name.as_str())
        .query_all()
        .await?;
    for row in &rows {
        let (Some(column), Some(foreign_table), Some(foreign_column)) = (
            text(row, "column_name"),
            text(row, "foreign_table"),
            text(row, "foreign_column"),
        ) else {
            continue;
        };
        let foreign_table = match text(row, "foreign_schema") {
            Some(s) if s != DEFAULT_SCHEMA => format!("{s}.{foreign_table}"),
            _ => foreign_table,
        };
        let name = text(row, "name");
        match table.foreign_keys.iter_mut().find(|fk| fk.name == name) {
            Some(fk) => {
                if !fk.columns.iter().any(|(local, _)| *local == column) {
                    fk.columns.push((column, foreign_column));
                }
            }
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
    let names = conn
        .command(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = :schema AND table_type IN ('BASE TABLE', 'VIEW') ORDER BY table_name",
        )
        .no_cache()
        .bind_value(":schema", DEFAULT_SCHEMA)
        .query_column()
        .await?;
    Ok(names.into_iter().map(|v| v.to_string()).collect())
}
