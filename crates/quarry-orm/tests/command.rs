//! Command execution against an in-memory SQLite database.

mod common;

use std::time::Duration;

use quarry_core::{columns, Condition, Query, SqlValue};
use quarry_orm::{Cache, CacheDependency, DbError, QueryExt};

#[tokio::test]
async fn test_execute_and_scalar() {
    common::init_tracing();
    let db = common::connect().await;

    let affected = db
        .command("INSERT INTO customer (email, name, address) VALUES (:email, :name, :address)")
        .bind_value(":email", "user4@example.com")
        .bind_value(":name", "user4")
        .bind_value(":address", "address4")
        .execute()
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let count = db.command("SELECT COUNT(*) FROM customer").query_scalar().await.unwrap();
    assert_eq!(count, Some(SqlValue::Int(4)));
}

#[tokio::test]
async fn test_query_shapes() {
    let db = common::connect().await;

    let rows = db
        .command("SELECT id, name FROM customer ORDER BY id")
        .query_all()
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].columns(), ["id".to_string(), "name".to_string()]);
    assert_eq!(rows[2].get("name"), Some(&SqlValue::Text("user3".into())));

    let row = db
        .command("SELECT * FROM customer WHERE id = :id")
        .bind_value(":id", 2)
        .query_one()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get("email"), Some(&SqlValue::Text("user2@example.com".into())));

    let missing = db
        .command("SELECT * FROM customer WHERE id = 99")
        .query_one()
        .await
        .unwrap();
    assert!(missing.is_none());

    let names = db
        .command("SELECT name FROM customer ORDER BY id DESC")
        .query_column()
        .await
        .unwrap();
    assert_eq!(
        names,
        vec![
            SqlValue::Text("user3".into()),
            SqlValue::Text("user2".into()),
            SqlValue::Text("user1".into()),
        ]
    );
}

#[tokio::test]
async fn test_positional_params() {
    let db = common::connect().await;
    let name = db
        .command("SELECT name FROM customer WHERE id = ? AND status = ?")
        .bind_value("1", 2)
        .bind_value("2", 1)
        .query_scalar()
        .await
        .unwrap();
    assert_eq!(name, Some(SqlValue::Text("user2".into())));
}

#[tokio::test]
async fn test_placeholders_inside_literals_are_ignored() {
    let db = common::connect().await;
    let value = db
        .command("SELECT ':name' || name FROM customer WHERE id = :id")
        .bind_value(":id", 1)
        .query_scalar()
        .await
        .unwrap();
    assert_eq!(value, Some(SqlValue::Text(":nameuser1".into())));
}

#[tokio::test]
async fn test_unbound_placeholder_is_invalid_call() {
    let db = common::connect().await;
    let err = db
        .command("SELECT * FROM customer WHERE id = :id")
        .query_all()
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidCall(_)), "{err:?}");
}

#[tokio::test]
async fn test_null_values() {
    let db = common::connect().await;
    db.command("")
        .insert(
            "customer",
            &columns!["email" => "null@example.com", "address" => SqlValue::Null],
        )
        .unwrap()
        .execute()
        .await
        .unwrap();
    let count = Query::new()
        .from(["customer"])
        .where_clause(Condition::hash([
            ("address", SqlValue::Null),
            ("email", SqlValue::Text("null@example.com".into())),
        ]))
        .count(&db, "*")
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_batch_insert_bool_values() {
    let db = common::connect().await;
    let affected = db
        .command("")
        .batch_insert(
            "bool_values",
            &["bool_col"],
            &[vec![SqlValue::Bool(true)], vec![SqlValue::Bool(false)]],
        )
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert_eq!(affected, 2);

    let trues = db
        .command("SELECT COUNT(*) FROM bool_values WHERE bool_col = TRUE")
        .query_scalar()
        .await
        .unwrap();
    let falses = db
        .command("SELECT COUNT(*) FROM bool_values WHERE bool_col = FALSE")
        .query_scalar()
        .await
        .unwrap();
    assert_eq!(trues, Some(SqlValue::Int(1)));
    assert_eq!(falses, Some(SqlValue::Int(1)));
}

#[tokio::test]
async fn test_update_and_delete_builders() {
    let db = common::connect().await;
    let updated = db
        .command("")
        .update("customer", &columns!["status" => 5], Some(&Condition::gt("id", 1)))
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let bumped = db
        .command("")
        .update_counters("customer", &[("status".to_string(), 2)], Some(&Condition::eq("id", 1)))
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert_eq!(bumped, 1);
    let status = db
        .command("SELECT status FROM customer WHERE id = 1")
        .query_scalar()
        .await
        .unwrap();
    assert_eq!(status, Some(SqlValue::Int(3)));

    let deleted = db
        .command("")
        .delete("customer", Some(&Condition::eq("status", 5)))
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert_eq!(deleted, 2);
}

#[tokio::test]
async fn test_ddl_builders() {
    let db = common::connect().await;
    db.command("")
        .create_table("note", &[("id", "pk"), ("body", "text")], None)
        .execute()
        .await
        .unwrap();
    db.command("")
        .create_index("idx_note_body", "note", &["body"], false)
        .execute()
        .await
        .unwrap();
    db.command("INSERT INTO note (body) VALUES ('a')").execute().await.unwrap();
    assert!(db.table_names().await.unwrap().contains(&"note".to_string()));

    db.command("").drop_table("note").execute().await.unwrap();
    assert!(!db.table_names().await.unwrap().contains(&"note".to_string()));
}

#[tokio::test]
async fn test_driver_error_keeps_sql() {
    let db = common::connect().await;
    let err = db
        .command("SELECT * FROM missing_table WHERE id = :id")
        .bind_value(":id", 7)
        .query_all()
        .await
        .unwrap_err();
    match err {
        DbError::Database { sql, .. } => assert_eq!(sql, "SELECT * FROM missing_table WHERE id = 7"),
        other => panic!("expected a database error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_prepare_reports_syntax_errors() {
    let db = common::connect().await;
    let mut ok = db.command("SELECT * FROM customer");
    ok.prepare().await.unwrap();
    assert!(ok.is_prepared());

    let mut bad = db.command("SELEC * FROM customer");
    assert!(bad.prepare().await.is_err());
    assert!(!bad.is_prepared());
}

#[tokio::test]
async fn test_query_cache() {
    let (db, cache) = common::connect_cached().await;
    let sql = "SELECT name FROM customer WHERE id = 1";

    let first = db.command(sql).query_scalar().await.unwrap();
    assert_eq!(first, Some(SqlValue::Text("user1".into())));
    assert!(!cache.is_empty());

    db.command("UPDATE customer SET name = 'changed' WHERE id = 1")
        .execute()
        .await
        .unwrap();

    let cached = db.command(sql).query_scalar().await.unwrap();
    assert_eq!(cached, first);

    let fresh = db.command(sql).no_cache().query_scalar().await.unwrap();
    assert_eq!(fresh, Some(SqlValue::Text("changed".into())));

    db.set_query_cache_enabled(false);
    let bypassed = db.command(sql).query_scalar().await.unwrap();
    assert_eq!(bypassed, fresh);
}

#[tokio::test]
async fn test_query_cache_dependency() {
    let (db, cache) = common::connect_cached().await;
    let sql = "SELECT COUNT(*) FROM customer";
    let dependency = CacheDependency::tags(["customer"]);

    let before = db
        .command(sql)
        .cache(Some(Duration::from_secs(60)), Some(dependency.clone()))
        .query_scalar()
        .await
        .unwrap();
    db.command("DELETE FROM customer WHERE id = 3").execute().await.unwrap();

    cache.invalidate_tags(&["customer"]);
    let after = db
        .command(sql)
        .cache(Some(Duration::from_secs(60)), Some(dependency))
        .query_scalar()
        .await
        .unwrap();
    assert_eq!(before, Some(SqlValue::Int(3)));
    assert_eq!(after, Some(SqlValue::Int(2)));

    cache.flush();
    assert!(cache.is_empty());
}
