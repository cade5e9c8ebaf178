//! Transactions and savepoints.

mod common;

use quarry_core::SqlValue;
use quarry_orm::{Connection, DbError};

async fn customer_count(db: &Connection) -> Option<SqlValue> {
    db.command("SELECT COUNT(*) FROM customer").query_scalar().await.unwrap()
}

async fn add_customer(db: &Connection, name: &str) {
    db.command("INSERT INTO customer (email, name) VALUES (:email, :name)")
        .bind_value(":email", format!("{name}@example.com"))
        .bind_value(":name", name)
        .execute()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_commit_persists() {
    let db = common::connect().await;
    let mut tx = db.begin_transaction().await.unwrap();
    assert_eq!(db.transaction_level(), 1);
    add_customer(&db, "user4").await;
    tx.commit().await.unwrap();

    assert!(!tx.is_active());
    assert_eq!(db.transaction_level(), 0);
    assert_eq!(customer_count(&db).await, Some(SqlValue::Int(4)));
}

#[tokio::test]
async fn test_rollback_discards() {
    let db = common::connect().await;
    let mut tx = db.begin_transaction().await.unwrap();
    add_customer(&db, "user4").await;
    tx.rollback().await.unwrap();

    assert_eq!(customer_count(&db).await, Some(SqlValue::Int(3)));
}

#[tokio::test]
async fn test_nested_savepoint_rollback() {
    let db = common::connect().await;
    let mut outer = db.begin_transaction().await.unwrap();
    add_customer(&db, "outer").await;

    let mut inner = db.begin_transaction().await.unwrap();
    assert_eq!(inner.level(), 2);
    assert_eq!(db.transaction_level(), 2);
    add_customer(&db, "inner").await;
    inner.rollback().await.unwrap();
    assert_eq!(db.transaction_level(), 1);

    outer.commit().await.unwrap();
    let names = db
        .command("SELECT name FROM customer WHERE id > 3 ORDER BY id")
        .query_column()
        .await
        .unwrap();
    assert_eq!(names, vec![SqlValue::Text("outer".into())]);
}

#[tokio::test]
async fn test_nested_savepoint_release() {
    let db = common::connect().await;
    let mut outer = db.begin_transaction().await.unwrap();
    let mut inner = db.begin_transaction().await.unwrap();
    add_customer(&db, "inner").await;
    inner.commit().await.unwrap();
    outer.rollback().await.unwrap();

    assert_eq!(customer_count(&db).await, Some(SqlValue::Int(3)));
}

#[tokio::test]
async fn test_outer_commits_after_inner_dropped() {
    let db = common::connect().await;
    let mut outer = db.begin_transaction().await.unwrap();
    add_customer(&db, "outer").await;
    {
        let _inner = db.begin_transaction().await.unwrap();
        add_customer(&db, "inner").await;
    }

    outer.commit().await.unwrap();
    assert_eq!(db.transaction_level(), 0);
    let names = db
        .command("SELECT name FROM customer WHERE id > 3 ORDER BY id")
        .query_column()
        .await
        .unwrap();
    assert_eq!(names, vec![SqlValue::Text("outer".into())]);
}

#[tokio::test]
async fn test_outer_cannot_end_before_inner() {
    let db = common::connect().await;
    let mut outer = db.begin_transaction().await.unwrap();
    let mut inner = db.begin_transaction().await.unwrap();

    let err = outer.commit().await.unwrap_err();
    assert!(matches!(err, DbError::Transaction(_)), "{err:?}");
    assert!(outer.is_active());

    inner.commit().await.unwrap();
    outer.commit().await.unwrap();
    assert_eq!(db.transaction_level(), 0);
}

#[tokio::test]
async fn test_inactive_transaction_errors() {
    let db = common::connect().await;
    let mut tx = db.begin_transaction().await.unwrap();
    tx.commit().await.unwrap();

    let err = tx.commit().await.unwrap_err();
    assert!(matches!(err, DbError::Transaction(ref m) if m.contains("inactive")), "{err:?}");
    let err = tx.rollback().await.unwrap_err();
    assert!(matches!(err, DbError::Transaction(_)), "{err:?}");
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let db = common::connect().await;
    {
        let _tx = db.begin_transaction().await.unwrap();
        add_customer(&db, "lost").await;
    }
    assert_eq!(customer_count(&db).await, Some(SqlValue::Int(3)));
    assert_eq!(db.transaction_level(), 0);

    let mut tx = db.begin_transaction().await.unwrap();
    assert_eq!(tx.level(), 1);
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_close_resets_state() {
    let db = common::connect().await;
    assert!(db.is_active().await);
    db.close().await.unwrap();
    assert!(!db.is_active().await);
    assert_eq!(db.transaction_level(), 0);
}
