//! Active record lifecycle: finding, inserting, updating and deleting.

mod common;

use common::{ids, int_attr, text_attr, AuditLog, Customer, Document, OrderItem};
use quarry_core::{Condition, Params, SqlValue};
use quarry_orm::{ActiveRecord, DbError, Record, RecordState};

#[tokio::test]
async fn test_find_by_pk_tracks_changes() {
    common::init_tracing();
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 2).await.unwrap().unwrap();
    assert_eq!(customer.record().state(), RecordState::Clean);
    assert_eq!(text_attr(&customer, "name").as_deref(), Some("user2"));
    assert_eq!(int_attr(&customer, "status"), Some(1));

    customer.record_mut().set_attribute("name", "user2 renamed");
    assert_eq!(customer.record().state(), RecordState::Dirty);
    assert!(customer.record().is_attribute_changed("name"));
    assert_eq!(customer.record().dirty_attributes(None).len(), 1);

    let rows = customer.update(&db, true, None).await.unwrap();
    assert_eq!(rows, Some(1));
    assert_eq!(customer.record().state(), RecordState::Clean);

    let reloaded = Customer::find_by_pk(&db, 2).await.unwrap().unwrap();
    assert_eq!(text_attr(&reloaded, "name").as_deref(), Some("user2 renamed"));
    assert!(customer.equals(&db, &reloaded).await.unwrap());

    assert!(Customer::find_by_pk(&db, 42).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_without_changes_writes_nothing() {
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 1).await.unwrap().unwrap();
    customer.record_mut().set_attribute("name", "user1");
    assert_eq!(customer.update(&db, true, None).await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_composite_key_needs_condition() {
    let db = common::connect().await;
    let err = OrderItem::find_by_pk(&db, 1).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidCall(_)), "{err:?}");

    let item = OrderItem::find_one(&db, Condition::hash([("order_id", 2), ("item_id", 5)]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(int_attr(&item, "quantity"), Some(1));
    assert_eq!(
        item.primary_key_value(&db).await.unwrap(),
        vec![SqlValue::Int(2), SqlValue::Int(5)]
    );
}

#[tokio::test]
async fn test_insert_reads_back_key() {
    let db = common::connect().await;
    let mut customer = Customer::default();
    assert!(customer.is_new_record());
    customer.record_mut().set_attributes([
        ("email", SqlValue::Text("user4@example.com".into())),
        ("name", SqlValue::Text("user4".into())),
        ("address", SqlValue::Text("address4".into())),
    ]);

    assert!(customer.insert(&db, true, None).await.unwrap());
    assert!(!customer.is_new_record());
    assert_eq!(int_attr(&customer, "id"), Some(4));
    assert_eq!(customer.record().old_attributes(), Some(customer.record().attributes()));
    assert_eq!(Customer::find().count(&db, "*").await.unwrap(), 4);
}

#[tokio::test]
async fn test_save_dispatches_on_state() {
    let db = common::connect().await;
    let mut customer = Customer(Record::new());
    customer.record_mut().set_attribute("email", "user4@example.com");
    assert!(customer.save(&db, true).await.unwrap());

    customer.record_mut().set_attribute("status", 7);
    assert!(customer.save(&db, true).await.unwrap());
    let status = Customer::find()
        .select(["status"])
        .where_clause(Condition::eq("id", 4))
        .scalar(&db)
        .await
        .unwrap();
    assert_eq!(status, Some(SqlValue::Int(7)));
}

#[tokio::test]
async fn test_validation_and_veto() {
    let db = common::connect().await;
    let mut blank = Customer::default();
    blank.record_mut().set_attribute("name", "nobody");
    let err = blank.insert(&db, true, None).await.unwrap_err();
    match err {
        DbError::Validation(errors) => assert_eq!(errors[0].attribute, "email"),
        other => panic!("expected a validation error, got {other:?}"),
    }

    let mut vetoed = Customer::default();
    vetoed.record_mut().set_attribute("email", "veto@example.com");
    vetoed.record_mut().set_attribute("name", "veto");
    assert!(!vetoed.insert(&db, true, None).await.unwrap());
    assert!(vetoed.is_new_record());
    assert_eq!(Customer::find().count(&db, "*").await.unwrap(), 3);
}

#[tokio::test]
async fn test_new_record_cannot_update_or_delete() {
    let db = common::connect().await;
    let mut customer = Customer::default();
    assert!(matches!(customer.update(&db, false, None).await, Err(DbError::InvalidCall(_))));
    assert!(matches!(customer.delete(&db).await, Err(DbError::InvalidCall(_))));
}

#[tokio::test]
async fn test_optimistic_lock() {
    let db = common::connect().await;
    let mut first = Document::find_by_pk(&db, 1).await.unwrap().unwrap();
    let mut second = Document::find_by_pk(&db, 1).await.unwrap().unwrap();

    first.record_mut().set_attribute("title", "Revised");
    assert_eq!(first.update(&db, false, None).await.unwrap(), Some(1));
    assert_eq!(int_attr(&first, "version"), Some(1));

    second.record_mut().set_attribute("title", "Conflicting");
    let err = second.update(&db, false, None).await.unwrap_err();
    assert!(err.is_stale_object(), "{err:?}");

    let err = second.delete(&db).await.unwrap_err();
    assert!(matches!(err, DbError::StaleObject(ref m) if m.contains("deleted")), "{err:?}");

    assert_eq!(first.delete(&db).await.unwrap(), Some(1));
    assert_eq!(Document::find().count(&db, "*").await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_marks_record() {
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 3).await.unwrap().unwrap();
    assert_eq!(customer.delete(&db).await.unwrap(), Some(1));
    assert_eq!(customer.record().state(), RecordState::Deleted);
    assert!(customer.is_new_record());
    assert!(Customer::find_by_pk(&db, 3).await.unwrap().is_none());
    let err = customer.delete(&db).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidCall(_)), "{err:?}");
}

#[tokio::test]
async fn test_save_after_delete_inserts_again() {
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 3).await.unwrap().unwrap();
    customer.delete(&db).await.unwrap();

    assert!(customer.save(&db, false).await.unwrap());
    assert!(!customer.is_new_record());
    assert_eq!(customer.record().state(), RecordState::Clean);
    let restored = Customer::find_by_pk(&db, 3).await.unwrap().unwrap();
    assert_eq!(text_attr(&restored, "email").as_deref(), Some("user3@example.com"));
}

#[tokio::test]
async fn test_update_counters_on_dirty_counter() {
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 3).await.unwrap().unwrap();
    customer.record_mut().set_attribute("status", 10);

    assert!(customer.update_counters(&db, &[("status", 1)]).await.unwrap());
    assert_eq!(int_attr(&customer, "status"), Some(11));
    assert_eq!(
        customer.record().old_attribute("status").and_then(SqlValue::as_i64),
        Some(11)
    );
    assert!(!customer.record().is_attribute_changed("status"));
    let fresh = Customer::find_by_pk(&db, 3).await.unwrap().unwrap();
    assert_eq!(int_attr(&fresh, "status"), Some(3));
}

#[tokio::test]
async fn test_table_without_primary_key() {
    let db = common::connect().await;
    db.command("CREATE TABLE audit_log (message TEXT NOT NULL)")
        .execute()
        .await
        .unwrap();
    let err = AuditLog::primary_key_columns(&db).await.unwrap_err();
    assert!(
        matches!(err, DbError::Configuration(ref m) if m.contains("audit_log")),
        "{err:?}"
    );
    assert!(matches!(
        AuditLog::find_by_pk(&db, 1).await.unwrap_err(),
        DbError::Configuration(_)
    ));
}

#[tokio::test]
async fn test_refresh_discards_local_changes() {
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 1).await.unwrap().unwrap();
    customer.record_mut().set_attribute("name", "local only");
    db.command("UPDATE customer SET address = 'moved' WHERE id = 1")
        .execute()
        .await
        .unwrap();

    assert!(customer.refresh(&db).await.unwrap());
    assert_eq!(text_attr(&customer, "name").as_deref(), Some("user1"));
    assert_eq!(text_attr(&customer, "address").as_deref(), Some("moved"));
    assert_eq!(customer.record().state(), RecordState::Clean);

    Customer::delete_all(&db, Some(&Condition::eq("id", 1))).await.unwrap();
    assert!(!customer.refresh(&db).await.unwrap());
}

#[tokio::test]
async fn test_update_attributes_and_counters() {
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 2).await.unwrap().unwrap();
    customer.record_mut().set_attribute("address", "unsaved");

    let rows = customer
        .update_attributes(&db, &[("name", SqlValue::Text("renamed".into()))])
        .await
        .unwrap();
    assert_eq!(rows, 1);
    assert!(!customer.record().is_attribute_changed("name"));
    assert!(customer.record().is_attribute_changed("address"));

    assert!(customer.update_counters(&db, &[("status", 3)]).await.unwrap());
    assert_eq!(int_attr(&customer, "status"), Some(4));
    let fresh = Customer::find_by_pk(&db, 2).await.unwrap().unwrap();
    assert_eq!(int_attr(&fresh, "status"), Some(4));
    assert_eq!(text_attr(&fresh, "address").as_deref(), Some("address2"));
}

#[tokio::test]
async fn test_static_writes() {
    let db = common::connect().await;
    let rows = Customer::update_all_counters(&db, &[("status".to_string(), 10)], None)
        .await
        .unwrap();
    assert_eq!(rows, 3);
    let high = Customer::find_all(&db, Condition::gt("status", 10)).await.unwrap();
    assert_eq!(ids(&high), vec![1, 2, 3]);

    let removed = Customer::delete_all(&db, Some(&Condition::eq("status", 12))).await.unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn test_find_by_sql() {
    let db = common::connect().await;
    let mut params = Params::new();
    params.set(":status", 1);
    let customers = Customer::find_by_sql(&db, "SELECT * FROM customer WHERE status = :status ORDER BY id DESC", params)
        .await
        .unwrap();
    assert_eq!(ids(&customers), vec![2, 1]);
    assert!(customers.iter().all(|c| !c.is_new_record()));
}

#[tokio::test]
async fn test_active_query_shapes() {
    let db = common::connect().await;
    let query = Customer::find().where_clause(Condition::eq("status", 1));
    assert_eq!(query.count(&db, "*").await.unwrap(), 2);
    assert!(query.exists(&db).await.unwrap());
    assert!(!Customer::find()
        .where_clause(Condition::eq("status", 9))
        .exists(&db)
        .await
        .unwrap());

    let err = Customer::find()
        .where_clause(Condition::eq("id", 99))
        .one_or_fail(&db)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound), "{err:?}");

    let indexed = Customer::find().index_by("name").all_indexed(&db).await.unwrap();
    let keys: Vec<&str> = indexed.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, ["user1", "user2", "user3"]);

    let newest = Customer::find().order_by("id DESC").one(&db).await.unwrap().unwrap();
    assert_eq!(int_attr(&newest, "id"), Some(3));

    let max = Customer::find().max(&db, "status").await.unwrap();
    assert_eq!(max, Some(SqlValue::Int(2)));
}
