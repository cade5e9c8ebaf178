//! Relation loading, linking and unlinking.

mod common;

use common::{ids, int_attr, Customer, Item, Order};
use quarry_core::SqlValue;
use quarry_orm::{ActiveRecord, DbError, Record};

fn record_ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .filter_map(|r| r.get_attribute("id").and_then(SqlValue::as_i64))
        .collect()
}

fn related_ids(record: &Record, name: &str) -> Vec<i64> {
    record.related(name).map(|r| record_ids(r.records())).unwrap_or_default()
}

#[tokio::test]
async fn test_lazy_has_many_is_cached() {
    common::init_tracing();
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 2).await.unwrap().unwrap();
    assert!(!customer.record().is_relation_populated("orders"));

    let orders: Vec<Order> = customer.related_many(&db, "orders").await.unwrap();
    assert_eq!(ids(&orders), vec![2, 3]);
    assert!(customer.record().is_relation_populated("orders"));

    db.command("DELETE FROM \"order\"").execute().await.unwrap();
    let cached: Vec<Order> = customer.related_many(&db, "orders").await.unwrap();
    assert_eq!(ids(&cached), vec![2, 3]);
}

#[tokio::test]
async fn test_lazy_has_one() {
    let db = common::connect().await;
    let mut order = Order::find_by_pk(&db, 1).await.unwrap().unwrap();
    let customer: Option<Customer> = order.related_one(&db, "customer").await.unwrap();
    assert_eq!(customer.and_then(|c| int_attr(&c, "id")), Some(1));

    let mut orphan = Order::default();
    orphan.record_mut().set_attribute("customer_id", SqlValue::Null);
    let none: Option<Customer> = orphan.related_one(&db, "customer").await.unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_relation_with_condition() {
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 2).await.unwrap().unwrap();
    let orders: Vec<Order> = customer.related_many(&db, "expensive_orders").await.unwrap();
    assert_eq!(ids(&orders), vec![3]);
}

#[tokio::test]
async fn test_via_table_and_via_relation() {
    let db = common::connect().await;
    let mut order = Order::find_by_pk(&db, 2).await.unwrap().unwrap();
    let items: Vec<Item> = order.related_many(&db, "items").await.unwrap();
    assert_eq!(ids(&items), vec![3, 4, 5]);

    let via: Vec<Item> = order.related_many(&db, "items_via_order_items").await.unwrap();
    assert_eq!(ids(&via), vec![3, 4, 5]);
}

#[tokio::test]
async fn test_eager_loading() {
    let db = common::connect().await;
    let customers = Customer::find().with("orders").order_by("id").all(&db).await.unwrap();
    let counts: Vec<usize> = customers
        .iter()
        .map(|c| c.record().related("orders").map_or(0, |r| r.records().len()))
        .collect();
    assert_eq!(counts, vec![1, 2, 0]);
    assert!(customers[2].record().is_relation_populated("orders"));

    let orders = Order::find().with("items").order_by("id").all(&db).await.unwrap();
    let items: Vec<Vec<i64>> = orders.iter().map(|o| related_ids(o.record(), "items")).collect();
    assert_eq!(items, vec![vec![1, 2], vec![3, 4, 5], vec![2]]);
}

#[tokio::test]
async fn test_nested_eager_loading() {
    let db = common::connect().await;
    let customer = Customer::find()
        .with("orders.items")
        .where_clause(quarry_core::Condition::eq("id", 2))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let orders = customer.record().related("orders").unwrap().records();
    assert_eq!(record_ids(orders), vec![2, 3]);
    assert_eq!(related_ids(&orders[0], "items"), vec![3, 4, 5]);
    assert_eq!(related_ids(&orders[1], "items"), vec![2]);
}

#[tokio::test]
async fn test_populate_relations_on_model() {
    let db = common::connect().await;
    let mut order = Order::find_by_pk(&db, 3).await.unwrap().unwrap();
    order.populate_relations(&db, &["customer", "items"]).await.unwrap();
    assert_eq!(related_ids(order.record(), "customer"), vec![2]);
    assert_eq!(related_ids(order.record(), "items"), vec![2]);
}

#[tokio::test]
async fn test_link_has_many() {
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 3).await.unwrap().unwrap();
    let loaded: Vec<Order> = customer.related_many(&db, "orders").await.unwrap();
    assert!(loaded.is_empty());

    let mut order = Order::default();
    order.record_mut().set_attribute("created_at", 1_325_502_201);
    order.record_mut().set_attribute("total", 10);
    customer.link(&db, "orders", &mut order, &[]).await.unwrap();

    assert!(!order.is_new_record());
    assert_eq!(int_attr(&order, "customer_id"), Some(3));
    let cached: Vec<Order> = customer.related_many(&db, "orders").await.unwrap();
    assert_eq!(ids(&cached), vec![4]);

    let stored = Order::find_by_pk(&db, 4).await.unwrap().unwrap();
    assert_eq!(int_attr(&stored, "customer_id"), Some(3));
}

#[tokio::test]
async fn test_link_via_table() {
    let db = common::connect().await;
    let mut order = Order::find_by_pk(&db, 3).await.unwrap().unwrap();
    let mut item = Item::find_by_pk(&db, 1).await.unwrap().unwrap();
    order
        .link(
            &db,
            "items",
            &mut item,
            &[("quantity", SqlValue::Int(3)), ("subtotal", SqlValue::Int(90))],
        )
        .await
        .unwrap();

    let mut fresh = Order::find_by_pk(&db, 3).await.unwrap().unwrap();
    let items: Vec<Item> = fresh.related_many(&db, "items").await.unwrap();
    assert_eq!(ids(&items), vec![1, 2]);
    let quantity = db
        .command("SELECT quantity FROM order_item WHERE order_id = 3 AND item_id = 1")
        .query_scalar()
        .await
        .unwrap();
    assert_eq!(quantity, Some(SqlValue::Int(3)));
}

#[tokio::test]
async fn test_unlink_via_table_deletes_pivot() {
    let db = common::connect().await;
    let mut order = Order::find_by_pk(&db, 2).await.unwrap().unwrap();
    let loaded: Vec<Item> = order.related_many(&db, "items").await.unwrap();
    assert_eq!(loaded.len(), 3);

    let mut item = Item::find_by_pk(&db, 4).await.unwrap().unwrap();
    order.unlink(&db, "items", &mut item, true).await.unwrap();
    assert_eq!(related_ids(order.record(), "items"), vec![3, 5]);

    let pivots = db
        .command("SELECT COUNT(*) FROM order_item WHERE order_id = 2")
        .query_scalar()
        .await
        .unwrap();
    assert_eq!(pivots, Some(SqlValue::Int(2)));
    assert!(Item::find_by_pk(&db, 4).await.unwrap().is_some());
}

#[tokio::test]
async fn test_unlink_nulls_foreign_key() {
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 2).await.unwrap().unwrap();
    let mut orders: Vec<Order> = customer.related_many(&db, "orders").await.unwrap();
    customer.unlink(&db, "orders", &mut orders[0], false).await.unwrap();

    assert_eq!(related_ids(customer.record(), "orders"), vec![3]);
    let order = Order::find_by_pk(&db, 2).await.unwrap().unwrap();
    assert_eq!(order.record().get_attribute("customer_id"), Some(&SqlValue::Null));
}

#[tokio::test]
async fn test_link_rejects_new_models() {
    let db = common::connect().await;
    let mut customer = Customer::default();
    let mut order = Order::default();
    let err = customer.link(&db, "orders", &mut order, &[]).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidCall(ref m) if m.contains("is null")), "{err:?}");

    let mut existing = Order::find_by_pk(&db, 1).await.unwrap().unwrap();
    let mut item = Item::default();
    let err = existing.link(&db, "items", &mut item, &[]).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidCall(ref m) if m.contains("newly created")), "{err:?}");
}

#[tokio::test]
async fn test_unknown_relation() {
    let db = common::connect().await;
    let mut customer = Customer::find_by_pk(&db, 1).await.unwrap().unwrap();
    let err = customer.related_many::<Order>(&db, "nope").await.unwrap_err();
    assert!(matches!(err, DbError::InvalidCall(ref m) if m == "Unknown relation: nope"), "{err:?}");
    assert!(Customer::find().with("nope").all(&db).await.is_err());
}
