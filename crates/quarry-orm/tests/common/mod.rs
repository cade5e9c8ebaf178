#![allow(dead_code)]

use std::sync::Arc;

use quarry_orm::{
    ActiveRecord, Connection, ConnectionConfig, MemoryCache, Record, RelationDef, ValidationError,
};

const FIXTURE: &[&str] = &[
    "CREATE TABLE customer (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email VARCHAR(128) NOT NULL,
        name VARCHAR(128),
        address TEXT,
        status INTEGER DEFAULT 0
    )",
    "CREATE TABLE \"order\" (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER,
        created_at INTEGER NOT NULL,
        total DECIMAL(10,0) NOT NULL
    )",
    "CREATE TABLE item (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(128) NOT NULL,
        category_id INTEGER NOT NULL
    )",
    "CREATE TABLE order_item (
        order_id INTEGER NOT NULL,
        item_id INTEGER NOT NULL,
        quantity INTEGER NOT NULL,
        subtotal DECIMAL(10,0) NOT NULL,
        PRIMARY KEY (order_id, item_id)
    )",
    "CREATE TABLE bool_values (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bool_col BOOLEAN,
        default_true BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE TABLE document (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title VARCHAR(255) NOT NULL,
        content TEXT,
        version INTEGER NOT NULL DEFAULT 0
    )",
    "INSERT INTO customer (email, name, address, status) VALUES ('user1@example.com', 'user1', 'address1', 1)",
    "INSERT INTO customer (email, name, address, status) VALUES ('user2@example.com', 'user2', 'address2', 1)",
    "INSERT INTO customer (email, name, address, status) VALUES ('user3@example.com', 'user3', 'address3', 2)",
    "INSERT INTO item (name, category_id) VALUES ('Rust in Action', 1)",
    "INSERT INTO item (name, category_id) VALUES ('Programming Rust', 1)",
    "INSERT INTO item (name, category_id) VALUES ('Ice Age', 2)",
    "INSERT INTO item (name, category_id) VALUES ('Toy Story', 2)",
    "INSERT INTO item (name, category_id) VALUES ('Cars', 2)",
    "INSERT INTO \"order\" (customer_id, created_at, total) VALUES (1, 1325282384, 110)",
    "INSERT INTO \"order\" (customer_id, created_at, total) VALUES (2, 1325334482, 33)",
    "INSERT INTO \"order\" (customer_id, created_at, total) VALUES (2, 1325502201, 40)",
    "INSERT INTO order_item (order_id, item_id, quantity, subtotal) VALUES (1, 1, 1, 30)",
    "INSERT INTO order_item (order_id, item_id, quantity, subtotal) VALUES (1, 2, 2, 40)",
    "INSERT INTO order_item (order_id, item_id, quantity, subtotal) VALUES (2, 4, 1, 10)",
    "INSERT INTO order_item (order_id, item_id, quantity, subtotal) VALUES (2, 5, 1, 15)",
    "INSERT INTO order_item (order_id, item_id, quantity, subtotal) VALUES (2, 3, 1, 8)",
    "INSERT INTO order_item (order_id, item_id, quantity, subtotal) VALUES (3, 2, 1, 40)",
    "INSERT INTO document (title, content, version) VALUES ('Getting started', 'First draft of the guide', 0)",
];

async fn load_fixture(db: &Connection) {
    for sql in FIXTURE {
        db.command(*sql)
            .execute()
            .await
            .unwrap_or_else(|e| panic!("fixture statement failed: {sql}\n{e}"));
    }
}

/// A fresh in-memory database with the fixture loaded.
pub async fn connect() -> Connection {
    let db = Connection::new(ConnectionConfig::new("sqlite::memory:")).expect("valid config");
    load_fixture(&db).await;
    db
}

/// Like [`connect`] with a memory cache and the query cache enabled.
pub async fn connect_cached() -> (Connection, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let config = ConnectionConfig::new("sqlite::memory:").with_query_cache(60);
    let db = Connection::new(config)
        .expect("valid config")
        .with_cache(cache.clone());
    load_fixture(&db).await;
    (db, cache)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

macro_rules! record_access {
    () => {
        fn from_record(record: Record) -> Self {
            Self(record)
        }

        fn record(&self) -> &Record {
            &self.0
        }

        fn record_mut(&mut self) -> &mut Record {
            &mut self.0
        }
    };
}

#[derive(Debug, Clone, Default)]
pub struct Customer(pub Record);

impl ActiveRecord for Customer {
    fn table_name() -> &'static str {
        "customer"
    }

    record_access!();

    fn relation(name: &str) -> Option<RelationDef> {
        match name {
            "orders" => Some(RelationDef::has_many::<Order>(&[("customer_id", "id")]).order_by("id")),
            "expensive_orders" => Some(
                RelationDef::has_many::<Order>(&[("customer_id", "id")])
                    .and_where(quarry_orm::quarry_core::Condition::gte("total", 40))
                    .order_by("id"),
            ),
            _ => None,
        }
    }

    fn validate(&self) -> Vec<ValidationError> {
        let blank = self
            .0
            .get_attribute("email")
            .and_then(|v| v.as_str())
            .is_none_or(str::is_empty);
        if blank {
            vec![ValidationError::new("email", "Email cannot be blank.")]
        } else {
            Vec::new()
        }
    }

    fn before_save(&mut self, _insert: bool) -> bool {
        self.0.get_attribute("name").and_then(|v| v.as_str()) != Some("veto")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Order(pub Record);

impl ActiveRecord for Order {
    fn table_name() -> &'static str {
        "order"
    }

    record_access!();

    fn relation(name: &str) -> Option<RelationDef> {
        match name {
            "customer" => Some(RelationDef::has_one::<Customer>(&[("id", "customer_id")])),
            "order_items" => Some(RelationDef::has_many::<OrderItem>(&[("order_id", "id")])),
            "items" => Some(
                RelationDef::has_many::<Item>(&[("id", "item_id")])
                    .via_table("order_item", &[("order_id", "id")])
                    .order_by("id"),
            ),
            "items_via_order_items" => Some(
                RelationDef::has_many::<Item>(&[("id", "item_id")])
                    .via("order_items")
                    .order_by("id"),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Item(pub Record);

impl ActiveRecord for Item {
    fn table_name() -> &'static str {
        "item"
    }

    record_access!();
}

#[derive(Debug, Clone, Default)]
pub struct OrderItem(pub Record);

impl ActiveRecord for OrderItem {
    fn table_name() -> &'static str {
        "order_item"
    }

    fn primary_key() -> &'static [&'static str] {
        &["order_id", "item_id"]
    }

    record_access!();
}

#[derive(Debug, Clone, Default)]
pub struct Document(pub Record);

impl ActiveRecord for Document {
    fn table_name() -> &'static str {
        "document"
    }

    fn optimistic_lock() -> Option<&'static str> {
        Some("version")
    }

    record_access!();
}

/// Model over `audit_log`, a table tests create without a primary key.
#[derive(Debug, Clone, Default)]
pub struct AuditLog(pub Record);

impl ActiveRecord for AuditLog {
    fn table_name() -> &'static str {
        "audit_log"
    }

    record_access!();
}

/// Integer attribute of a model.
pub fn int_attr<M: ActiveRecord>(model: &M, name: &str) -> Option<i64> {
    model.record().get_attribute(name).and_then(|v| v.as_i64())
}

/// Text attribute of a model.
pub fn text_attr<M: ActiveRecord>(model: &M, name: &str) -> Option<String> {
    model
        .record()
        .get_attribute(name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Integer ids of models, in order.
pub fn ids<M: ActiveRecord>(models: &[M]) -> Vec<i64> {
    models.iter().filter_map(|m| int_attr(m, "id")).collect()
}
