//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{Money, Order, OrderId, OrderItem, UserId};
use sqlx::PgPool;
use store::{
    CatalogError, CatalogStore, LedgerError, OrderLedger, PgCatalogStore, PgOrderLedger,
    ProductRecord,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for the schema
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_store_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get fresh store handles with their own pool and cleared tables
async fn get_test_stores() -> (PgCatalogStore, PgOrderLedger) {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE products, orders")
        .execute(&pool)
        .await
        .unwrap();

    (PgCatalogStore::new(pool.clone()), PgOrderLedger::new(pool))
}

fn widget(stock: i64) -> ProductRecord {
    ProductRecord {
        id: "SKU-001".into(),
        name: "Widget".to_string(),
        price: Money::from_cents(1000),
        stock,
    }
}

fn test_order(dedup_key: Option<&str>) -> Order {
    let items = vec![
        OrderItem::new("SKU-001", 2, Money::from_cents(1000)),
        OrderItem::new("SKU-002", 1, Money::from_cents(500)),
    ];
    Order {
        id: OrderId::new(),
        user_id: UserId::new(),
        total_price: items.iter().map(OrderItem::line_total).sum(),
        items,
        created_at: Utc::now(),
        dedup_key: dedup_key.map(str::to_string),
    }
}

#[tokio::test]
async fn get_product_roundtrip() {
    let (catalog, _) = get_test_stores().await;
    catalog.upsert_product(&widget(5)).await.unwrap();

    let record = catalog.get_product(&"SKU-001".into()).await.unwrap();
    assert_eq!(record, widget(5));

    let missing = catalog.get_product(&"SKU-404".into()).await;
    assert!(matches!(missing, Err(CatalogError::ProductNotFound(_))));
}

#[tokio::test]
async fn conditional_decrement_succeeds_with_sufficient_stock() {
    let (catalog, _) = get_test_stores().await;
    catalog.upsert_product(&widget(5)).await.unwrap();

    let result = catalog
        .try_decrement_stock(&"SKU-001".into(), 3)
        .await
        .unwrap();
    assert_eq!(result.unit_price, Money::from_cents(1000));
    assert_eq!(result.new_stock, 2);
}

#[tokio::test]
async fn conditional_decrement_fails_and_leaves_stock_untouched() {
    let (catalog, _) = get_test_stores().await;
    catalog.upsert_product(&widget(1)).await.unwrap();

    let err = catalog
        .try_decrement_stock(&"SKU-001".into(), 2)
        .await
        .unwrap_err();
    match err {
        CatalogError::InsufficientStock {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        }
        other => panic!("expected InsufficientStock, got {other}"),
    }

    let record = catalog.get_product(&"SKU-001".into()).await.unwrap();
    assert_eq!(record.stock, 1);
}

#[tokio::test]
async fn concurrent_decrements_on_last_units_admit_exactly_one() {
    let (catalog, _) = get_test_stores().await;
    catalog.upsert_product(&widget(3)).await.unwrap();

    // Two baskets each want 2 of 3 units: exactly one may win.
    let c1 = catalog.clone();
    let c2 = catalog.clone();
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { c1.try_decrement_stock(&"SKU-001".into(), 2).await }),
        tokio::spawn(async move { c2.try_decrement_stock(&"SKU-001".into(), 2).await }),
    );

    let results = [r1.unwrap(), r2.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let record = catalog.get_product(&"SKU-001".into()).await.unwrap();
    assert_eq!(record.stock, 1);
}

#[tokio::test]
async fn increment_compensates_a_decrement() {
    let (catalog, _) = get_test_stores().await;
    catalog.upsert_product(&widget(5)).await.unwrap();

    catalog
        .try_decrement_stock(&"SKU-001".into(), 4)
        .await
        .unwrap();
    catalog
        .increment_stock(&"SKU-001".into(), 4)
        .await
        .unwrap();

    let record = catalog.get_product(&"SKU-001".into()).await.unwrap();
    assert_eq!(record.stock, 5);
}

#[tokio::test]
async fn increment_unknown_product_is_not_found() {
    let (catalog, _) = get_test_stores().await;
    let err = catalog
        .increment_stock(&"SKU-404".into(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::ProductNotFound(_)));
}

#[tokio::test]
async fn ledger_insert_and_lookups() {
    let (_, ledger) = get_test_stores().await;
    let order = test_order(None);

    ledger.insert_order(&order).await.unwrap();

    let fetched = ledger.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(fetched, order);
    assert_eq!(fetched.total_price, fetched.computed_total());

    let for_user = ledger.orders_for_user(order.user_id).await.unwrap();
    assert_eq!(for_user, vec![order.clone()]);

    let other = test_order(None);
    ledger.insert_order(&other).await.unwrap();
    let all = ledger.list_orders().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.contains(&order));
    assert!(all.contains(&other));

    let missing = ledger.get_order(OrderId::new()).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn ledger_enforces_dedup_key_uniqueness() {
    let (_, ledger) = get_test_stores().await;

    let first = test_order(Some("retry-1"));
    ledger.insert_order(&first).await.unwrap();

    let err = ledger
        .insert_order(&test_order(Some("retry-1")))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateOrder { .. }));

    let resolved = ledger.find_by_dedup_key("retry-1").await.unwrap().unwrap();
    assert_eq!(resolved.id, first.id);
}
