//! PostgreSQL-backed store implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{Money, Order, OrderId, OrderItem, ProductId, UserId};

use crate::catalog::{CatalogStore, ProductRecord, StockDecrement};
use crate::error::{CatalogError, LedgerError};
use crate::ledger::OrderLedger;

/// Name of the partial unique index enforcing dedup-key uniqueness.
const DEDUP_KEY_INDEX: &str = "orders_dedup_key_idx";

/// PostgreSQL-backed catalog store.
///
/// The conditional decrement is a single guarded `UPDATE`, so it is atomic
/// with respect to every other connection, including ones from other
/// service instances sharing the database.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    /// Creates a new PostgreSQL catalog store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Inserts or replaces a product record. Seeding/admin helper; the
    /// engine itself only reads and conditionally mutates stock.
    pub async fn upsert_product(&self, record: &ProductRecord) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock
            "#,
        )
        .bind(record.id.as_str())
        .bind(&record.name)
        .bind(record.price.cents())
        .bind(record.stock)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<ProductRecord, CatalogError> {
        Ok(ProductRecord {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
        })
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get_product(&self, id: &ProductId) -> Result<ProductRecord, CatalogError> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(CatalogError::ProductNotFound(id.clone())),
        }
    }

    async fn try_decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, CatalogError> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2
            WHERE id = $1 AND stock >= $2
            RETURNING price_cents, stock
            "#,
        )
        .bind(id.as_str())
        .bind(quantity as i64)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = &row {
            return Ok(StockDecrement {
                unit_price: Money::from_cents(row.try_get("price_cents")?),
                new_stock: row.try_get("stock")?,
            });
        }

        // No row updated: either the product is missing or stock is short.
        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match available {
            Some(available) => Err(CatalogError::InsufficientStock {
                product_id: id.clone(),
                requested: quantity,
                available,
            }),
            None => Err(CatalogError::ProductNotFound(id.clone())),
        }
    }

    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<(), CatalogError> {
        let result = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(quantity as i64)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::ProductNotFound(id.clone()));
        }

        Ok(())
    }
}

/// PostgreSQL-backed order ledger.
///
/// Line items are stored as a JSONB column; the order row is write-once.
#[derive(Clone)]
pub struct PgOrderLedger {
    pool: PgPool,
}

impl PgOrderLedger {
    /// Creates a new PostgreSQL order ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: PgRow) -> Result<Order, LedgerError> {
        let items: Vec<OrderItem> = serde_json::from_value(row.try_get("items")?)?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            items,
            total_price: Money::from_cents(row.try_get("total_cents")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            dedup_key: row.try_get("dedup_key")?,
        })
    }
}

#[async_trait]
impl OrderLedger for PgOrderLedger {
    async fn insert_order(&self, order: &Order) -> Result<(), LedgerError> {
        let items = serde_json::to_value(&order.items)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, items, total_cents, created_at, dedup_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(items)
        .bind(order.total_price.cents())
        .bind(order.created_at)
        .bind(&order.dedup_key)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Unique-index violation on the dedup key means a racing retry
            // already committed this order.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(DEDUP_KEY_INDEX)
                && let Some(key) = &order.dedup_key
            {
                return LedgerError::DuplicateOrder {
                    dedup_key: key.clone(),
                };
            }
            LedgerError::Database(e)
        })?;

        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, items, total_cents, created_at, dedup_key
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders(&self) -> Result<Vec<Order>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, items, total_cents, created_at, dedup_key
            FROM orders
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, items, total_cents, created_at, dedup_key
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Option<Order>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, items, total_cents, created_at, dedup_key
            FROM orders
            WHERE dedup_key = $1
            "#,
        )
        .bind(dedup_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }
}
