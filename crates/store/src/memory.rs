//! In-memory store implementations for testing and single-process use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{Money, Order, OrderId, ProductId, UserId};

use crate::catalog::{CatalogStore, ProductRecord, StockDecrement};
use crate::error::{CatalogError, LedgerError};
use crate::ledger::OrderLedger;

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, ProductRecord>,
    fail_on_decrement: bool,
    fail_on_increment: bool,
    decrement_delay: Option<Duration>,
}

/// In-memory catalog store.
///
/// The write lock held across check-and-mutate makes each trait method the
/// atomic unit, matching the conditional-decrement contract the Postgres
/// implementation gets from a guarded `UPDATE`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    /// Creates a new empty in-memory catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a product record.
    pub async fn insert_product(&self, record: ProductRecord) {
        self.state
            .write()
            .await
            .products
            .insert(record.id.clone(), record);
    }

    /// Convenience seeding helper.
    pub async fn seed(&self, id: impl Into<ProductId>, price: Money, stock: i64) {
        let id = id.into();
        self.insert_product(ProductRecord {
            name: id.as_str().to_string(),
            id,
            price,
            stock,
        })
        .await;
    }

    /// Removes a product record.
    pub async fn remove_product(&self, id: &ProductId) {
        self.state.write().await.products.remove(id);
    }

    /// Returns the current stock level of a product.
    pub async fn stock_of(&self, id: &ProductId) -> Option<i64> {
        self.state.read().await.products.get(id).map(|p| p.stock)
    }

    /// Configures decrement calls to fail as if the store were down.
    pub async fn set_fail_on_decrement(&self, fail: bool) {
        self.state.write().await.fail_on_decrement = fail;
    }

    /// Configures increment (compensation) calls to fail.
    pub async fn set_fail_on_increment(&self, fail: bool) {
        self.state.write().await.fail_on_increment = fail;
    }

    /// Injects latency before each decrement, for timeout tests.
    pub async fn set_decrement_delay(&self, delay: Option<Duration>) {
        self.state.write().await.decrement_delay = delay;
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<ProductRecord, CatalogError> {
        self.state
            .read()
            .await
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::ProductNotFound(id.clone()))
    }

    async fn try_decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, CatalogError> {
        let delay = self.state.read().await.decrement_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;

        if state.fail_on_decrement {
            return Err(CatalogError::Unavailable("injected failure".to_string()));
        }

        let product = state
            .products
            .get_mut(id)
            .ok_or_else(|| CatalogError::ProductNotFound(id.clone()))?;

        if product.stock < quantity as i64 {
            return Err(CatalogError::InsufficientStock {
                product_id: id.clone(),
                requested: quantity,
                available: product.stock,
            });
        }

        product.stock -= quantity as i64;
        Ok(StockDecrement {
            unit_price: product.price,
            new_stock: product.stock,
        })
    }

    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<(), CatalogError> {
        let mut state = self.state.write().await;

        if state.fail_on_increment {
            return Err(CatalogError::Unavailable("injected failure".to_string()));
        }

        let product = state
            .products
            .get_mut(id)
            .ok_or_else(|| CatalogError::ProductNotFound(id.clone()))?;

        product.stock += quantity as i64;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    orders: Vec<Order>,
    fail_on_insert: bool,
}

/// In-memory order ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Configures insert calls to fail as if persistence were down.
    pub async fn set_fail_on_insert(&self, fail: bool) {
        self.state.write().await.fail_on_insert = fail;
    }
}

#[async_trait]
impl OrderLedger for InMemoryLedger {
    async fn insert_order(&self, order: &Order) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;

        if state.fail_on_insert {
            return Err(LedgerError::Unavailable("injected failure".to_string()));
        }

        if let Some(key) = &order.dedup_key
            && state
                .orders
                .iter()
                .any(|o| o.dedup_key.as_deref() == Some(key.as_str()))
        {
            return Err(LedgerError::DuplicateOrder {
                dedup_key: key.clone(),
            });
        }

        state.orders.push(order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.orders.clone())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Option<Order>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .find(|o| o.dedup_key.as_deref() == Some(dedup_key))
            .cloned())
    }
}
