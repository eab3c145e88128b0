//! Catalog store trait: product records and atomic stock mutation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::{Money, ProductId};

use crate::error::CatalogError;

/// A product record as held by the catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product identifier (SKU).
    pub id: ProductId,

    /// Human-readable product name.
    pub name: String,

    /// Current unit price, non-negative.
    pub price: Money,

    /// Units on hand, never negative.
    pub stock: i64,
}

/// Result of a successful conditional stock decrement.
///
/// Carries the unit price read in the same store operation that applied
/// the decrement, so the purchase price is frozen at exactly that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDecrement {
    /// Unit price in effect when the decrement committed.
    pub unit_price: Money,

    /// Stock level after the decrement.
    pub new_stock: i64,
}

/// Trait for catalog store operations.
///
/// `try_decrement_stock` must be indivisible at the storage layer with
/// respect to concurrent callers: two simultaneous decrements on a product
/// with insufficient combined stock must not both succeed. Implementations
/// must never let stock go negative.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetches a product record by ID.
    async fn get_product(&self, id: &ProductId) -> Result<ProductRecord, CatalogError>;

    /// Decrements stock by `quantity` only if at least that much is
    /// available; otherwise fails with
    /// [`CatalogError::InsufficientStock`] carrying the available amount.
    async fn try_decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, CatalogError>;

    /// Increments stock by `quantity`. Used to compensate a reservation
    /// that cannot be completed as part of a whole basket.
    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<(), CatalogError>;
}
