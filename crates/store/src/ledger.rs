//! Order ledger trait: immutable order persistence and lookups.

use async_trait::async_trait;

use common::{Order, OrderId, UserId};

use crate::error::LedgerError;

/// Trait for order ledger operations.
///
/// Orders are write-once: the ledger exposes no update or delete. The
/// read-side lookups exist for the transport layer sitting above this
/// core; the engine itself only inserts and resolves deduplication keys.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Persists one immutable order.
    ///
    /// If the order carries a dedup key that is already committed, fails
    /// with [`LedgerError::DuplicateOrder`] and persists nothing.
    async fn insert_order(&self, order: &Order) -> Result<(), LedgerError>;

    /// Fetches an order by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, LedgerError>;

    /// Fetches every committed order, oldest first. Admin listing.
    async fn list_orders(&self) -> Result<Vec<Order>, LedgerError>;

    /// Fetches all orders placed by a user, oldest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, LedgerError>;

    /// Resolves a deduplication key to the order it committed, if any.
    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Option<Order>, LedgerError>;
}
