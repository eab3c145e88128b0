//! Shared value types for the order placement engine.
//!
//! Everything here is a plain value: typed identifiers, money in integer
//! minor units, and the immutable order record the ledger persists.

pub mod ids;
pub mod money;
pub mod order;

pub use ids::{OrderId, ProductId, UserId};
pub use money::Money;
pub use order::{Order, OrderItem};
