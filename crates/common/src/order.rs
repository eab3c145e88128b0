//! The immutable order record and its line items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{OrderId, ProductId, UserId};
use crate::money::Money;

/// A line of a committed order.
///
/// The unit price is the one in effect at the moment the stock decrement
/// for this line committed, not the price at read or display time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product the line reserves.
    pub product_id: ProductId,

    /// Quantity reserved.
    pub quantity: u32,

    /// Price per unit, frozen at reservation.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the total price for this line (quantity × unit_price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order as persisted by the ledger.
///
/// Immutable once committed: this core never updates or deletes a
/// persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,

    /// The user who placed the order.
    pub user_id: UserId,

    /// Lines, one per distinct product.
    pub items: Vec<OrderItem>,

    /// Exact sum of the line totals.
    pub total_price: Money,

    /// Commit timestamp.
    pub created_at: DateTime<Utc>,

    /// Caller-supplied deduplication token, if any.
    pub dedup_key: Option<String>,
}

impl Order {
    /// Recomputes the sum of line totals.
    pub fn computed_total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_is_quantity_times_unit_price() {
        let item = OrderItem::new("SKU-001", 3, Money::from_cents(1000));
        assert_eq!(item.line_total().cents(), 3000);
    }

    #[test]
    fn computed_total_matches_stored_total() {
        let items = vec![
            OrderItem::new("SKU-001", 2, Money::from_cents(1000)),
            OrderItem::new("SKU-002", 1, Money::from_cents(500)),
        ];
        let order = Order {
            id: OrderId::new(),
            user_id: UserId::new(),
            total_price: items.iter().map(OrderItem::line_total).sum(),
            items,
            created_at: Utc::now(),
            dedup_key: None,
        };
        assert_eq!(order.total_price, order.computed_total());
        assert_eq!(order.total_price.cents(), 2500);
    }

    #[test]
    fn order_serialization_roundtrip() {
        let order = Order {
            id: OrderId::new(),
            user_id: UserId::new(),
            items: vec![OrderItem::new("SKU-001", 2, Money::from_cents(999))],
            total_price: Money::from_cents(1998),
            created_at: Utc::now(),
            dedup_key: Some("retry-abc".to_string()),
        };
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
