//! Order recorder: builds and persists the immutable order.

use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, warn};

use common::{Order, OrderId, UserId};
use store::{LedgerError, OrderLedger};

use crate::error::CheckoutError;
use crate::reservation::ReservedBasket;

/// Outcome of a record attempt.
#[derive(Debug)]
pub enum RecordOutcome {
    /// The order committed; decrements are now final.
    Committed(Order),

    /// A racing retry with the same dedup key committed first. The
    /// caller must compensate this reservation and resolve the key to
    /// the committed order.
    Duplicate { dedup_key: String },
}

/// Writes reserved baskets to the order ledger.
pub struct OrderRecorder<L: OrderLedger> {
    ledger: L,
    store_timeout: Duration,
}

impl<L: OrderLedger> OrderRecorder<L> {
    /// Creates a new order recorder.
    pub fn new(ledger: L, store_timeout: Duration) -> Self {
        Self {
            ledger,
            store_timeout,
        }
    }

    /// Persists one immutable order for the reserved basket.
    ///
    /// A persistence failure here leaves the reservation orphaned; the
    /// coordinator compensates it and surfaces the error as
    /// `OrderCreationFailed`.
    #[tracing::instrument(skip(self, reserved), fields(user_id = %user_id))]
    pub async fn record(
        &self,
        user_id: UserId,
        reserved: &ReservedBasket,
        dedup_key: Option<String>,
    ) -> Result<RecordOutcome, CheckoutError> {
        let order = Order {
            id: OrderId::new(),
            user_id,
            items: reserved.items.clone(),
            total_price: reserved.total_price,
            created_at: Utc::now(),
            dedup_key,
        };

        let inserted = timeout(self.store_timeout, self.ledger.insert_order(&order)).await;

        match inserted {
            Ok(Ok(())) => {
                debug!(order_id = %order.id, total = %order.total_price, "order persisted");
                Ok(RecordOutcome::Committed(order))
            }
            Ok(Err(LedgerError::DuplicateOrder { dedup_key })) => {
                debug!(dedup_key = %dedup_key, "order already committed by a racing retry");
                Ok(RecordOutcome::Duplicate { dedup_key })
            }
            Ok(Err(ledger_err)) => {
                warn!(error = %ledger_err, "order persistence failed");
                Err(CheckoutError::OrderCreationFailed(ledger_err.to_string()))
            }
            Err(_elapsed) => {
                warn!("order persistence timed out");
                Err(CheckoutError::OrderCreationFailed(
                    "ledger operation timed out".to_string(),
                ))
            }
        }
    }
}
