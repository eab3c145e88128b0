//! Inventory reservation engine.
//!
//! Applies one atomic conditional decrement per distinct product, in
//! ascending product-ID order, and reverses every applied decrement in
//! reverse order as soon as anything fails.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, warn};

use common::{Money, OrderItem, ProductId};
use store::CatalogStore;

use crate::basket::ValidatedBasket;
use crate::error::{CheckoutError, UnreconciledDecrement};

/// Result of a fully reserved basket: order items with unit prices frozen
/// at the moment of each decrement, and the exact integer total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedBasket {
    /// One item per distinct product, ascending by product ID.
    pub items: Vec<OrderItem>,

    /// Exact sum of the line totals.
    pub total_price: Money,
}

impl ReservedBasket {
    /// The decrements this reservation applied, in application order.
    /// Feeding this to [`ReservationEngine::compensate`] releases the
    /// reservation.
    pub fn decrements(&self) -> Vec<(ProductId, u32)> {
        self.items
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity))
            .collect()
    }
}

/// Drives conditional stock decrements against the catalog store.
///
/// All stock mutation goes through the store's atomic operations, never an
/// in-process lock, so the engine stays correct when the store is shared
/// by multiple service instances.
pub struct ReservationEngine<C: CatalogStore> {
    catalog: C,
    store_timeout: Duration,
}

impl<C: CatalogStore> ReservationEngine<C> {
    /// Creates a new reservation engine.
    pub fn new(catalog: C, store_timeout: Duration) -> Self {
        Self {
            catalog,
            store_timeout,
        }
    }

    /// Reserves stock for every line of the basket.
    ///
    /// Lines are processed sequentially, never in parallel, so the
    /// ascending-product-ID ordering guarantee holds. On any failure the
    /// already-applied decrements are compensated before the error is
    /// returned; a basket never leaves a partial, externally visible
    /// effect.
    #[tracing::instrument(skip(self, basket), fields(lines = basket.len()))]
    pub async fn reserve(&self, basket: &ValidatedBasket) -> Result<ReservedBasket, CheckoutError> {
        let mut applied: Vec<(ProductId, u32)> = Vec::new();
        let mut items: Vec<OrderItem> = Vec::new();

        for line in basket.items() {
            let decremented = timeout(
                self.store_timeout,
                self.catalog
                    .try_decrement_stock(&line.product_id, line.quantity),
            )
            .await;

            match decremented {
                Ok(Ok(decrement)) => {
                    debug!(
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        new_stock = decrement.new_stock,
                        "stock reserved"
                    );
                    applied.push((line.product_id.clone(), line.quantity));
                    items.push(OrderItem::new(
                        line.product_id.clone(),
                        line.quantity,
                        decrement.unit_price,
                    ));
                }
                Ok(Err(store_err)) => {
                    let err = CheckoutError::from(store_err);
                    warn!(
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        error = %err,
                        "reservation failed, compensating applied decrements"
                    );
                    self.compensate(&applied).await?;
                    return Err(err);
                }
                Err(_elapsed) => {
                    warn!(
                        product_id = %line.product_id,
                        timeout_ms = self.store_timeout.as_millis() as u64,
                        "store operation timed out, compensating applied decrements"
                    );
                    self.compensate(&applied).await?;
                    return Err(CheckoutError::Timeout {
                        operation: format!("decrement {}", line.product_id),
                    });
                }
            }
        }

        let total_price = items.iter().map(OrderItem::line_total).sum();
        Ok(ReservedBasket { items, total_price })
    }

    /// Releases applied decrements, in reverse application order.
    ///
    /// Idempotent by construction: only decrements that actually applied
    /// are in the list, so releasing a reservation that was never applied
    /// is a no-op. Best-effort: a failed compensating increment does not
    /// stop the loop, every remaining decrement is still attempted, and
    /// everything left unreconciled is escalated together in
    /// [`CheckoutError::CompensationFailed`] for operator reconciliation.
    pub async fn compensate(&self, applied: &[(ProductId, u32)]) -> Result<(), CheckoutError> {
        let mut unreconciled: Vec<UnreconciledDecrement> = Vec::new();

        for (product_id, quantity) in applied.iter().rev() {
            let result = timeout(
                self.store_timeout,
                self.catalog.increment_stock(product_id, *quantity),
            )
            .await;

            match result {
                Ok(Ok(())) => {
                    metrics::counter!("reservations_compensated_total").increment(1);
                    debug!(product_id = %product_id, quantity, "reservation released");
                }
                Ok(Err(store_err)) => {
                    metrics::counter!("compensation_failures_total").increment(1);
                    error!(
                        product_id = %product_id,
                        quantity,
                        error = %store_err,
                        "compensating increment failed, manual reconciliation required"
                    );
                    unreconciled.push(UnreconciledDecrement {
                        product_id: product_id.clone(),
                        quantity: *quantity,
                        reason: store_err.to_string(),
                    });
                }
                Err(_elapsed) => {
                    metrics::counter!("compensation_failures_total").increment(1);
                    error!(
                        product_id = %product_id,
                        quantity,
                        "compensating increment timed out, manual reconciliation required"
                    );
                    unreconciled.push(UnreconciledDecrement {
                        product_id: product_id.clone(),
                        quantity: *quantity,
                        reason: "store operation timed out".to_string(),
                    });
                }
            }
        }

        if unreconciled.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::CompensationFailed { unreconciled })
        }
    }
}
