//! Placement coordinator: drives one order request to a terminal state.

use std::time::Instant;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use common::{Order, UserId};
use store::{CatalogStore, OrderLedger};

use crate::basket::{LineItem, ValidatedBasket};
use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::recorder::{OrderRecorder, RecordOutcome};
use crate::reservation::ReservationEngine;
use crate::state::PlacementState;

/// Orchestrates order placement end to end.
///
/// This is the boundary the (external) transport layer calls. Each request
/// runs validation, reservation, and persistence as the state machine
/// `Received → Validating → Reserving → Reserved → Persisting →
/// Committed`, with any reservation or persistence failure routed through
/// `Compensating → Failed`.
///
/// The flow after validation runs on a spawned task: if the caller
/// disconnects and drops the `place_order` future mid-flight, the
/// in-flight reservation/persistence sequence still reaches a terminal
/// state instead of leaving inventory undefined.
pub struct CheckoutCoordinator<C, L>
where
    C: CatalogStore + Clone + 'static,
    L: OrderLedger + Clone + 'static,
{
    catalog: C,
    ledger: L,
    config: CheckoutConfig,
}

impl<C, L> CheckoutCoordinator<C, L>
where
    C: CatalogStore + Clone + 'static,
    L: OrderLedger + Clone + 'static,
{
    /// Creates a new coordinator.
    pub fn new(catalog: C, ledger: L, config: CheckoutConfig) -> Self {
        Self {
            catalog,
            ledger,
            config,
        }
    }

    /// Places an order for the given basket.
    ///
    /// Not safe against caller-side retries: a retry after a transient
    /// failure can double-decrement stock. Use
    /// [`CheckoutCoordinator::place_order_with_key`] when the caller can
    /// supply a deduplication token.
    pub async fn place_order(
        &self,
        user_id: UserId,
        items: Vec<LineItem>,
    ) -> Result<Order, CheckoutError> {
        self.place(user_id, items, None).await
    }

    /// Places an order with a caller-supplied deduplication token.
    ///
    /// The ledger is checked for the key before reserving and enforces
    /// its uniqueness at commit, so retrying a placement that already
    /// committed returns the committed order without decrementing again.
    pub async fn place_order_with_key(
        &self,
        user_id: UserId,
        items: Vec<LineItem>,
        dedup_key: impl Into<String>,
    ) -> Result<Order, CheckoutError> {
        self.place(user_id, items, Some(dedup_key.into())).await
    }

    #[tracing::instrument(skip(self, items), fields(user_id = %user_id, lines = items.len()))]
    async fn place(
        &self,
        user_id: UserId,
        items: Vec<LineItem>,
        dedup_key: Option<String>,
    ) -> Result<Order, CheckoutError> {
        metrics::counter!("order_placements_total").increment(1);
        let start = Instant::now();

        // Detach the flow from the caller: dropping our future must not
        // abandon a partially applied basket.
        let catalog = self.catalog.clone();
        let ledger = self.ledger.clone();
        let config = self.config.clone();
        let result = tokio::spawn(Self::drive(
            catalog, ledger, config, user_id, items, dedup_key,
        ))
        .await
        .map_err(|e| CheckoutError::OrderCreationFailed(format!("placement task panicked: {e}")))
        .and_then(|r| r);

        metrics::histogram!("order_placement_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        match &result {
            Ok(order) => {
                metrics::counter!("orders_committed_total").increment(1);
                info!(order_id = %order.id, total = %order.total_price, "order committed");
            }
            Err(err) => {
                metrics::counter!("orders_failed_total").increment(1);
                warn!(kind = err.kind(), error = %err, "order placement failed");
            }
        }

        result
    }

    /// Runs one placement to a terminal state.
    async fn drive(
        catalog: C,
        ledger: L,
        config: CheckoutConfig,
        user_id: UserId,
        items: Vec<LineItem>,
        dedup_key: Option<String>,
    ) -> Result<Order, CheckoutError> {
        let mut state = PlacementState::Received;

        advance(&mut state, PlacementState::Validating);
        let basket = ValidatedBasket::validate(items)?;

        // Dedup fast path: a committed retry resolves before anything is
        // reserved.
        if let Some(key) = &dedup_key
            && let Some(existing) = lookup_dedup_key(&ledger, &config, key).await?
        {
            info!(order_id = %existing.id, dedup_key = %key, "dedup key already committed");
            return Ok(existing);
        }

        let engine = ReservationEngine::new(catalog, config.store_timeout);
        let recorder = OrderRecorder::new(ledger.clone(), config.store_timeout);

        advance(&mut state, PlacementState::Reserving);
        let reserved = match engine.reserve(&basket).await {
            Ok(reserved) => reserved,
            Err(err) => {
                // The engine compensated its applied decrements before
                // returning.
                advance(&mut state, PlacementState::Compensating);
                advance(&mut state, PlacementState::Failed);
                return Err(err);
            }
        };

        advance(&mut state, PlacementState::Reserved);
        advance(&mut state, PlacementState::Persisting);

        match recorder.record(user_id, &reserved, dedup_key).await {
            Ok(RecordOutcome::Committed(order)) => {
                advance(&mut state, PlacementState::Committed);
                Ok(order)
            }
            Ok(RecordOutcome::Duplicate { dedup_key }) => {
                // A racing retry committed first: this reservation is
                // redundant, release it and hand back the winner.
                advance(&mut state, PlacementState::Compensating);
                let compensated = engine.compensate(&reserved.decrements()).await;
                advance(&mut state, PlacementState::Failed);
                compensated?;

                match lookup_dedup_key(&ledger, &config, &dedup_key).await? {
                    Some(existing) => {
                        info!(order_id = %existing.id, dedup_key = %dedup_key, "resolved to order committed by racing retry");
                        Ok(existing)
                    }
                    None => Err(CheckoutError::OrderCreationFailed(format!(
                        "dedup key {dedup_key} reported duplicate but resolved to no order"
                    ))),
                }
            }
            Err(err) => {
                // The reservation is orphaned; release it before the
                // persistence error surfaces.
                advance(&mut state, PlacementState::Compensating);
                let compensated = engine.compensate(&reserved.decrements()).await;
                advance(&mut state, PlacementState::Failed);
                compensated?;
                Err(err)
            }
        }
    }
}

/// Logs and applies one state transition.
fn advance(state: &mut PlacementState, next: PlacementState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal placement transition {state} -> {next}"
    );
    debug!(from = %state, to = %next, "placement state transition");
    *state = next;
}

async fn lookup_dedup_key<L: OrderLedger>(
    ledger: &L,
    config: &CheckoutConfig,
    key: &str,
) -> Result<Option<Order>, CheckoutError> {
    match timeout(config.store_timeout, ledger.find_by_dedup_key(key)).await {
        Ok(Ok(order)) => Ok(order),
        Ok(Err(err)) => Err(CheckoutError::StoreUnavailable(err.to_string())),
        Err(_elapsed) => Err(CheckoutError::Timeout {
            operation: "ledger dedup lookup".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use store::{InMemoryCatalog, InMemoryLedger};

    async fn setup() -> (
        CheckoutCoordinator<InMemoryCatalog, InMemoryLedger>,
        InMemoryCatalog,
        InMemoryLedger,
    ) {
        let catalog = InMemoryCatalog::new();
        catalog.seed("SKU-A", Money::from_cents(1000), 10).await;
        catalog.seed("SKU-B", Money::from_cents(500), 10).await;
        let ledger = InMemoryLedger::new();

        let coordinator = CheckoutCoordinator::new(
            catalog.clone(),
            ledger.clone(),
            CheckoutConfig::default(),
        );
        (coordinator, catalog, ledger)
    }

    #[tokio::test]
    async fn committed_order_has_exact_total_and_decrements() {
        let (coordinator, catalog, ledger) = setup().await;

        let order = coordinator
            .place_order(
                UserId::new(),
                vec![LineItem::new("SKU-A", 2), LineItem::new("SKU-B", 1)],
            )
            .await
            .unwrap();

        // $10.00 × 2 + $5.00 × 1 = $25.00, exactly.
        assert_eq!(order.total_price, Money::from_cents(2500));
        assert_eq!(order.total_price, order.computed_total());
        assert_eq!(catalog.stock_of(&"SKU-A".into()).await, Some(8));
        assert_eq!(catalog.stock_of(&"SKU-B".into()).await, Some(9));
        assert_eq!(ledger.order_count().await, 1);
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_everything_untouched() {
        let (coordinator, catalog, ledger) = setup().await;
        catalog.seed("SKU-A", Money::from_cents(1000), 1).await;

        let err = coordinator
            .place_order(UserId::new(), vec![LineItem::new("SKU-A", 2)])
            .await
            .unwrap_err();

        match err {
            CheckoutError::InsufficientStock {
                product_id,
                available,
                ..
            } => {
                assert_eq!(product_id.as_str(), "SKU-A");
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientStock, got {other}"),
        }
        assert_eq!(catalog.stock_of(&"SKU-A".into()).await, Some(1));
        assert_eq!(ledger.order_count().await, 0);
    }

    #[tokio::test]
    async fn validation_failure_reaches_no_store() {
        let (coordinator, catalog, ledger) = setup().await;

        let err = coordinator
            .place_order(UserId::new(), vec![])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = coordinator
            .place_order(UserId::new(), vec![LineItem::new("not a sku", 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        assert_eq!(catalog.stock_of(&"SKU-A".into()).await, Some(10));
        assert_eq!(ledger.order_count().await, 0);
    }

    #[tokio::test]
    async fn persistence_failure_compensates_and_surfaces() {
        let (coordinator, catalog, ledger) = setup().await;
        ledger.set_fail_on_insert(true).await;

        let err = coordinator
            .place_order(
                UserId::new(),
                vec![LineItem::new("SKU-A", 2), LineItem::new("SKU-B", 1)],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::OrderCreationFailed(_)));
        // Reservation fully released; no order persisted.
        assert_eq!(catalog.stock_of(&"SKU-A".into()).await, Some(10));
        assert_eq!(catalog.stock_of(&"SKU-B".into()).await, Some(10));
        assert_eq!(ledger.order_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_lines_reserve_each_product_once() {
        let (coordinator, catalog, _) = setup().await;

        let order = coordinator
            .place_order(
                UserId::new(),
                vec![LineItem::new("SKU-A", 2), LineItem::new("SKU-A", 3)],
            )
            .await
            .unwrap();

        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 5);
        assert_eq!(catalog.stock_of(&"SKU-A".into()).await, Some(5));
    }

    #[tokio::test]
    async fn dedup_key_retry_returns_committed_order_without_decrementing() {
        let (coordinator, catalog, ledger) = setup().await;
        let user_id = UserId::new();
        let items = vec![LineItem::new("SKU-A", 2)];

        let first = coordinator
            .place_order_with_key(user_id, items.clone(), "retry-1")
            .await
            .unwrap();
        assert_eq!(catalog.stock_of(&"SKU-A".into()).await, Some(8));

        let second = coordinator
            .place_order_with_key(user_id, items, "retry-1")
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(catalog.stock_of(&"SKU-A".into()).await, Some(8));
        assert_eq!(ledger.order_count().await, 1);
    }
}
