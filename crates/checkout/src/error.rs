//! Checkout error taxonomy.

use thiserror::Error;

use common::ProductId;
use store::CatalogError;

use crate::basket::ValidationError;

/// Errors surfaced by `place_order`.
///
/// Transport-level status-code mapping is the job of the handler layer
/// sitting above this crate; [`CheckoutError::kind`] gives it a stable
/// machine-readable discriminator.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Malformed input; surfaced immediately, never retried.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The basket references a product the catalog does not know.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Business conflict: not enough stock. Carries the available
    /// quantity so the caller can resubmit a smaller basket.
    #[error(
        "Insufficient stock for {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    /// Transient store failure. The whole call may be retried by the
    /// caller; compensation has completed before this surfaces.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store operation exceeded its bounded timeout. Same retry
    /// contract as `StoreUnavailable`.
    #[error("Store operation timed out: {operation}")]
    Timeout { operation: String },

    /// One or more compensating increments failed. Fatal: every decrement
    /// left unreconciled is listed for operator reconciliation, none is
    /// silently absorbed.
    #[error(
        "Compensation incomplete, manual reconciliation required: {}",
        summarize_unreconciled(.unreconciled)
    )]
    CompensationFailed {
        unreconciled: Vec<UnreconciledDecrement>,
    },

    /// Persistence failed after a successful reservation. The
    /// reservation has been compensated before this surfaces.
    #[error("Order creation failed: {0}")]
    OrderCreationFailed(String),
}

/// A stock decrement whose compensating increment could not be applied.
///
/// The product is still decremented in the catalog even though no order
/// was committed; the operator reconciles it from this record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreconciledDecrement {
    pub product_id: ProductId,
    pub quantity: u32,
    pub reason: String,
}

impl std::fmt::Display for UnreconciledDecrement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (quantity {}): {}",
            self.product_id, self.quantity, self.reason
        )
    }
}

fn summarize_unreconciled(unreconciled: &[UnreconciledDecrement]) -> String {
    unreconciled
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CheckoutError {
    /// Stable kind string for the transport layer's error mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::Validation(_) => "validation",
            CheckoutError::ProductNotFound(_) => "product_not_found",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::StoreUnavailable(_) => "store_unavailable",
            CheckoutError::Timeout { .. } => "timeout",
            CheckoutError::CompensationFailed { .. } => "compensation_failed",
            CheckoutError::OrderCreationFailed(_) => "order_creation_failed",
        }
    }

    /// Returns true if the caller may retry the whole placement call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::StoreUnavailable(_) | CheckoutError::Timeout { .. }
        )
    }
}

impl From<CatalogError> for CheckoutError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ProductNotFound(id) => CheckoutError::ProductNotFound(id),
            CatalogError::InsufficientStock {
                product_id,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            CatalogError::Unavailable(detail) => CheckoutError::StoreUnavailable(detail),
            CatalogError::Database(e) => CheckoutError::StoreUnavailable(e.to_string()),
        }
    }
}
