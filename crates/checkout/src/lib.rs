//! Order placement / inventory-consistency engine.
//!
//! Given a submitted basket of line items, this crate validates them,
//! atomically reserves stock across the catalog store, computes the exact
//! purchase total, and persists an immutable order:
//!
//! 1. Basket validation — structural checks, duplicate lines merged.
//! 2. Reservation — per-product atomic conditional decrements, in
//!    ascending product-ID order, each under a bounded timeout.
//! 3. Recording — one immutable order written to the ledger.
//!
//! If any step fails, every decrement already applied for the basket is
//! compensated in reverse order before the error is returned, so no basket
//! ever leaves a partial, externally visible effect.
//!
//! The HTTP transport, authentication, and reporting live outside this
//! crate; [`CheckoutCoordinator::place_order`] is the boundary they call.

pub mod basket;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod recorder;
pub mod reservation;
pub mod state;

pub use basket::{LineItem, ValidatedBasket, ValidationError};
pub use config::CheckoutConfig;
pub use coordinator::CheckoutCoordinator;
pub use error::{CheckoutError, UnreconciledDecrement};
pub use recorder::{OrderRecorder, RecordOutcome};
pub use reservation::{ReservationEngine, ReservedBasket};
pub use state::PlacementState;
