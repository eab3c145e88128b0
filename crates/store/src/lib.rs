//! Storage boundary for the order placement engine.
//!
//! The engine treats its two collaborators as external services behind
//! traits:
//!
//! - [`CatalogStore`] holds product records and exposes the atomic
//!   conditional stock decrement the reservation engine depends on.
//! - [`OrderLedger`] persists immutable orders.
//!
//! Two implementations are provided for each: an in-memory one for tests
//! and single-process use, and a PostgreSQL one where the conditional
//! decrement is a single guarded `UPDATE`, so it stays atomic even when
//! the store is shared by multiple service instances.

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;

pub use catalog::{CatalogStore, ProductRecord, StockDecrement};
pub use error::{CatalogError, LedgerError};
pub use ledger::OrderLedger;
pub use memory::{InMemoryCatalog, InMemoryLedger};
pub use postgres::{PgCatalogStore, PgOrderLedger};
