//! Per-request placement state machine.

use serde::{Deserialize, Serialize};

/// The state of one order placement request.
///
/// State transitions:
/// ```text
/// Received ──► Validating ──► Reserving ──► Reserved ──► Persisting ──► Committed
///                                 │                          │
///                                 └────► Compensating ◄──────┘
///                                              │
///                                              ▼
///                                           Failed
/// ```
///
/// `Committed` and `Failed` are terminal; no other transitions exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlacementState {
    /// Request accepted, nothing done yet.
    #[default]
    Received,

    /// Basket undergoing structural validation.
    Validating,

    /// Stock decrements being applied product by product.
    Reserving,

    /// All decrements applied; total computed.
    Reserved,

    /// The immutable order is being written to the ledger.
    Persisting,

    /// Applied decrements are being reversed after a failure.
    Compensating,

    /// Order persisted; decrements final (terminal state).
    Committed,

    /// Placement failed after compensation (terminal state).
    Failed,
}

impl PlacementState {
    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: PlacementState) -> bool {
        use PlacementState::*;
        matches!(
            (self, next),
            (Received, Validating)
                | (Validating, Reserving)
                | (Reserving, Reserved)
                | (Reserving, Compensating)
                | (Reserved, Persisting)
                | (Persisting, Committed)
                | (Persisting, Compensating)
                | (Compensating, Failed)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlacementState::Committed | PlacementState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementState::Received => "Received",
            PlacementState::Validating => "Validating",
            PlacementState::Reserving => "Reserving",
            PlacementState::Reserved => "Reserved",
            PlacementState::Persisting => "Persisting",
            PlacementState::Compensating => "Compensating",
            PlacementState::Committed => "Committed",
            PlacementState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PlacementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
