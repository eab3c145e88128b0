//! Engine configuration loaded from environment variables.

use std::time::Duration;

/// Default bound on any single store operation.
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Checkout engine configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `CHECKOUT_STORE_TIMEOUT_MS` — bounded timeout for each store
///   operation, in milliseconds (default: `5000`)
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Timeout applied to every catalog and ledger call. A timed-out
    /// operation is treated as a reservation failure and triggers
    /// compensation for whatever was already applied.
    pub store_timeout: Duration,
}

impl CheckoutConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let millis = std::env::var("CHECKOUT_STORE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_STORE_TIMEOUT_MS);

        Self {
            store_timeout: Duration::from_millis(millis),
        }
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}
