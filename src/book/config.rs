//! Order book configuration options.

use serde::{Deserialize, Serialize};

/// Largest scale a `rust_decimal::Decimal` can carry.
pub const MAX_PRICE_DECIMALS: u32 = 28;

/// Order book configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBookConfig {
    /// Precision stop prices are stored at. Matches the oracle (8 for USD feeds).
    pub price_decimals: u32,
    /// Initial execution window before expiry, in seconds.
    pub time_to_execution_secs: u64,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self {
            price_decimals: 8,
            time_to_execution_secs: 30 * 60,
            max_events: 100_000,
        }
    }
}

impl OrderBookConfig {
    /// Stops stored past `MAX_PRICE_DECIMALS` could never be compared.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.price_decimals > MAX_PRICE_DECIMALS {
            return Err("price decimals must be at most 28");
        }
        if self.max_events == 0 {
            return Err("event log must retain at least one event");
        }
        Ok(())
    }
}
