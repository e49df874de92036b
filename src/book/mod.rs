// 8.0: stop order book. owns the position id -> stop order map, gates writes on
// the position ledger, fires orders through the settlement engine.
// deterministic: caller and evaluation time are passed in, never read from a clock.

mod config;
mod core;
mod orders;
mod results;
mod triggers;

pub use config::{OrderBookConfig, MAX_PRICE_DECIMALS};
pub use core::OrderBook;
pub use results::{ExecutionOutcome, OrderBookError};
