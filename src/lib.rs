// exit-keeper: conditional exit automation for tokenized option positions.
// owners set upper/lower stop prices; an automation network polls, and any
// position whose stop is crossed (or whose expiry is close) gets exercised.
// all computation is deterministic: callers and timestamps are parameters.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: PositionId, AccountId, UpkeepId, StopPrice, Amount, Timestamp
//   2.x  conditional.rs: stop orders and the trigger predicate
//   7.x  config.rs: keeper config, env presets, TOML loading
//   8.x  book/: order book: set/delete, check, execute
//   9.x  price_feed.rs: oracle trait + mock aggregator
//   9.1  settlement.rs: settlement engine trait (mocked)
//   9.2  custody.rs: position ledger trait (mocked)
//   9.3  registry.rs: automation registry + fee token (mocked)
//   10.x upkeep.rs: check/execute payload plumbing
//   10.1 automation.rs: keeper adapter, bounded batches
//   10.2 watchdog.rs: upkeep funding watchdog
//   11.x events.rs: state transition events for audit

// core modules
pub mod book;
pub mod conditional;
pub mod events;
pub mod types;

// automation modules
pub mod automation;
pub mod upkeep;
pub mod watchdog;

// integration modules
pub mod config;
pub mod custody;
pub mod price_feed;
pub mod registry;
pub mod settlement;

// re exports for convenience
pub use automation::{AdapterError, AutomationAdapter, AutomationConfig, BatchReport};
pub use book::{ExecutionOutcome, OrderBook, OrderBookConfig, OrderBookError, MAX_PRICE_DECIMALS};
pub use conditional::*;
pub use config::{ConfigError, Environment, KeeperConfig};
pub use custody::{InMemoryLedger, PositionLedger, PositionRecord};
pub use events::*;
pub use price_feed::{MockAggregator, OraclePrice, PriceOracle};
pub use registry::{AutomationRegistry, FundingAsset, InMemoryRegistry, InMemoryToken};
pub use settlement::{InMemorySettlement, SettlementEngine};
pub use types::*;
pub use upkeep::{Payload, PayloadError, UpkeepCheck};
pub use watchdog::{FundingPolicy, FundingReport, FundingWatchdog, WatchdogConfig, WatchdogError};
