// 7.0 config.rs: all settings in one place. order book, keeper batching, upkeep funding.
// 7.1 each component owns its own config struct; KeeperConfig bundles them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::automation::AutomationConfig;
use crate::book::OrderBookConfig;
use crate::types::Amount;
use crate::watchdog::WatchdogConfig;

// The complete keeper configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    pub order_book: OrderBookConfig,
    pub automation: AutomationConfig,
    pub watchdog: WatchdogConfig,
}

impl KeeperConfig {
    // Preset for testnet: short window, small batches, cheap top ups
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.order_book.time_to_execution_secs = 300; // 5 minutes
        config.automation.max_batch_size = 5;
        config.watchdog.default_policy.min_balance = Amount::new(Decimal::new(5, 1)); // 0.5
        config.watchdog.default_policy.top_up_amount = Amount::new(Decimal::ONE);
        config
    }

    // Preset for mainnet with a wider safety window before expiry
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.order_book.time_to_execution_secs = 3600; // 1 hour
        config.automation.max_batch_size = 8;
        config.watchdog.default_policy.min_balance = Amount::new(Decimal::new(2, 0));
        config.watchdog.default_policy.top_up_amount = Amount::new(Decimal::new(5, 0));
        config
    }

    // Parse and validate a TOML document. missing sections fall back to defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.order_book
            .validate()
            .map_err(|reason| ConfigError::InvalidOrderBook {
                reason: reason.to_string(),
            })?;

        if self.watchdog.max_events == 0 {
            return Err(ConfigError::InvalidWatchdog {
                reason: "event log must retain at least one event".to_string(),
            });
        }

        if self.automation.max_batch_size == 0 {
            return Err(ConfigError::InvalidAutomation {
                reason: "batch size must be positive".to_string(),
            });
        }

        if self.watchdog.max_batch_size == 0 {
            return Err(ConfigError::InvalidWatchdog {
                reason: "batch size must be positive".to_string(),
            });
        }

        self.watchdog
            .default_policy
            .validate()
            .map_err(|reason| ConfigError::InvalidWatchdog {
                reason: reason.to_string(),
            })?;

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid order book config: {reason}")]
    InvalidOrderBook { reason: String },

    #[error("invalid automation config: {reason}")]
    InvalidAutomation { reason: String },

    #[error("invalid watchdog config: {reason}")]
    InvalidWatchdog { reason: String },

    #[error("config parse error: {reason}")]
    Parse { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> KeeperConfig {
        match self {
            Environment::Development => KeeperConfig::default(),
            Environment::Testnet => KeeperConfig::testnet(),
            Environment::Mainnet => KeeperConfig::mainnet_conservative(),
        }
    }
}
