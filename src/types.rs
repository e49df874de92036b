// 1.0: all the primitives live here. ids, prices, amounts, timestamps.
// each is a newtype so the compiler catches a position id passed as an account.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// option token id on the position ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// any caller: position owner, operator, keeper, admin, or a contract address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", self.0)
    }
}

// automation network registration id. these are 256-bit on chain so they are
// kept as their decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UpkeepId(pub String);

impl UpkeepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpkeepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// 1.1: stop threshold as a scaled integer (e.g. 2000e8 for $2000 at 8 decimals).
// zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StopPrice(pub u64);

impl StopPrice {
    pub const UNSET: StopPrice = StopPrice(0);

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_set(&self) -> bool {
        self.0 != 0
    }

    // None if decimals are beyond what Decimal can carry
    pub fn to_decimal(&self, decimals: u32) -> Option<Decimal> {
        Decimal::try_from_i128_with_scale(i128::from(self.0), decimals).ok()
    }
}

impl fmt::Display for StopPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: token amount. payoffs, upkeep balances, funding pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn add(&self, other: Amount) -> Self {
        Self(self.0 + other.0)
    }

    // None when the result would go below zero
    pub fn checked_sub(&self, other: Amount) -> Option<Self> {
        let out = self.0 - other.0;
        if out < Decimal::ZERO {
            None
        } else {
            Some(Self(out))
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// 1.3: unix timestamp in seconds, same resolution as option expirations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn plus_secs(&self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    // negative once `later` is in the past
    pub fn secs_until(&self, later: Timestamp) -> i64 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp(self.0, 0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            None => write!(f, "{}s", self.0),
        }
    }
}

// 1.4: failures reported by the external collaborators (ledger, settlement,
// oracle, registry, funding token). the core never retries these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("position {0} is not known to the ledger")]
    UnknownPosition(PositionId),

    #[error("registration {0} is not known to the automation registry")]
    UnknownRegistration(UpkeepId),

    #[error("price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Amount, requested: Amount },

    #[error("rejected: {0}")]
    Rejected(String),
}
