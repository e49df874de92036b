//! Funding watchdog: keeps automation network registrations above their
//! minimum balance by topping them up from a pool of the fee token.
//!
//! The registry is the source of truth for balances. The watchdog only keeps
//! the list of registrations it monitors and their funding policies. Unlike
//! the keeper adapter it re-validates every id at execute time, since funding
//! moves tokens and a replayed payload must not pay twice.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::events::{
    Event, EventLog, EventPayload, PoolWithdrawalEvent, RegistrationEvent, RegistrationFundedEvent,
};
use crate::registry::{AutomationRegistry, FundingAsset};
use crate::types::{AccountId, Amount, CollaboratorError, Timestamp, UpkeepId};
use crate::upkeep::{Payload, PayloadError, UpkeepCheck};

/// When a registration counts as underfunded and how much it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingPolicy {
    pub min_balance: Amount,
    pub top_up_amount: Amount,
}

impl FundingPolicy {
    pub fn new(min_balance: Amount, top_up_amount: Amount) -> Self {
        Self {
            min_balance,
            top_up_amount,
        }
    }

    pub fn is_underfunded(&self, balance: Amount) -> bool {
        balance < self.min_balance
    }

    /// A zero top up would "fund" the same registration on every poll.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.top_up_amount.is_positive() {
            return Err("top up amount must be positive");
        }
        if self.min_balance.is_negative() {
            return Err("minimum balance cannot be negative");
        }
        Ok(())
    }
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self {
            min_balance: Amount::new(rust_decimal::Decimal::ONE),
            top_up_amount: Amount::new(rust_decimal::Decimal::TWO),
        }
    }
}

/// Watchdog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Most registrations flagged per `check` call.
    pub max_batch_size: usize,
    /// Policy for registrations added without one.
    pub default_policy: FundingPolicy,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 5,
            default_policy: FundingPolicy::default(),
            max_events: 10_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    #[error("Caller {0} is not the watchdog controller")]
    Unauthorized(AccountId),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    #[error("Registration {0} is not monitored")]
    NotMonitored(UpkeepId),

    #[error("Registration {upkeep_id} already holds {balance}")]
    AlreadyFunded { upkeep_id: UpkeepId, balance: Amount },

    #[error("Invalid funding policy for {upkeep_id}: {reason}")]
    InvalidPolicy { upkeep_id: UpkeepId, reason: String },

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// What one `execute` call did.
#[derive(Debug, Default)]
pub struct FundingReport {
    pub funded: Vec<(UpkeepId, Amount)>,
    pub failed: Vec<(UpkeepId, WatchdogError)>,
}

impl FundingReport {
    pub fn total_funded(&self) -> Amount {
        self.funded
            .iter()
            .fold(Amount::zero(), |acc, (_, amount)| acc.add(*amount))
    }
}

#[derive(Debug)]
pub struct FundingWatchdog<R, A> {
    config: WatchdogConfig,
    controller: AccountId,
    // holder of the funding pool on the fee token
    account: AccountId,
    registry: R,
    asset: A,
    registrations: BTreeMap<UpkeepId, FundingPolicy>,
    // last id handed to `execute`; the next scan starts after it
    cursor: Option<UpkeepId>,
    events: EventLog,
}

impl<R, A> FundingWatchdog<R, A>
where
    R: AutomationRegistry,
    A: FundingAsset,
{
    pub fn new(config: WatchdogConfig, controller: AccountId, account: AccountId, registry: R, asset: A) -> Self {
        let events = EventLog::new(config.max_events);
        Self {
            config,
            controller,
            account,
            registry,
            asset,
            registrations: BTreeMap::new(),
            cursor: None,
            events,
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Unallocated fee tokens held by the watchdog.
    pub fn pool_balance(&self) -> Amount {
        self.asset.balance_of(self.account)
    }

    pub fn registrations(&self) -> impl Iterator<Item = (&UpkeepId, &FundingPolicy)> {
        self.registrations.iter()
    }

    pub fn policy_of(&self, id: &UpkeepId) -> Option<&FundingPolicy> {
        self.registrations.get(id)
    }

    /// Monitor a registration. `None` uses the configured default policy.
    /// Re-adding replaces the policy.
    pub fn add_registration(
        &mut self,
        caller: AccountId,
        id: UpkeepId,
        policy: Option<FundingPolicy>,
        now: Timestamp,
    ) -> Result<(), WatchdogError> {
        self.ensure_controller(caller)?;
        let policy = policy.unwrap_or(self.config.default_policy);
        policy.validate().map_err(|reason| WatchdogError::InvalidPolicy {
            upkeep_id: id.clone(),
            reason: reason.to_string(),
        })?;

        info!(upkeep_id = %id, min_balance = %policy.min_balance, top_up = %policy.top_up_amount, "monitoring registration");
        self.registrations.insert(id.clone(), policy);
        self.events.emit(now, EventPayload::RegistrationAdded(RegistrationEvent { upkeep_id: id }));
        Ok(())
    }

    /// Stop monitoring. Returns false if the id was not monitored.
    pub fn remove_registration(
        &mut self,
        caller: AccountId,
        id: &UpkeepId,
        now: Timestamp,
    ) -> Result<bool, WatchdogError> {
        self.ensure_controller(caller)?;
        if self.registrations.remove(id).is_none() {
            return Ok(false);
        }

        info!(upkeep_id = %id, "registration no longer monitored");
        self.events.emit(
            now,
            EventPayload::RegistrationRemoved(RegistrationEvent {
                upkeep_id: id.clone(),
            }),
        );
        Ok(true)
    }

    /// Underfunded registrations, up to `max_batch_size`. The scan starts
    /// after the last id `execute` was handed and wraps around, so ids that
    /// keep failing do not hold every batch.
    pub fn check(&self) -> Result<UpkeepCheck, WatchdogError> {
        let mut batch = Vec::new();

        for (id, policy) in self.scan_order() {
            if batch.len() >= self.config.max_batch_size {
                break;
            }
            match self.registry.balance_of(id) {
                Ok(balance) if policy.is_underfunded(balance) => {
                    debug!(upkeep_id = %id, balance = %balance, min = %policy.min_balance, "underfunded");
                    batch.push(id.clone());
                }
                Ok(_) => {}
                Err(e) => warn!(upkeep_id = %id, error = %e, "balance read failed"),
            }
        }

        Ok(UpkeepCheck::for_ids(&batch)?)
    }

    /// Top up each registration in the payload. Each id is handled on its own:
    /// an empty pool or a registry error fails that id only.
    pub fn execute(&mut self, payload: &Payload, now: Timestamp) -> Result<FundingReport, WatchdogError> {
        let ids: Vec<UpkeepId> = payload.decode()?;
        if let Some(last) = ids.last() {
            self.cursor = Some(last.clone());
        }
        let mut report = FundingReport::default();

        for id in ids {
            match self.fund_one(&id, now) {
                Ok(amount) => report.funded.push((id, amount)),
                Err(e) => {
                    match &e {
                        WatchdogError::AlreadyFunded { .. } => debug!(upkeep_id = %id, "already funded"),
                        _ => warn!(upkeep_id = %id, error = %e, "funding failed"),
                    }
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            funded = report.funded.len(),
            failed = report.failed.len(),
            total = %report.total_funded(),
            "funding batch processed"
        );
        Ok(report)
    }

    /// Send unallocated pool tokens to `to`. Controller only.
    pub fn withdraw(
        &mut self,
        caller: AccountId,
        to: AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), WatchdogError> {
        self.ensure_controller(caller)?;

        let available = self.pool_balance();
        if available < amount {
            return Err(WatchdogError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        self.asset.transfer(self.account, to, amount)?;
        info!(to = %to, amount = %amount, "pool withdrawal");
        self.events
            .emit(now, EventPayload::PoolWithdrawal(PoolWithdrawalEvent { to, amount }));
        Ok(())
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    pub fn asset(&self) -> &A {
        &self.asset
    }

    pub fn asset_mut(&mut self) -> &mut A {
        &mut self.asset
    }

    pub fn events(&self) -> &[Event] {
        self.events.all()
    }

    fn fund_one(&mut self, id: &UpkeepId, now: Timestamp) -> Result<Amount, WatchdogError> {
        let policy = *self
            .registrations
            .get(id)
            .ok_or_else(|| WatchdogError::NotMonitored(id.clone()))?;

        let balance = self.registry.balance_of(id)?;
        if !policy.is_underfunded(balance) {
            return Err(WatchdogError::AlreadyFunded {
                upkeep_id: id.clone(),
                balance,
            });
        }

        let amount = policy.top_up_amount;
        let available = self.pool_balance();
        if available < amount {
            return Err(WatchdogError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        // the registry pulls from the pool only when it can credit
        self.registry.fund(id, self.account, amount, &mut self.asset)?;

        let new_balance = balance.add(amount);
        info!(upkeep_id = %id, amount = %amount, new_balance = %new_balance, "registration funded");
        self.events.emit(
            now,
            EventPayload::RegistrationFunded(RegistrationFundedEvent {
                upkeep_id: id.clone(),
                amount,
                new_balance,
            }),
        );
        Ok(amount)
    }

    fn scan_order(&self) -> impl Iterator<Item = (&UpkeepId, &FundingPolicy)> {
        let cursor = self.cursor.as_ref();
        let after = self
            .registrations
            .iter()
            .filter(move |(id, _)| cursor.map_or(true, |c| *id > c));
        let wrapped = self
            .registrations
            .iter()
            .filter(move |(id, _)| cursor.map_or(false, |c| *id <= c));
        after.chain(wrapped)
    }

    fn ensure_controller(&self, caller: AccountId) -> Result<(), WatchdogError> {
        if caller == self.controller {
            Ok(())
        } else {
            Err(WatchdogError::Unauthorized(caller))
        }
    }
}
