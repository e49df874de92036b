// 8.1 book/core.rs: the order book struct. stop orders, execution window, collaborators.

use super::config::OrderBookConfig;
use super::results::OrderBookError;
use crate::conditional::StopOrder;
use crate::custody::PositionLedger;
use crate::events::{Event, EventLog, EventPayload, ExecutionWindowUpdatedEvent};
use crate::price_feed::{OraclePrice, PriceOracle};
use crate::settlement::SettlementEngine;
use crate::types::{AccountId, Amount, PositionId, Timestamp};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/** 8.1: all order book state lives here. the collaborators are owned so tests
and the sim can reach into them through the accessors. */
#[derive(Debug)]
pub struct OrderBook<L, S, O> {
    pub(super) config: OrderBookConfig,
    pub(super) admin: AccountId,
    pub(super) ledger: L,
    pub(super) settlement: S,
    pub(super) oracle: O,
    // absent orders are never stored
    pub(super) orders: HashMap<PositionId, StopOrder>,
    pub(super) time_to_execution: Duration,
    pub(super) events: EventLog,
}

impl<L, S, O> OrderBook<L, S, O>
where
    L: PositionLedger,
    S: SettlementEngine,
    O: PriceOracle,
{
    pub fn new(
        config: OrderBookConfig,
        admin: AccountId,
        ledger: L,
        settlement: S,
        oracle: O,
    ) -> Result<Self, OrderBookError> {
        config.validate().map_err(|reason| OrderBookError::InvalidConfig {
            reason: reason.to_string(),
        })?;
        let time_to_execution = Duration::from_secs(config.time_to_execution_secs);
        let events = EventLog::new(config.max_events);
        Ok(Self {
            config,
            admin,
            ledger,
            settlement,
            oracle,
            orders: HashMap::new(),
            time_to_execution,
            events,
        })
    }

    pub fn config(&self) -> &OrderBookConfig {
        &self.config
    }

    pub fn admin(&self) -> AccountId {
        self.admin
    }

    pub fn global_time_to_execution(&self) -> Duration {
        self.time_to_execution
    }

    // privileged
    pub fn set_global_time_to_execution(
        &mut self,
        caller: AccountId,
        window: Duration,
        now: Timestamp,
    ) -> Result<(), OrderBookError> {
        if caller != self.admin {
            return Err(OrderBookError::Unauthorized(caller));
        }

        let old = self.time_to_execution;
        self.time_to_execution = window;
        info!(old_secs = old.as_secs(), new_secs = window.as_secs(), "execution window updated");

        self.events.emit(
            now,
            EventPayload::ExecutionWindowUpdated(ExecutionWindowUpdatedEvent {
                old_secs: old.as_secs(),
                new_secs: window.as_secs(),
            }),
        );
        Ok(())
    }

    /// Thresholds stored for the position. Zero-valued when no order exists.
    pub fn take_info(&self, id: PositionId) -> StopOrder {
        self.orders.get(&id).copied().unwrap_or_default()
    }

    pub fn get(&self, id: PositionId) -> Option<&StopOrder> {
        self.orders.get(&id)
    }

    pub fn orders(&self) -> impl Iterator<Item = (&PositionId, &StopOrder)> {
        self.orders.iter()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn current_price(&self) -> Result<OraclePrice, OrderBookError> {
        Ok(self.oracle.current_price()?)
    }

    pub fn payoff_amount(&self, id: PositionId) -> Result<Amount, OrderBookError> {
        Ok(self.settlement.payoff_amount(id)?)
    }

    pub fn expiration_of(&self, id: PositionId) -> Result<Timestamp, OrderBookError> {
        Ok(self.ledger.expiration_of(id)?)
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn settlement(&self) -> &S {
        &self.settlement
    }

    pub fn settlement_mut(&mut self) -> &mut S {
        &mut self.settlement
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub fn events(&self) -> &[Event] {
        self.events.all()
    }
}
