//! Trigger evaluation and execution.

use super::core::OrderBook;
use super::results::{ExecutionOutcome, OrderBookError};
use crate::conditional::{evaluate, TriggerInputs, TriggerReason};
use crate::custody::PositionLedger;
use crate::events::{EventPayload, OrderExecutedEvent};
use crate::price_feed::PriceOracle;
use crate::settlement::SettlementEngine;
use crate::types::{AccountId, PositionId, Timestamp};
use tracing::{debug, info};

impl<L, S, O> OrderBook<L, S, O>
where
    L: PositionLedger,
    S: SettlementEngine,
    O: PriceOracle,
{
    /// Whether the stop order on `id` may be executed at `now`.
    pub fn check_take_profit(&self, id: PositionId, now: Timestamp) -> Result<bool, OrderBookError> {
        Ok(self.trigger_reason(id, now)?.is_some())
    }

    /// Why the order would fire at `now`, or `None`. Read only.
    pub fn trigger_reason(&self, id: PositionId, now: Timestamp) -> Result<Option<TriggerReason>, OrderBookError> {
        // no collaborator reads for positions without an order
        let Some(order) = self.orders.get(&id) else {
            return Ok(None);
        };

        let payoff = self.settlement.payoff_amount(id)?;
        if !payoff.is_positive() {
            return Ok(None);
        }

        let price = self.oracle.current_price()?.to_decimal()?;
        let expiration = self.ledger.expiration_of(id)?;

        let inputs = TriggerInputs {
            price,
            stop_decimals: self.config.price_decimals,
            payoff,
            expiration,
            now,
            time_to_execution: self.time_to_execution,
        };
        Ok(evaluate(order, &inputs))
    }

    /// Exercise the position and clear its order. Open to any caller once the
    /// trigger holds; fails with `ConditionsNotMet` otherwise. Nothing changes
    /// when the settlement engine refuses the exercise.
    pub fn execute_take_profit(
        &mut self,
        executor: AccountId,
        id: PositionId,
        now: Timestamp,
    ) -> Result<ExecutionOutcome, OrderBookError> {
        let Some(reason) = self.trigger_reason(id, now)? else {
            debug!(position_id = %id, "stop order conditions not met");
            return Err(OrderBookError::ConditionsNotMet(id));
        };

        let paid = self.settlement.exercise(id)?;
        self.orders.remove(&id);

        info!(position_id = %id, executor = %executor, ?reason, paid = %paid, "stop order executed");
        self.events.emit(
            now,
            EventPayload::OrderExecuted(OrderExecutedEvent {
                position_id: id,
                executor,
                reason,
                paid,
            }),
        );

        Ok(ExecutionOutcome {
            position_id: id,
            reason,
            paid,
        })
    }
}
