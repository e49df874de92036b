//! Stop order placement and removal.

use super::core::OrderBook;
use super::results::OrderBookError;
use crate::conditional::StopOrder;
use crate::custody::PositionLedger;
use crate::events::{EventPayload, OrderDeletedEvent, OrderSetEvent};
use crate::price_feed::PriceOracle;
use crate::settlement::SettlementEngine;
use crate::types::{AccountId, PositionId, StopPrice, Timestamp};
use tracing::{debug, info};

impl<L, S, O> OrderBook<L, S, O>
where
    L: PositionLedger,
    S: SettlementEngine,
    O: PriceOracle,
{
    /// Set or replace the stop order on a position.
    ///
    /// The caller must be the owner or an approved operator, and the position
    /// must expire strictly after `now`. Upper and lower are stored as given,
    /// in either relation. Passing zero for both deletes the order.
    pub fn set_take_profit(
        &mut self,
        caller: AccountId,
        id: PositionId,
        upper_stop_price: StopPrice,
        lower_stop_price: StopPrice,
        now: Timestamp,
    ) -> Result<(), OrderBookError> {
        self.ensure_owner(caller, id)?;

        let expiration = self.ledger.expiration_of(id)?;
        if expiration <= now {
            return Err(OrderBookError::Expired {
                position_id: id,
                expiration,
            });
        }

        let order = StopOrder::new(upper_stop_price, lower_stop_price);
        if order.is_absent() {
            self.orders.remove(&id);
        } else {
            self.orders.insert(id, order);
        }

        info!(
            position_id = %id,
            caller = %caller,
            upper = upper_stop_price.raw(),
            lower = lower_stop_price.raw(),
            "stop order set"
        );

        self.events.emit(
            now,
            EventPayload::OrderSet(OrderSetEvent {
                position_id: id,
                caller,
                upper_stop_price,
                lower_stop_price,
            }),
        );
        Ok(())
    }

    /// Remove the stop order on a position. Succeeds when none exists.
    pub fn delete_take_profit(
        &mut self,
        caller: AccountId,
        id: PositionId,
        now: Timestamp,
    ) -> Result<(), OrderBookError> {
        self.ensure_owner(caller, id)?;

        if self.orders.remove(&id).is_none() {
            debug!(position_id = %id, "delete on absent stop order");
            return Ok(());
        }

        info!(position_id = %id, caller = %caller, "stop order deleted");
        self.events.emit(
            now,
            EventPayload::OrderDeleted(OrderDeletedEvent {
                position_id: id,
                caller,
            }),
        );
        Ok(())
    }

    // ownership is re-read from the ledger on every call; it moves with transfers
    fn ensure_owner(&self, caller: AccountId, id: PositionId) -> Result<(), OrderBookError> {
        if self.ledger.is_approved_or_owner(caller, id)? {
            Ok(())
        } else {
            Err(OrderBookError::NotOwner {
                position_id: id,
                caller,
            })
        }
    }
}
