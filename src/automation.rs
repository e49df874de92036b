//! Keeper adapter: scans tracked positions and executes triggered stop orders
//! in bounded batches.
//!
//! `check` is read only and can be called any number of times. `execute`
//! processes every id in its payload independently, so one stale or racing
//! order never blocks the rest of the batch, and replaying an old payload is
//! harmless because executed orders no longer trigger.
//!
//! Scanning is round robin. Each `execute` moves the scan start past the last
//! id it was handed, so positions whose exercise keeps failing cannot occupy
//! every batch while later triggered positions wait.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::book::{ExecutionOutcome, OrderBook, OrderBookError};
use crate::custody::PositionLedger;
use crate::price_feed::PriceOracle;
use crate::settlement::SettlementEngine;
use crate::types::{AccountId, PositionId, Timestamp};
use crate::upkeep::{Payload, PayloadError, UpkeepCheck};

/// Keeper adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Most positions collected per `check` call.
    pub max_batch_size: usize,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self { max_batch_size: 10 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Caller {0} is not the adapter controller")]
    Unauthorized(AccountId),

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// What one `execute` call did.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub executed: Vec<ExecutionOutcome>,
    pub failed: Vec<(PositionId, OrderBookError)>,
}

impl BatchReport {
    pub fn executed_ids(&self) -> Vec<PositionId> {
        self.executed.iter().map(|o| o.position_id).collect()
    }

    /// Failures other than `ConditionsNotMet`.
    pub fn hard_failures(&self) -> impl Iterator<Item = &(PositionId, OrderBookError)> {
        self.failed.iter().filter(|(_, e)| !e.is_transient())
    }
}

#[derive(Debug)]
pub struct AutomationAdapter {
    config: AutomationConfig,
    controller: AccountId,
    // identity the adapter executes under
    keeper: AccountId,
    // ascending id order, rotated to start after `cursor`
    positions: BTreeSet<PositionId>,
    // last id handed to `execute`
    cursor: Option<PositionId>,
}

impl AutomationAdapter {
    pub fn new(config: AutomationConfig, controller: AccountId, keeper: AccountId) -> Self {
        Self {
            config,
            controller,
            keeper,
            positions: BTreeSet::new(),
            cursor: None,
        }
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Start scanning a position. Returns false if it was already tracked.
    pub fn add_position(&mut self, caller: AccountId, id: PositionId) -> Result<bool, AdapterError> {
        self.ensure_controller(caller)?;
        let added = self.positions.insert(id);
        if added {
            info!(position_id = %id, "tracking position");
        }
        Ok(added)
    }

    /// Stop scanning a position. Returns false if it was not tracked.
    pub fn remove_position(&mut self, caller: AccountId, id: PositionId) -> Result<bool, AdapterError> {
        self.ensure_controller(caller)?;
        let removed = self.positions.remove(&id);
        if removed {
            info!(position_id = %id, "untracked position");
        }
        Ok(removed)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &PositionId> {
        self.positions.iter()
    }

    pub fn is_tracked(&self, id: PositionId) -> bool {
        self.positions.contains(&id)
    }

    /// Collect up to `max_batch_size` triggered positions, starting after the
    /// last id the previous `execute` processed and wrapping around. Positions
    /// whose evaluation errors are skipped for this cycle.
    pub fn check<L, S, O>(&self, book: &OrderBook<L, S, O>, now: Timestamp) -> Result<UpkeepCheck, AdapterError>
    where
        L: PositionLedger,
        S: SettlementEngine,
        O: PriceOracle,
    {
        let mut batch = Vec::with_capacity(self.config.max_batch_size.min(self.positions.len()));

        for id in self.scan_order() {
            if batch.len() >= self.config.max_batch_size {
                break;
            }
            match book.check_take_profit(id, now) {
                Ok(true) => batch.push(id),
                Ok(false) => {}
                Err(e) => warn!(position_id = %id, error = %e, "trigger evaluation failed"),
            }
        }

        debug!(triggered = batch.len(), tracked = self.positions.len(), "keeper check");
        Ok(UpkeepCheck::for_ids(&batch)?)
    }

    /// Execute every id in the payload. The payload is trusted as produced by
    /// `check`; each id is still gated by the order book's own trigger check.
    pub fn execute<L, S, O>(
        &mut self,
        book: &mut OrderBook<L, S, O>,
        payload: &Payload,
        now: Timestamp,
    ) -> Result<BatchReport, AdapterError>
    where
        L: PositionLedger,
        S: SettlementEngine,
        O: PriceOracle,
    {
        let ids: Vec<PositionId> = payload.decode()?;
        if let Some(&last) = ids.last() {
            self.cursor = Some(last);
        }
        let mut report = BatchReport::default();

        for id in ids {
            match book.execute_take_profit(self.keeper, id, now) {
                Ok(outcome) => report.executed.push(outcome),
                Err(e) => {
                    if e.is_transient() {
                        debug!(position_id = %id, "skipped, conditions no longer met");
                    } else {
                        warn!(position_id = %id, error = %e, "execution failed");
                    }
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            executed = report.executed.len(),
            failed = report.failed.len(),
            "keeper batch processed"
        );
        Ok(report)
    }

    /// Tracked ids after the cursor, then the rest from the lowest id.
    fn scan_order(&self) -> impl Iterator<Item = PositionId> + '_ {
        let cursor = self.cursor;
        let after = self
            .positions
            .iter()
            .copied()
            .filter(move |id| cursor.map_or(true, |c| *id > c));
        let wrapped = self
            .positions
            .iter()
            .copied()
            .filter(move |id| cursor.map_or(false, |c| *id <= c));
        after.chain(wrapped)
    }

    fn ensure_controller(&self, caller: AccountId) -> Result<(), AdapterError> {
        if caller == self.controller {
            Ok(())
        } else {
            Err(AdapterError::Unauthorized(caller))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::OrderBookConfig;
    use crate::custody::InMemoryLedger;
    use crate::price_feed::MockAggregator;
    use crate::settlement::InMemorySettlement;
    use crate::types::{Amount, StopPrice};
    use rust_decimal_macros::dec;

    const ADMIN: AccountId = AccountId(100);
    const KEEPER: AccountId = AccountId(101);
    const OWNER: AccountId = AccountId(1);

    type Book = OrderBook<InMemoryLedger, InMemorySettlement, MockAggregator>;

    fn book_with(n: usize) -> (Book, Vec<PositionId>) {
        let mut ledger = InMemoryLedger::new();
        let ids: Vec<PositionId> = (0..n)
            .map(|_| ledger.mint(OWNER, Timestamp::from_secs(1_000_000)))
            .collect();
        let mut book = OrderBook::new(
            OrderBookConfig::default(),
            ADMIN,
            ledger,
            InMemorySettlement::new(),
            MockAggregator::new(8).with_answer(1500_0000_0000),
        )
        .unwrap();
        for &id in &ids {
            book.set_take_profit(OWNER, id, StopPrice(2000_0000_0000), StopPrice(1000_0000_0000), Timestamp::from_secs(0))
                .unwrap();
            book.settlement_mut().set_payoff(id, Amount::new(dec!(10)));
        }
        (book, ids)
    }

    fn adapter(ids: &[PositionId], max_batch_size: usize) -> AutomationAdapter {
        let mut adapter = AutomationAdapter::new(AutomationConfig { max_batch_size }, ADMIN, KEEPER);
        for &id in ids {
            adapter.add_position(ADMIN, id).unwrap();
        }
        adapter
    }

    #[test]
    fn idle_when_nothing_triggers() {
        let (book, ids) = book_with(3);
        let mut adapter = adapter(&ids, 10);
        let check = adapter.check(&book, Timestamp::from_secs(1)).unwrap();
        assert_eq!(check, UpkeepCheck::idle());
    }

    #[test]
    fn check_is_bounded_and_ordered() {
        let (mut book, ids) = book_with(5);
        book.oracle_mut().set_answer(900_0000_0000);
        let adapter = adapter(&ids, 2);

        let check = adapter.check(&book, Timestamp::from_secs(1)).unwrap();
        assert!(check.upkeep_needed);
        let batch: Vec<PositionId> = check.perform_data.decode().unwrap();
        assert_eq!(batch, vec![ids[0], ids[1]]);
    }

    #[test]
    fn check_has_no_side_effects() {
        let (mut book, ids) = book_with(2);
        book.oracle_mut().set_answer(900_0000_0000);
        let mut adapter = adapter(&ids, 10);

        let first = adapter.check(&book, Timestamp::from_secs(1)).unwrap();
        let second = adapter.check(&book, Timestamp::from_secs(1)).unwrap();
        assert_eq!(first, second);
        assert_eq!(book.len(), 2);
        assert!(book.settlement().exercised().is_empty());
    }

    #[test]
    fn one_failure_does_not_abort_batch() {
        let (mut book, ids) = book_with(3);
        book.oracle_mut().set_answer(900_0000_0000);
        book.settlement_mut().fail_exercise(ids[1], true);
        let mut adapter = adapter(&ids, 10);

        let check = adapter.check(&book, Timestamp::from_secs(1)).unwrap();
        let report = adapter.execute(&mut book, &check.perform_data, Timestamp::from_secs(1)).unwrap();

        assert_eq!(report.executed_ids(), vec![ids[0], ids[2]]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.hard_failures().count(), 1);
        assert!(!book.take_info(ids[1]).is_absent());
    }

    #[test]
    fn failing_positions_do_not_starve_later_ones() {
        let (mut book, ids) = book_with(4);
        book.oracle_mut().set_answer(900_0000_0000);
        book.settlement_mut().fail_exercise(ids[0], true);
        book.settlement_mut().fail_exercise(ids[1], true);
        let mut adapter = adapter(&ids, 2);

        for cycle in 0..4 {
            let check = adapter.check(&book, Timestamp::from_secs(cycle)).unwrap();
            adapter.execute(&mut book, &check.perform_data, Timestamp::from_secs(cycle)).unwrap();
        }

        assert!(book.settlement().was_exercised(ids[2]));
        assert!(book.settlement().was_exercised(ids[3]));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn scan_resumes_after_last_executed_id() {
        let (mut book, ids) = book_with(5);
        book.oracle_mut().set_answer(900_0000_0000);
        for &id in &ids {
            book.settlement_mut().fail_exercise(id, true);
        }
        let mut adapter = adapter(&ids, 2);

        let first = adapter.check(&book, Timestamp::from_secs(1)).unwrap();
        adapter.execute(&mut book, &first.perform_data, Timestamp::from_secs(1)).unwrap();
        let second: Vec<PositionId> = adapter.check(&book, Timestamp::from_secs(2)).unwrap().perform_data.decode().unwrap();
        assert_eq!(second, vec![ids[2], ids[3]]);

        adapter.execute(&mut book, &Payload::encode(&second).unwrap(), Timestamp::from_secs(2)).unwrap();
        let third: Vec<PositionId> = adapter.check(&book, Timestamp::from_secs(3)).unwrap().perform_data.decode().unwrap();
        assert_eq!(third, vec![ids[4], ids[0]]);
    }

    #[test]
    fn replayed_payload_is_noop() {
        let (mut book, ids) = book_with(2);
        book.oracle_mut().set_answer(2500_0000_0000);
        let mut adapter = adapter(&ids, 10);

        let check = adapter.check(&book, Timestamp::from_secs(1)).unwrap();
        adapter.execute(&mut book, &check.perform_data, Timestamp::from_secs(1)).unwrap();

        let replay = adapter.execute(&mut book, &check.perform_data, Timestamp::from_secs(2)).unwrap();
        assert!(replay.executed.is_empty());
        assert_eq!(replay.failed.len(), 2);
        assert_eq!(replay.hard_failures().count(), 0);
        assert_eq!(book.settlement().exercised().len(), 2);
    }

    #[test]
    fn admin_gates_tracking() {
        let mut adapter = AutomationAdapter::new(AutomationConfig::default(), ADMIN, KEEPER);
        assert!(matches!(
            adapter.add_position(OWNER, PositionId(1)),
            Err(AdapterError::Unauthorized(_))
        ));
        assert!(adapter.add_position(ADMIN, PositionId(1)).unwrap());
        assert!(!adapter.add_position(ADMIN, PositionId(1)).unwrap());
        assert!(adapter.remove_position(ADMIN, PositionId(1)).unwrap());
        assert!(!adapter.is_tracked(PositionId(1)));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let (mut book, ids) = book_with(1);
        let mut adapter = adapter(&ids, 10);
        let result = adapter.execute(&mut book, &Payload::from_bytes(b"not json".to_vec()), Timestamp::from_secs(1));
        assert!(matches!(result, Err(AdapterError::Payload(_))));
    }
}
