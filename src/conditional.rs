//! Stop orders on option positions and the predicate that fires them.
//!
//! A position carries at most one stop order: an upper and a lower threshold
//! in oracle precision. Either threshold may be zero, which leaves that side
//! unset, and an order with both sides zero does not exist. Reads of a deleted
//! order and of one that was never set are the same zero-valued record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{Amount, StopPrice, Timestamp};

/// Upper/lower exit thresholds for one position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopOrder {
    pub upper_stop_price: StopPrice,
    pub lower_stop_price: StopPrice,
}

impl StopOrder {
    pub fn new(upper_stop_price: StopPrice, lower_stop_price: StopPrice) -> Self {
        Self {
            upper_stop_price,
            lower_stop_price,
        }
    }

    /// The zero-valued record every absent order reads as.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_absent(&self) -> bool {
        !self.upper_stop_price.is_set() && !self.lower_stop_price.is_set()
    }
}

/// Why an order became executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Price at or below the lower stop.
    LowerStop,
    /// Price at or above the upper stop.
    UpperStop,
    /// Position is inside the execution window before expiry.
    ExpiryWindow,
}

/// Market state a stop order is judged against. `price` and the stops are
/// compared as decimals, so the oracle may report a different precision than
/// the one the stops were stored at.
#[derive(Debug, Clone, Copy)]
pub struct TriggerInputs {
    pub price: Decimal,
    pub stop_decimals: u32,
    pub payoff: Amount,
    pub expiration: Timestamp,
    pub now: Timestamp,
    pub time_to_execution: Duration,
}

/// Evaluate a stop order. `None` means not executable.
///
/// Nothing fires without a positive payoff. Price stops are inclusive on both
/// sides. The expiry window is inclusive too: exactly `time_to_execution`
/// left counts as inside it, and so does an expiration already in the past.
pub fn evaluate(order: &StopOrder, inputs: &TriggerInputs) -> Option<TriggerReason> {
    if order.is_absent() || !inputs.payoff.is_positive() {
        return None;
    }

    if order.lower_stop_price.is_set() {
        if let Some(lower) = order.lower_stop_price.to_decimal(inputs.stop_decimals) {
            if inputs.price <= lower {
                return Some(TriggerReason::LowerStop);
            }
        }
    }

    if order.upper_stop_price.is_set() {
        if let Some(upper) = order.upper_stop_price.to_decimal(inputs.stop_decimals) {
            if inputs.price >= upper {
                return Some(TriggerReason::UpperStop);
            }
        }
    }

    let window = i64::try_from(inputs.time_to_execution.as_secs()).unwrap_or(i64::MAX);
    if inputs.now.secs_until(inputs.expiration) <= window {
        return Some(TriggerReason::ExpiryWindow);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const WEEK: i64 = 60 * 60 * 24 * 7;

    fn band() -> StopOrder {
        StopOrder::new(StopPrice(2000_0000_0000), StopPrice(1000_0000_0000))
    }

    fn inputs(price: Decimal, payoff: Decimal) -> TriggerInputs {
        TriggerInputs {
            price,
            stop_decimals: 8,
            payoff: Amount::new(payoff),
            expiration: Timestamp::from_secs(WEEK),
            now: Timestamp::from_secs(0),
            time_to_execution: Duration::from_secs(1800),
        }
    }

    #[test]
    fn absent_order_never_fires() {
        let order = StopOrder::absent();
        assert!(order.is_absent());
        assert_eq!(evaluate(&order, &inputs(dec!(1), dec!(100))), None);

        let mut near_expiry = inputs(dec!(1500), dec!(100));
        near_expiry.now = Timestamp::from_secs(WEEK);
        assert_eq!(evaluate(&order, &near_expiry), None);
    }

    #[test]
    fn price_inside_band_does_not_fire() {
        assert_eq!(evaluate(&band(), &inputs(dec!(1500), dec!(100))), None);
    }

    #[test]
    fn lower_stop_is_inclusive() {
        assert_eq!(
            evaluate(&band(), &inputs(dec!(1000), dec!(100))),
            Some(TriggerReason::LowerStop)
        );
        assert_eq!(
            evaluate(&band(), &inputs(dec!(999.99), dec!(1))),
            Some(TriggerReason::LowerStop)
        );
    }

    #[test]
    fn upper_stop_is_inclusive() {
        assert_eq!(
            evaluate(&band(), &inputs(dec!(2000), dec!(100))),
            Some(TriggerReason::UpperStop)
        );
    }

    #[test]
    fn zero_payoff_blocks_everything() {
        assert_eq!(evaluate(&band(), &inputs(dec!(1000), dec!(0))), None);

        let mut near_expiry = inputs(dec!(1500), dec!(0));
        near_expiry.now = Timestamp::from_secs(WEEK - 10);
        assert_eq!(evaluate(&band(), &near_expiry), None);
    }

    #[test]
    fn single_sided_orders() {
        let upper_only = StopOrder::new(StopPrice(2000_0000_0000), StopPrice::UNSET);
        // an unset lower side is not "price <= 0"
        assert_eq!(evaluate(&upper_only, &inputs(dec!(500), dec!(10))), None);
        assert_eq!(
            evaluate(&upper_only, &inputs(dec!(2500), dec!(10))),
            Some(TriggerReason::UpperStop)
        );

        let lower_only = StopOrder::new(StopPrice::UNSET, StopPrice(1000_0000_0000));
        assert_eq!(evaluate(&lower_only, &inputs(dec!(5000), dec!(10))), None);
        assert_eq!(
            evaluate(&lower_only, &inputs(dec!(900), dec!(10))),
            Some(TriggerReason::LowerStop)
        );
    }

    #[test]
    fn expiry_window_boundary() {
        let mut at_edge = inputs(dec!(1500), dec!(100));
        at_edge.now = Timestamp::from_secs(WEEK - 1800);
        assert_eq!(evaluate(&band(), &at_edge), Some(TriggerReason::ExpiryWindow));

        let mut just_outside = inputs(dec!(1500), dec!(100));
        just_outside.now = Timestamp::from_secs(WEEK - 1801);
        assert_eq!(evaluate(&band(), &just_outside), None);

        let mut expired = inputs(dec!(1500), dec!(100));
        expired.now = Timestamp::from_secs(WEEK + 1);
        assert_eq!(evaluate(&band(), &expired), Some(TriggerReason::ExpiryWindow));
    }

    #[test]
    fn oracle_precision_differs_from_stops() {
        // stops at 8 decimals, oracle reporting whole dollars
        let mut i = inputs(dec!(1000), dec!(1));
        i.stop_decimals = 8;
        assert_eq!(evaluate(&band(), &i), Some(TriggerReason::LowerStop));

        // same stops read at 6 decimals are 100x larger
        i.stop_decimals = 6;
        i.price = dec!(150000);
        assert_eq!(evaluate(&band(), &i), None);
    }
}
