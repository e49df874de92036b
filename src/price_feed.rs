// Price Feed Integration
//
// The order book only needs the latest reference price of the underlying.
// Any aggregator (Chainlink style round data, a CEX median, a test stub) can
// implement PriceOracle. Answers are signed scaled integers with their own
// decimal precision, exactly like aggregator round data.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::CollaboratorError;

/// Latest answer from an oracle: `value` scaled by `10^decimals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclePrice {
    pub value: i128,
    pub decimals: u32,
}

impl OraclePrice {
    pub fn new(value: i128, decimals: u32) -> Self {
        Self { value, decimals }
    }

    /// Decimal form of the answer. Rejects non-positive answers and
    /// precisions Decimal cannot represent.
    pub fn to_decimal(&self) -> Result<Decimal, CollaboratorError> {
        if self.value <= 0 {
            return Err(CollaboratorError::PriceUnavailable(format!(
                "non-positive answer {}",
                self.value
            )));
        }
        Decimal::try_from_i128_with_scale(self.value, self.decimals).map_err(|e| {
            CollaboratorError::PriceUnavailable(format!(
                "answer {} at {} decimals: {e}",
                self.value, self.decimals
            ))
        })
    }
}

/// Read-only source of the current underlying price.
pub trait PriceOracle {
    fn current_price(&self) -> Result<OraclePrice, CollaboratorError>;
}

/// In-memory aggregator. Holds one answer that tests and the sim can move.
#[derive(Debug, Clone)]
pub struct MockAggregator {
    answer: i128,
    decimals: u32,
    healthy: bool,
}

impl MockAggregator {
    pub fn new(decimals: u32) -> Self {
        Self {
            answer: 0,
            decimals,
            healthy: true,
        }
    }

    pub fn with_answer(mut self, answer: i128) -> Self {
        self.answer = answer;
        self
    }

    pub fn set_answer(&mut self, answer: i128) {
        self.answer = answer;
    }

    pub fn set_healthy(&mut self, healthy: bool) {
        self.healthy = healthy;
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }
}

impl PriceOracle for MockAggregator {
    fn current_price(&self) -> Result<OraclePrice, CollaboratorError> {
        if !self.healthy {
            return Err(CollaboratorError::PriceUnavailable(
                "aggregator offline".to_string(),
            ));
        }
        Ok(OraclePrice::new(self.answer, self.decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn answer_scaling() {
        let price = OraclePrice::new(1500_0000_0000, 8);
        assert_eq!(price.to_decimal().unwrap(), dec!(1500));

        let six = OraclePrice::new(1500_000_000, 6);
        assert_eq!(six.to_decimal().unwrap(), dec!(1500));
    }

    #[test]
    fn non_positive_answer_rejected() {
        assert!(matches!(
            OraclePrice::new(0, 8).to_decimal(),
            Err(CollaboratorError::PriceUnavailable(_))
        ));
        assert!(OraclePrice::new(-5, 8).to_decimal().is_err());
    }

    #[test]
    fn mock_aggregator_health() {
        let mut agg = MockAggregator::new(8).with_answer(1000_0000_0000);
        assert_eq!(agg.current_price().unwrap().value, 1000_0000_0000);

        agg.set_healthy(false);
        assert!(agg.current_price().is_err());
    }
}
