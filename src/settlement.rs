// 9.1 settlement.rs: the settlement engine that prices and exercises positions.
// external to this crate. the order book asks it for the payoff and tells it
// to exercise; the value transfer itself happens on the other side.

use std::collections::{HashMap, HashSet};

use crate::types::{Amount, CollaboratorError, PositionId};

// Trait for settlement backends
pub trait SettlementEngine {
    // Current payoff of the position if exercised now. zero when out of the money.
    fn payoff_amount(&self, id: PositionId) -> Result<Amount, CollaboratorError>;

    // Exercise the position and pay the owner of record. returns the amount paid.
    fn exercise(&mut self, id: PositionId) -> Result<Amount, CollaboratorError>;
}

// In memory settlement backend for testing and simulation
#[derive(Debug, Default)]
pub struct InMemorySettlement {
    payoffs: HashMap<PositionId, Amount>,
    exercised: Vec<(PositionId, Amount)>,
    // positions whose exercise is forced to fail
    failing: HashSet<PositionId>,
}

impl InMemorySettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_payoff(&mut self, id: PositionId, amount: Amount) {
        self.payoffs.insert(id, amount);
    }

    pub fn fail_exercise(&mut self, id: PositionId, fail: bool) {
        if fail {
            self.failing.insert(id);
        } else {
            self.failing.remove(&id);
        }
    }

    pub fn exercised(&self) -> &[(PositionId, Amount)] {
        &self.exercised
    }

    pub fn was_exercised(&self, id: PositionId) -> bool {
        self.exercised.iter().any(|(pid, _)| *pid == id)
    }
}

impl SettlementEngine for InMemorySettlement {
    fn payoff_amount(&self, id: PositionId) -> Result<Amount, CollaboratorError> {
        Ok(self.payoffs.get(&id).copied().unwrap_or_default())
    }

    fn exercise(&mut self, id: PositionId) -> Result<Amount, CollaboratorError> {
        if self.failing.contains(&id) {
            return Err(CollaboratorError::Rejected(format!("exercise of {id} reverted")));
        }

        let payoff = self.payoff_amount(id)?;
        if !payoff.is_positive() {
            return Err(CollaboratorError::Rejected(format!("{id} has no payoff")));
        }

        // an exercised position pays out once
        self.payoffs.insert(id, Amount::zero());
        self.exercised.push((id, payoff));
        Ok(payoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exercise_pays_once() {
        let mut backend = InMemorySettlement::new();
        backend.set_payoff(PositionId(1), Amount::new(dec!(100)));

        let paid = backend.exercise(PositionId(1)).unwrap();
        assert_eq!(paid, Amount::new(dec!(100)));
        assert!(backend.was_exercised(PositionId(1)));
        assert_eq!(backend.payoff_amount(PositionId(1)).unwrap(), Amount::zero());

        assert!(backend.exercise(PositionId(1)).is_err());
        assert_eq!(backend.exercised().len(), 1);
    }

    #[test]
    fn test_unpriced_position_has_zero_payoff() {
        let backend = InMemorySettlement::new();
        assert_eq!(backend.payoff_amount(PositionId(42)).unwrap(), Amount::zero());
    }

    #[test]
    fn test_forced_failure() {
        let mut backend = InMemorySettlement::new();
        backend.set_payoff(PositionId(1), Amount::new(dec!(5)));
        backend.fail_exercise(PositionId(1), true);

        assert!(matches!(backend.exercise(PositionId(1)), Err(CollaboratorError::Rejected(_))));
        assert!(!backend.was_exercised(PositionId(1)));

        backend.fail_exercise(PositionId(1), false);
        assert!(backend.exercise(PositionId(1)).is_ok());
    }
}
