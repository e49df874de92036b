// 8.0.2: result types and errors for order book operations.

use crate::conditional::TriggerReason;
use crate::types::{AccountId, Amount, CollaboratorError, PositionId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub position_id: PositionId,
    pub reason: TriggerReason,
    pub paid: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderBookError {
    #[error("Caller {caller} must be the owner of position {position_id}")]
    NotOwner { position_id: PositionId, caller: AccountId },

    #[error("Position {position_id} expired at {expiration}")]
    Expired { position_id: PositionId, expiration: Timestamp },

    #[error("Stop order conditions not met for position {0}")]
    ConditionsNotMet(PositionId),

    #[error("Caller {0} is not the order book admin")]
    Unauthorized(AccountId),

    #[error("Invalid order book config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl OrderBookError {
    /// True when a later poll may succeed without anyone changing their inputs.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrderBookError::ConditionsNotMet(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conditions_not_met_is_transient() {
        assert!(OrderBookError::ConditionsNotMet(PositionId(1)).is_transient());
        assert!(!OrderBookError::NotOwner {
            position_id: PositionId(1),
            caller: AccountId(2)
        }
        .is_transient());
        assert!(!OrderBookError::Collaborator(CollaboratorError::UnknownPosition(PositionId(1))).is_transient());
    }
}
