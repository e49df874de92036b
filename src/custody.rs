// 9.2 custody.rs: position ledger. owner of record, operator approvals, expiry.
// the ledger lives outside this crate; InMemoryLedger stands in for it in the
// sim and in tests. nothing here is ever cached by the order book.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::types::{AccountId, CollaboratorError, PositionId, Timestamp};

// Ownership and expiry queries for option positions
pub trait PositionLedger {
    fn owner_of(&self, id: PositionId) -> Result<AccountId, CollaboratorError>;

    // true for the owner, the token's approved address, or an operator
    // approved for all of the owner's positions
    fn is_approved_or_owner(&self, caller: AccountId, id: PositionId) -> Result<bool, CollaboratorError>;

    fn expiration_of(&self, id: PositionId) -> Result<Timestamp, CollaboratorError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    pub owner: AccountId,
    pub approved: Option<AccountId>,
    pub expiration: Timestamp,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    positions: HashMap<PositionId, PositionRecord>,
    // (owner, operator)
    operators: HashSet<(AccountId, AccountId)>,
    next_id: u64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
            operators: HashSet::new(),
            next_id: 1,
        }
    }

    // ids start at 1
    pub fn mint(&mut self, owner: AccountId, expiration: Timestamp) -> PositionId {
        let id = PositionId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.positions.insert(
            id,
            PositionRecord {
                owner,
                approved: None,
                expiration,
            },
        );
        id
    }

    pub fn set_expiration(&mut self, id: PositionId, expiration: Timestamp) -> Result<(), CollaboratorError> {
        let record = self.record_mut(id)?;
        record.expiration = expiration;
        Ok(())
    }

    pub fn approve(&mut self, id: PositionId, operator: Option<AccountId>) -> Result<(), CollaboratorError> {
        let record = self.record_mut(id)?;
        record.approved = operator;
        Ok(())
    }

    pub fn set_approval_for_all(&mut self, owner: AccountId, operator: AccountId, approved: bool) {
        if approved {
            self.operators.insert((owner, operator));
        } else {
            self.operators.remove(&(owner, operator));
        }
    }

    // a transfer clears the per-token approval, like ERC-721
    pub fn transfer(&mut self, id: PositionId, to: AccountId) -> Result<(), CollaboratorError> {
        let record = self.record_mut(id)?;
        record.owner = to;
        record.approved = None;
        Ok(())
    }

    pub fn burn(&mut self, id: PositionId) -> Option<PositionRecord> {
        self.positions.remove(&id)
    }

    pub fn get(&self, id: PositionId) -> Option<&PositionRecord> {
        self.positions.get(&id)
    }

    fn record_mut(&mut self, id: PositionId) -> Result<&mut PositionRecord, CollaboratorError> {
        self.positions
            .get_mut(&id)
            .ok_or(CollaboratorError::UnknownPosition(id))
    }

    fn record(&self, id: PositionId) -> Result<&PositionRecord, CollaboratorError> {
        self.positions
            .get(&id)
            .ok_or(CollaboratorError::UnknownPosition(id))
    }
}

impl PositionLedger for InMemoryLedger {
    fn owner_of(&self, id: PositionId) -> Result<AccountId, CollaboratorError> {
        Ok(self.record(id)?.owner)
    }

    fn is_approved_or_owner(&self, caller: AccountId, id: PositionId) -> Result<bool, CollaboratorError> {
        let record = self.record(id)?;
        Ok(record.owner == caller
            || record.approved == Some(caller)
            || self.operators.contains(&(record.owner, caller)))
    }

    fn expiration_of(&self, id: PositionId) -> Result<Timestamp, CollaboratorError> {
        Ok(self.record(id)?.expiration)
    }
}
