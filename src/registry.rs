//! Automation network registry and the fee token that keeps it running.
//!
//! Every upkeep registered with the automation network carries a balance of
//! the fee token. The network stops polling an upkeep whose balance runs dry,
//! which is why the funding watchdog exists.

use std::collections::{HashMap, HashSet};

use crate::types::{AccountId, Amount, CollaboratorError, UpkeepId};

/// The automation network's registry of upkeeps.
pub trait AutomationRegistry {
    /// Fee balance currently held for the registration.
    fn balance_of(&self, id: &UpkeepId) -> Result<Amount, CollaboratorError>;

    /// Pull `amount` of `asset` from `from` and credit it to the registration.
    /// Either both happen or neither: the registration is validated before
    /// the pull, and nothing is credited when the pull fails.
    fn fund(
        &mut self,
        id: &UpkeepId,
        from: AccountId,
        amount: Amount,
        asset: &mut dyn FundingAsset,
    ) -> Result<(), CollaboratorError>;

    /// Account that receives fee tokens on behalf of all registrations.
    fn payee(&self) -> AccountId;
}

/// Fungible fee token.
pub trait FundingAsset {
    fn balance_of(&self, holder: AccountId) -> Amount;

    fn transfer(&mut self, from: AccountId, to: AccountId, amount: Amount) -> Result<(), CollaboratorError>;
}

/// In-memory registry for the sim and tests.
#[derive(Debug)]
pub struct InMemoryRegistry {
    payee: AccountId,
    balances: HashMap<UpkeepId, Amount>,
    // registrations that refuse new funds
    rejecting: HashSet<UpkeepId>,
}

impl InMemoryRegistry {
    pub fn new(payee: AccountId) -> Self {
        Self {
            payee,
            balances: HashMap::new(),
            rejecting: HashSet::new(),
        }
    }

    pub fn register(&mut self, id: UpkeepId, balance: Amount) {
        self.balances.insert(id, balance);
    }

    pub fn cancel(&mut self, id: &UpkeepId) -> Option<Amount> {
        self.balances.remove(id)
    }

    /// Make `fund` refuse this registration, as a paused or migrated upkeep would.
    pub fn reject_funding(&mut self, id: &UpkeepId, reject: bool) {
        if reject {
            self.rejecting.insert(id.clone());
        } else {
            self.rejecting.remove(id);
        }
    }

    /// Simulates the network charging for performed upkeeps.
    pub fn charge(&mut self, id: &UpkeepId, fee: Amount) -> Result<(), CollaboratorError> {
        let balance = self
            .balances
            .get_mut(id)
            .ok_or_else(|| CollaboratorError::UnknownRegistration(id.clone()))?;
        *balance = balance.checked_sub(fee).unwrap_or_default();
        Ok(())
    }
}

impl AutomationRegistry for InMemoryRegistry {
    fn balance_of(&self, id: &UpkeepId) -> Result<Amount, CollaboratorError> {
        self.balances
            .get(id)
            .copied()
            .ok_or_else(|| CollaboratorError::UnknownRegistration(id.clone()))
    }

    fn fund(
        &mut self,
        id: &UpkeepId,
        from: AccountId,
        amount: Amount,
        asset: &mut dyn FundingAsset,
    ) -> Result<(), CollaboratorError> {
        if !self.balances.contains_key(id) {
            return Err(CollaboratorError::UnknownRegistration(id.clone()));
        }
        if self.rejecting.contains(id) {
            return Err(CollaboratorError::Rejected(format!("registration {id} does not accept funds")));
        }

        asset.transfer(from, self.payee, amount)?;
        let balance = self.balances.entry(id.clone()).or_default();
        *balance = balance.add(amount);
        Ok(())
    }

    fn payee(&self) -> AccountId {
        self.payee
    }
}

/// In-memory fee token.
#[derive(Debug, Default)]
pub struct InMemoryToken {
    balances: HashMap<AccountId, Amount>,
}

impl InMemoryToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, to: AccountId, amount: Amount) {
        let balance = self.balances.entry(to).or_default();
        *balance = balance.add(amount);
    }
}

impl FundingAsset for InMemoryToken {
    fn balance_of(&self, holder: AccountId) -> Amount {
        self.balances.get(&holder).copied().unwrap_or_default()
    }

    fn transfer(&mut self, from: AccountId, to: AccountId, amount: Amount) -> Result<(), CollaboratorError> {
        if amount.is_negative() {
            return Err(CollaboratorError::Rejected("negative transfer".to_string()));
        }
        let available = self.balance_of(from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(CollaboratorError::InsufficientBalance {
                available,
                requested: amount,
            })?;

        self.balances.insert(from, remaining);
        let dest = self.balances.entry(to).or_default();
        *dest = dest.add(amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_registry_funding() {
        let mut registry = InMemoryRegistry::new(AccountId(900));
        let mut token = InMemoryToken::new();
        token.mint(AccountId(1), Amount::new(dec!(5)));
        let id = UpkeepId::new("71811323549820858690788095236248551462108397831996880708762786105308124610685");
        registry.register(id.clone(), Amount::new(dec!(1)));

        registry.fund(&id, AccountId(1), Amount::new(dec!(2)), &mut token).unwrap();
        assert_eq!(registry.balance_of(&id).unwrap(), Amount::new(dec!(3)));
        assert_eq!(token.balance_of(AccountId(1)), Amount::new(dec!(3)));
        assert_eq!(token.balance_of(AccountId(900)), Amount::new(dec!(2)));

        registry.charge(&id, Amount::new(dec!(10))).unwrap();
        assert_eq!(registry.balance_of(&id).unwrap(), Amount::zero());
    }

    #[test]
    fn test_unknown_registration() {
        let mut registry = InMemoryRegistry::new(AccountId(900));
        let mut token = InMemoryToken::new();
        token.mint(AccountId(1), Amount::new(dec!(5)));
        let id = UpkeepId::new("1");
        assert!(registry.balance_of(&id).is_err());
        assert!(matches!(
            registry.fund(&id, AccountId(1), Amount::new(dec!(1)), &mut token),
            Err(CollaboratorError::UnknownRegistration(_))
        ));
        assert_eq!(token.balance_of(AccountId(1)), Amount::new(dec!(5)));
    }

    #[test]
    fn test_failed_funding_moves_nothing() {
        let mut registry = InMemoryRegistry::new(AccountId(900));
        let mut token = InMemoryToken::new();
        token.mint(AccountId(1), Amount::new(dec!(1)));
        let id = UpkeepId::new("1");
        registry.register(id.clone(), Amount::zero());

        // pull fails: not enough tokens
        let err = registry.fund(&id, AccountId(1), Amount::new(dec!(2)), &mut token).unwrap_err();
        assert!(matches!(err, CollaboratorError::InsufficientBalance { .. }));
        assert_eq!(registry.balance_of(&id).unwrap(), Amount::zero());

        registry.reject_funding(&id, true);
        let err = registry.fund(&id, AccountId(1), Amount::new(dec!(1)), &mut token).unwrap_err();
        assert!(matches!(err, CollaboratorError::Rejected(_)));
        assert_eq!(token.balance_of(AccountId(1)), Amount::new(dec!(1)));
        assert_eq!(token.balance_of(AccountId(900)), Amount::zero());
    }

    #[test]
    fn test_token_transfer() {
        let mut token = InMemoryToken::new();
        token.mint(AccountId(1), Amount::new(dec!(5)));

        token.transfer(AccountId(1), AccountId(2), Amount::new(dec!(3))).unwrap();
        assert_eq!(token.balance_of(AccountId(1)), Amount::new(dec!(2)));
        assert_eq!(token.balance_of(AccountId(2)), Amount::new(dec!(3)));

        let err = token
            .transfer(AccountId(1), AccountId(2), Amount::new(dec!(3)))
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::InsufficientBalance { .. }));
        assert_eq!(token.balance_of(AccountId(1)), Amount::new(dec!(2)));
    }
}
