//! Token ledger interface for reward custody
//!
//! Provides a lightweight, deterministic interface for moving reward and
//! staking tokens between holders, distributors and farms.
//!
//! Farms never hold a reference to a ledger; one is passed into every call
//! that moves tokens, so a host can back it with whatever storage it has.

use crate::errors::{FarmingError, Result};
use drip_types::{AccountId, Amount, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Interface for token ledger operations.
pub trait TokenLedger {
    /// Retrieve an account's balance of `token`.
    fn balance_of(&self, token: &TokenId, account: &AccountId) -> Amount;

    /// Move `amount` of `token`. Fails without effect when `from` is short.
    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()>;

    /// Create `amount` of `token` for `account`.
    fn mint(&mut self, token: &TokenId, account: &AccountId, amount: Amount) -> Result<()>;

    /// Return total supply of `token` across all accounts.
    fn total_supply(&self, token: &TokenId) -> Amount;
}

// -----------------------------------------------------------------------------
// In-memory implementation (for hosts and simulation)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryTokenLedger {
    balances: HashMap<TokenId, HashMap<AccountId, Amount>>,
    supplies: HashMap<TokenId, Amount>,
}

impl InMemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn debit(&mut self, token: &TokenId, account: &AccountId, amount: Amount) -> Result<()> {
        let available = self.balance_of(token, account);
        if available < amount {
            return Err(FarmingError::InsufficientFunds {
                requested: amount,
                available,
            });
        }
        let accounts = self.balances.entry(*token).or_default();
        if available == amount {
            accounts.remove(account);
        } else {
            accounts.insert(*account, available - amount);
        }
        Ok(())
    }

    fn credit(&mut self, token: &TokenId, account: &AccountId, amount: Amount) -> Result<()> {
        let current = self.balance_of(token, account);
        let updated = current
            .checked_add(amount)
            .ok_or(FarmingError::ArithmeticOverflow("token balance"))?;
        if updated > 0 {
            self.balances.entry(*token).or_default().insert(*account, updated);
        }
        Ok(())
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn balance_of(&self, token: &TokenId, account: &AccountId) -> Amount {
        self.balances
            .get(token)
            .and_then(|accounts| accounts.get(account))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        if amount == 0 || from == to {
            // Still reject a transfer the sender could not cover.
            let available = self.balance_of(token, from);
            if available < amount {
                return Err(FarmingError::InsufficientFunds {
                    requested: amount,
                    available,
                });
            }
            return Ok(());
        }
        if self.balance_of(token, to).checked_add(amount).is_none() {
            return Err(FarmingError::ArithmeticOverflow("token balance"));
        }
        self.debit(token, from, amount)?;
        self.credit(token, to, amount)
    }

    fn mint(&mut self, token: &TokenId, account: &AccountId, amount: Amount) -> Result<()> {
        let supply = self.total_supply(token);
        let new_supply = supply
            .checked_add(amount)
            .ok_or(FarmingError::ArithmeticOverflow("token supply"))?;
        self.credit(token, account, amount)?;
        self.supplies.insert(*token, new_supply);
        Ok(())
    }

    fn total_supply(&self, token: &TokenId) -> Amount {
        self.supplies.get(token).copied().unwrap_or(0)
    }
}

// -----------------------------------------------------------------------------
// Mock ledger (records every transfer for assertions)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct MockTokenLedger {
    inner: InMemoryTokenLedger,
    transfer_calls: Vec<(TokenId, AccountId, AccountId, Amount)>,
    mint_calls: Vec<(TokenId, AccountId, Amount)>,
}

impl MockTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_transfer_calls(&self) -> &[(TokenId, AccountId, AccountId, Amount)] {
        &self.transfer_calls
    }

    pub fn get_mint_calls(&self) -> &[(TokenId, AccountId, Amount)] {
        &self.mint_calls
    }

    pub fn clear_calls(&mut self) {
        self.transfer_calls.clear();
        self.mint_calls.clear();
    }
}

impl TokenLedger for MockTokenLedger {
    fn balance_of(&self, token: &TokenId, account: &AccountId) -> Amount {
        self.inner.balance_of(token, account)
    }

    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.inner.transfer(token, from, to, amount)?;
        self.transfer_calls.push((*token, *from, *to, amount));
        Ok(())
    }

    fn mint(&mut self, token: &TokenId, account: &AccountId, amount: Amount) -> Result<()> {
        self.inner.mint(token, account, amount)?;
        self.mint_calls.push((*token, *account, amount));
        Ok(())
    }

    fn total_supply(&self, token: &TokenId) -> Amount {
        self.inner.total_supply(token)
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_ledger_operations() {
        let mut ledger = InMemoryTokenLedger::new();
        let token = TokenId::from_label("RWD");
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");

        ledger.mint(&token, &alice, 1_000).unwrap();
        assert_eq!(ledger.total_supply(&token), 1_000);

        ledger.transfer(&token, &alice, &bob, 300).unwrap();
        assert_eq!(ledger.balance_of(&token, &alice), 700);
        assert_eq!(ledger.balance_of(&token, &bob), 300);
        assert_eq!(ledger.total_supply(&token), 1_000);
    }

    #[test]
    fn test_insufficient_funds() {
        let mut ledger = InMemoryTokenLedger::new();
        let token = TokenId::from_label("RWD");
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");

        ledger.mint(&token, &alice, 1_000).unwrap();
        let result = ledger.transfer(&token, &alice, &bob, 1_500);
        assert_eq!(
            result,
            Err(FarmingError::InsufficientFunds {
                requested: 1_500,
                available: 1_000
            })
        );
        assert_eq!(ledger.balance_of(&token, &alice), 1_000);
        assert_eq!(ledger.balance_of(&token, &bob), 0);
    }

    #[test]
    fn test_tokens_are_isolated() {
        let mut ledger = InMemoryTokenLedger::new();
        let a = TokenId::from_label("A");
        let b = TokenId::from_label("B");
        let alice = AccountId::from_label("alice");

        ledger.mint(&a, &alice, 5).unwrap();
        assert_eq!(ledger.balance_of(&b, &alice), 0);
        assert_eq!(ledger.total_supply(&b), 0);
    }

    #[test]
    fn test_mock_ledger_calls() {
        let mut mock = MockTokenLedger::new();
        let token = TokenId::from_label("RWD");
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");

        mock.mint(&token, &alice, 1_000).unwrap();
        mock.transfer(&token, &alice, &bob, 300).unwrap();
        assert!(mock.transfer(&token, &bob, &alice, 301).is_err());

        assert_eq!(mock.get_mint_calls(), &[(token, alice, 1_000)]);
        assert_eq!(mock.get_transfer_calls(), &[(token, alice, bob, 300)]);

        mock.clear_calls();
        assert!(mock.get_transfer_calls().is_empty());
    }
}
