//! Farming pool
//!
//! A staking pool that holds one staking token and issues shares 1:1. Share
//! balances farm directly: there is no membership step, every holder of a
//! share earns from the pool's single reward stream.
//!
//! The pool's custody account is `id.account()`. Staking tokens held there
//! back the shares; reward tokens held there back the committed schedule
//! balance. Neither can be rescued.

use crate::config::FarmingConfig;
use crate::errors::{FarmingError, Result};
use crate::hook::{BalanceUpdate, FarmAdmin};
use crate::schedule::{ScheduleLimits, ScheduleState};
use crate::stream::RewardStream;
use crate::token_ledger::TokenLedger;
use drip_types::{AccountId, Amount, FarmId, Timestamp, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmingPool {
    id: FarmId,
    staking_token: TokenId,
    rewards_token: TokenId,
    admin: FarmAdmin,
    limits: ScheduleLimits,
    shares: HashMap<AccountId, Amount>,
    total_supply: Amount,
    stream: RewardStream,
}

impl FarmingPool {
    pub fn new(
        id: FarmId,
        staking_token: TokenId,
        rewards_token: TokenId,
        admin: FarmAdmin,
        config: &FarmingConfig,
    ) -> Self {
        Self {
            id,
            staking_token,
            rewards_token,
            admin,
            limits: config.schedule_limits(),
            shares: HashMap::new(),
            total_supply: 0,
            stream: RewardStream::new(),
        }
    }

    pub fn id(&self) -> FarmId {
        self.id
    }

    /// Account holding the pool's staking and reward tokens.
    pub fn custody(&self) -> AccountId {
        self.id.account()
    }

    pub fn staking_token(&self) -> TokenId {
        self.staking_token
    }

    pub fn rewards_token(&self) -> TokenId {
        self.rewards_token
    }

    pub fn distributor(&self) -> AccountId {
        self.admin.distributor
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.shares.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn state(&self, now: Timestamp) -> ScheduleState {
        self.stream.state(now)
    }

    fn set_shares(&mut self, account: AccountId, balance: Amount) {
        if balance == 0 {
            self.shares.remove(&account);
        } else {
            self.shares.insert(account, balance);
        }
    }

    /// Pull `amount` staking tokens from `account` and mint as many shares.
    pub fn deposit(
        &mut self,
        account: &AccountId,
        amount: Amount,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<()> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(FarmingError::ArithmeticOverflow("pool supply"))?;
        let balance = self.balance_of(account) + amount;
        let custody = self.custody();
        vault.transfer(&self.staking_token, account, &custody, amount)?;

        self.stream
            .update_balances(&BalanceUpdate::mint(*account, amount), self.total_supply, now);
        self.set_shares(*account, balance);
        self.total_supply = supply;
        debug!(target: "pool", account = %account, amount, total_supply = supply, "Deposited");
        Ok(())
    }

    /// Burn `amount` shares and return as many staking tokens.
    pub fn withdraw(
        &mut self,
        account: &AccountId,
        amount: Amount,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<()> {
        let available = self.balance_of(account);
        if amount > available {
            return Err(FarmingError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        let custody = self.custody();
        vault.transfer(&self.staking_token, &custody, account, amount)?;

        self.stream
            .update_balances(&BalanceUpdate::burn(*account, amount), self.total_supply, now);
        self.set_shares(*account, available - amount);
        self.total_supply -= amount;
        debug!(target: "pool", account = %account, amount, total_supply = self.total_supply, "Withdrew");
        Ok(())
    }

    /// Withdraw every share and claim. Returns `(withdrawn, claimed)`.
    pub fn exit(
        &mut self,
        account: &AccountId,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<(Amount, Amount)> {
        let balance = self.balance_of(account);
        self.withdraw(account, balance, now, vault)?;
        let claimed = self.claim(account, now, vault)?;
        Ok((balance, claimed))
    }

    /// Move shares between holders; the pool's supply is unchanged.
    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<()> {
        let from_balance = self.balance_of(from);
        if amount > from_balance {
            return Err(FarmingError::InsufficientBalance {
                requested: amount,
                available: from_balance,
            });
        }
        if amount == 0 || from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(FarmingError::ArithmeticOverflow("pool shares"))?;

        self.stream.update_balances(
            &BalanceUpdate::transfer(*from, *to, amount),
            self.total_supply,
            now,
        );
        self.set_shares(*from, from_balance - amount);
        self.set_shares(*to, to_balance);
        Ok(())
    }

    pub fn farmed(&self, account: &AccountId, now: Timestamp) -> Amount {
        self.stream
            .farmed(account, self.balance_of(account), self.total_supply, now)
    }

    pub fn claim(
        &mut self,
        account: &AccountId,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        let custody = self.custody();
        let balance = self.balance_of(account);
        let amount = self.stream.claim(
            &self.rewards_token,
            &custody,
            account,
            balance,
            self.total_supply,
            now,
            vault,
        )?;
        if amount > 0 {
            info!(target: "pool", account = %account, amount, "Rewards claimed");
        }
        Ok(amount)
    }

    pub fn start_farming(
        &mut self,
        caller: &AccountId,
        amount: Amount,
        period: u64,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        self.admin.ensure_distributor(caller)?;
        let custody = self.custody();
        self.stream.start_farming(
            &self.rewards_token,
            caller,
            &custody,
            amount,
            period,
            self.total_supply,
            now,
            &self.limits,
            vault,
        )
    }

    pub fn stop_farming(
        &mut self,
        caller: &AccountId,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        self.admin.ensure_distributor(caller)?;
        let custody = self.custody();
        self.stream.stop_farming(
            &self.rewards_token,
            &custody,
            caller,
            self.total_supply,
            now,
            vault,
        )
    }

    /// Tokens of `token` the pool must keep: deposits and committed reward.
    fn reserved(&self, token: &TokenId) -> Amount {
        let mut reserved = 0;
        if *token == self.staking_token {
            reserved += self.total_supply;
        }
        if *token == self.rewards_token {
            reserved += self.stream.schedule.balance;
        }
        reserved
    }

    fn rescuable(&self, token: &TokenId, vault: &dyn TokenLedger) -> Amount {
        vault
            .balance_of(token, &self.custody())
            .saturating_sub(self.reserved(token))
    }

    pub fn rescue_funds(
        &mut self,
        caller: &AccountId,
        token: &TokenId,
        amount: Amount,
        vault: &mut dyn TokenLedger,
    ) -> Result<()> {
        self.admin.ensure_distributor(caller)?;
        let available = self.rescuable(token, vault);
        if amount > available {
            return Err(FarmingError::InsufficientFunds {
                requested: amount,
                available,
            });
        }
        vault.transfer(token, &self.custody(), caller, amount)?;
        info!(target: "pool", token = %token, amount, "Funds rescued");
        Ok(())
    }

    pub fn withdrawable(
        &self,
        token: &TokenId,
        at: Option<Timestamp>,
        vault: &dyn TokenLedger,
    ) -> Amount {
        let rescuable = self.rescuable(token, vault);
        match at {
            Some(t) if *token == self.rewards_token => {
                rescuable.saturating_add(self.stream.schedule.remaining(t))
            }
            _ => rescuable,
        }
    }

    pub fn set_distributor(&mut self, caller: &AccountId, distributor: AccountId) -> Result<()> {
        self.admin.ensure_owner(caller)?;
        self.admin.distributor = distributor;
        info!(target: "pool", pool = %self.id, "Distributor changed");
        Ok(())
    }
}
