//! Single reward token farm.

use crate::config::FarmingConfig;
use crate::errors::{FarmingError, Result};
use crate::gas::{self, GasMeter};
use crate::hook::{BalanceUpdate, FarmAdmin, FarmPlugin};
use crate::schedule::{ScheduleLimits, ScheduleState};
use crate::stream::RewardStream;
use crate::token_ledger::TokenLedger;
use drip_types::{AccountId, Amount, FarmId, Timestamp, TokenId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    id: FarmId,
    rewards_token: TokenId,
    admin: FarmAdmin,
    limits: ScheduleLimits,
    total_supply: Amount,
    stream: RewardStream,
}

impl Farm {
    pub fn new(id: FarmId, rewards_token: TokenId, admin: FarmAdmin, config: &FarmingConfig) -> Self {
        Self {
            id,
            rewards_token,
            admin,
            limits: config.schedule_limits(),
            total_supply: 0,
            stream: RewardStream::new(),
        }
    }

    pub fn rewards_token(&self) -> TokenId {
        self.rewards_token
    }

    pub fn admin(&self) -> &FarmAdmin {
        &self.admin
    }

    pub fn stream(&self) -> &RewardStream {
        &self.stream
    }

    pub fn state(&self, now: Timestamp) -> ScheduleState {
        self.stream.state(now)
    }

    fn ensure_token(&self, token: &TokenId) -> Result<()> {
        if *token != self.rewards_token {
            return Err(FarmingError::RewardsTokenNotFound(*token));
        }
        Ok(())
    }
}

/// Supply after `update`, checked before anything is written.
pub(crate) fn next_supply(total_supply: Amount, update: &BalanceUpdate) -> Result<Amount> {
    match (update.from.is_some(), update.to.is_some()) {
        (false, true) => total_supply
            .checked_add(update.amount)
            .ok_or(FarmingError::ArithmeticOverflow("farm total supply")),
        (true, false) => {
            total_supply
                .checked_sub(update.amount)
                .ok_or(FarmingError::InsufficientBalance {
                    requested: update.amount,
                    available: total_supply,
                })
        }
        _ => Ok(total_supply),
    }
}

impl FarmPlugin for Farm {
    fn id(&self) -> FarmId {
        self.id
    }

    fn total_supply(&self) -> Amount {
        self.total_supply
    }

    fn rewards_tokens(&self) -> Vec<TokenId> {
        vec![self.rewards_token]
    }

    fn update_balances(
        &mut self,
        update: &BalanceUpdate,
        now: Timestamp,
        meter: &mut GasMeter,
    ) -> Result<()> {
        let supply = next_supply(self.total_supply, update)?;
        meter.charge(gas::update_cost(1, update.writes(), update.changes_supply()))?;

        self.stream.update_balances(update, self.total_supply, now);
        self.total_supply = supply;
        debug!(
            target: "farming",
            farm = %self.id,
            amount = update.amount,
            total_supply = supply,
            "Balances updated"
        );
        Ok(())
    }

    fn farmed(
        &self,
        token: &TokenId,
        account: &AccountId,
        balance: Amount,
        now: Timestamp,
    ) -> Result<Amount> {
        self.ensure_token(token)?;
        Ok(self.stream.farmed(account, balance, self.total_supply, now))
    }

    fn claim(
        &mut self,
        token: &TokenId,
        account: &AccountId,
        balance: Amount,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        self.ensure_token(token)?;
        let holder = self.id.account();
        self.stream
            .claim(token, &holder, account, balance, self.total_supply, now, vault)
    }

    fn start_farming(
        &mut self,
        caller: &AccountId,
        token: &TokenId,
        amount: Amount,
        period: u64,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        self.admin.ensure_distributor(caller)?;
        self.ensure_token(token)?;
        let holder = self.id.account();
        self.stream.start_farming(
            token,
            caller,
            &holder,
            amount,
            period,
            self.total_supply,
            now,
            &self.limits,
            vault,
        )
    }

    fn stop_farming(
        &mut self,
        caller: &AccountId,
        token: &TokenId,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        self.admin.ensure_distributor(caller)?;
        self.ensure_token(token)?;
        let holder = self.id.account();
        self.stream
            .stop_farming(token, &holder, caller, self.total_supply, now, vault)
    }

    fn rescue_funds(
        &mut self,
        caller: &AccountId,
        token: &TokenId,
        amount: Amount,
        vault: &mut dyn TokenLedger,
    ) -> Result<()> {
        self.admin.ensure_distributor(caller)?;
        let holder = self.id.account();
        if *token == self.rewards_token {
            self.stream.check_rescue(token, &holder, amount, vault)?;
        }
        vault.transfer(token, &holder, caller, amount)?;
        info!(target: "farming", farm = %self.id, token = %token, amount, "Funds rescued");
        Ok(())
    }

    fn withdrawable(
        &self,
        token: &TokenId,
        at: Option<Timestamp>,
        vault: &dyn TokenLedger,
    ) -> Result<Amount> {
        let holder = self.id.account();
        if *token != self.rewards_token {
            return Ok(vault.balance_of(token, &holder));
        }
        Ok(self.stream.withdrawable(token, &holder, at, vault))
    }

    fn distributor(&self) -> AccountId {
        self.admin.distributor
    }

    fn set_distributor(&mut self, caller: &AccountId, distributor: AccountId) -> Result<()> {
        self.admin.ensure_owner(caller)?;
        self.admin.distributor = distributor;
        info!(target: "farming", farm = %self.id, "Distributor changed");
        Ok(())
    }
}
