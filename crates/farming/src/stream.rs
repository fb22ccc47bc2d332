//! Reward stream: one reward token's schedule, accumulator and corrections.
//!
//! Single-token farms own one stream, multi-token farms own one per
//! registered token, the farming pool owns one. Token movements are ordered
//! so that every fallible step happens before any stream state changes.

use crate::accumulator::Accumulator;
use crate::correction::CorrectionLedger;
use crate::errors::{FarmingError, Result};
use crate::hook::BalanceUpdate;
use crate::schedule::{RewardSchedule, ScheduleLimits, ScheduleState};
use crate::token_ledger::TokenLedger;
use drip_types::{AccountId, Amount, Timestamp, TokenId, U256};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardStream {
    pub schedule: RewardSchedule,
    pub accumulator: Accumulator,
    pub corrections: CorrectionLedger,
}

impl RewardStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, now: Timestamp) -> ScheduleState {
        self.schedule.state(now)
    }

    pub fn farmed_per_token(&self, total_supply: Amount, now: Timestamp) -> U256 {
        self.accumulator
            .farmed_per_token_at(&self.schedule, total_supply, now)
    }

    pub fn farmed(
        &self,
        account: &AccountId,
        balance: Amount,
        total_supply: Amount,
        now: Timestamp,
    ) -> Amount {
        let fpt = self.farmed_per_token(total_supply, now);
        self.corrections.farmed(account, balance, fpt)
    }

    /// Settle with the supply staked before the update, then shift
    /// corrections.
    pub fn update_balances(
        &mut self,
        update: &BalanceUpdate,
        supply_before: Amount,
        now: Timestamp,
    ) {
        let fpt = self
            .accumulator
            .settle(&self.schedule, supply_before, now);
        self.corrections.apply(update, fpt);
    }

    /// Pay `account` everything it farmed. Returns the amount paid.
    #[allow(clippy::too_many_arguments)]
    pub fn claim(
        &mut self,
        token: &TokenId,
        holder: &AccountId,
        account: &AccountId,
        balance: Amount,
        total_supply: Amount,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        let amount = self.farmed(account, balance, total_supply, now);
        if amount > 0 {
            vault.transfer(token, holder, account, amount)?;
        }
        let fpt = self
            .accumulator
            .settle(&self.schedule, total_supply, now);
        if amount > 0 {
            self.corrections.erase(account, balance, fpt);
            self.schedule.record_claim(amount);
        }
        Ok(amount)
    }

    /// Pull `amount` from `funder` into `holder` and open a new window.
    #[allow(clippy::too_many_arguments)]
    pub fn start_farming(
        &mut self,
        token: &TokenId,
        funder: &AccountId,
        holder: &AccountId,
        amount: Amount,
        period: u64,
        total_supply: Amount,
        now: Timestamp,
        limits: &ScheduleLimits,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        self.schedule.validate_start(now, amount, period, limits)?;
        if amount > 0 {
            vault.transfer(token, funder, holder, amount)?;
        }
        self.accumulator.settle(&self.schedule, total_supply, now);
        let reward = self.schedule.start(now, amount, period, limits)?;
        info!(
            target: "farming",
            token = %token,
            amount,
            reward,
            period,
            finished = self.schedule.finished,
            "Farming started"
        );
        Ok(reward)
    }

    /// Close the window and refund the unstreamed remainder to `recipient`.
    pub fn stop_farming(
        &mut self,
        token: &TokenId,
        holder: &AccountId,
        recipient: &AccountId,
        total_supply: Amount,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        let leftover = self.schedule.remaining(now);
        if leftover > 0 {
            vault.transfer(token, holder, recipient, leftover)?;
        }
        self.accumulator.settle(&self.schedule, total_supply, now);
        let refunded = self.schedule.stop(now);
        info!(
            target: "farming",
            token = %token,
            refunded,
            "Farming stopped"
        );
        Ok(refunded)
    }

    /// Tokens `holder` keeps beyond what is committed to this stream.
    pub fn rescuable(&self, token: &TokenId, holder: &AccountId, vault: &dyn TokenLedger) -> Amount {
        vault
            .balance_of(token, holder)
            .saturating_sub(self.schedule.balance)
    }

    /// Reject a rescue that would dip into committed reward.
    pub fn check_rescue(
        &self,
        token: &TokenId,
        holder: &AccountId,
        amount: Amount,
        vault: &dyn TokenLedger,
    ) -> Result<()> {
        let available = self.rescuable(token, holder, vault);
        if amount > available {
            return Err(FarmingError::InsufficientFunds {
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    pub fn withdrawable(
        &self,
        token: &TokenId,
        holder: &AccountId,
        at: Option<Timestamp>,
        vault: &dyn TokenLedger,
    ) -> Amount {
        let rescuable = self.rescuable(token, holder, vault);
        match at {
            Some(t) => rescuable.saturating_add(self.schedule.remaining(t)),
            None => rescuable,
        }
    }
}
