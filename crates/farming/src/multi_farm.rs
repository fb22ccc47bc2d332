//! Multi-reward farm
//!
//! Same membership and supply tracking as [`Farm`](crate::farm::Farm), with
//! up to `max_rewards_tokens` independent reward streams. Every balance update
//! settles and corrects each stream; streams never read each other's state.

use crate::config::FarmingConfig;
use crate::errors::{FarmingError, Result};
use crate::farm::next_supply;
use crate::gas::{self, GasMeter};
use crate::hook::{BalanceUpdate, FarmAdmin, FarmPlugin};
use crate::membership::{BoundedSet, InsertError};
use crate::schedule::ScheduleLimits;
use crate::stream::RewardStream;
use crate::token_ledger::TokenLedger;
use drip_types::{AccountId, Amount, FarmId, Timestamp, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiFarm {
    id: FarmId,
    admin: FarmAdmin,
    limits: ScheduleLimits,
    total_supply: Amount,
    tokens: BoundedSet<TokenId>,
    streams: HashMap<TokenId, RewardStream>,
}

impl MultiFarm {
    /// Create a farm streaming `initial_token`.
    pub fn new(
        id: FarmId,
        initial_token: TokenId,
        admin: FarmAdmin,
        config: &FarmingConfig,
    ) -> Result<Self> {
        let mut farm = Self {
            id,
            admin,
            limits: config.schedule_limits(),
            total_supply: 0,
            tokens: BoundedSet::with_capacity(config.max_rewards_tokens),
            streams: HashMap::new(),
        };
        farm.register_token(initial_token)?;
        Ok(farm)
    }

    pub fn admin(&self) -> &FarmAdmin {
        &self.admin
    }

    pub fn stream(&self, token: &TokenId) -> Result<&RewardStream> {
        self.streams
            .get(token)
            .ok_or(FarmingError::RewardsTokenNotFound(*token))
    }

    fn stream_mut(&mut self, token: &TokenId) -> Result<&mut RewardStream> {
        self.streams
            .get_mut(token)
            .ok_or(FarmingError::RewardsTokenNotFound(*token))
    }

    fn register_token(&mut self, token: TokenId) -> Result<()> {
        self.tokens.insert(token).map_err(|err| match err {
            InsertError::Duplicate => FarmingError::RewardsTokenAlreadyAdded(token),
            InsertError::Full { capacity } => FarmingError::CapacityExceeded {
                resource: "rewards tokens",
                limit: capacity,
            },
        })?;
        self.streams.insert(token, RewardStream::new());
        Ok(())
    }
}

impl FarmPlugin for MultiFarm {
    fn id(&self) -> FarmId {
        self.id
    }

    fn total_supply(&self) -> Amount {
        self.total_supply
    }

    fn rewards_tokens(&self) -> Vec<TokenId> {
        self.tokens.as_slice().to_vec()
    }

    fn update_balances(
        &mut self,
        update: &BalanceUpdate,
        now: Timestamp,
        meter: &mut GasMeter,
    ) -> Result<()> {
        let supply = next_supply(self.total_supply, update)?;
        meter.charge(gas::update_cost(
            self.tokens.len(),
            update.writes(),
            update.changes_supply(),
        ))?;

        for stream in self.streams.values_mut() {
            stream.update_balances(update, self.total_supply, now);
        }
        self.total_supply = supply;
        debug!(
            target: "farming",
            farm = %self.id,
            streams = self.tokens.len(),
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
        Ok(self
            .stream(token)?
            .farmed(account, balance, self.total_supply, now))
    }

    fn claim(
        &mut self,
        token: &TokenId,
        account: &AccountId,
        balance: Amount,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        let holder = self.id.account();
        let supply = self.total_supply;
        self.stream_mut(token)?
            .claim(token, &holder, account, balance, supply, now, vault)
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
        let holder = self.id.account();
        let supply = self.total_supply;
        let limits = self.limits;
        self.stream_mut(token)?.start_farming(
            token, caller, &holder, amount, period, supply, now, &limits, vault,
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
        let holder = self.id.account();
        let supply = self.total_supply;
        self.stream_mut(token)?
            .stop_farming(token, &holder, caller, supply, now, vault)
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
        if let Some(stream) = self.streams.get(token) {
            stream.check_rescue(token, &holder, amount, vault)?;
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
        Ok(match self.streams.get(token) {
            Some(stream) => stream.withdrawable(token, &holder, at, vault),
            None => vault.balance_of(token, &holder),
        })
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

    fn add_rewards_token(&mut self, caller: &AccountId, token: TokenId) -> Result<()> {
        self.admin.ensure_owner(caller)?;
        self.register_token(token)?;
        info!(
            target: "farming",
            farm = %self.id,
            token = %token,
            count = self.tokens.len(),
            "Rewards token added"
        );
        Ok(())
    }
}
