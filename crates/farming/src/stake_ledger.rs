//! Stake ledger
//!
//! Reference host for farms: the fungible balance ledger whose holders farm.
//! It owns balances, per-account membership sets and the farm registry, and
//! pushes every balance movement through the [`BalanceChangeDispatcher`].
//!
//! Balance movements never fail because of a farm. Membership changes and
//! holder/distributor requests are all-or-nothing: every check runs before
//! anything is written.

use crate::config::FarmingConfig;
use crate::dispatcher::{BalanceChangeDispatcher, DispatchFailure, DispatchReport};
use crate::errors::{FarmingError, Result};
use crate::events::FarmingEvent;
use crate::hook::{BalanceUpdate, FarmPlugin, FarmRegistry};
use crate::membership::Memberships;
use crate::token_ledger::TokenLedger;
use drip_time::{Clock, Timestamp};
use drip_types::{AccountId, Amount, FarmId, TokenId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct StakeLedger {
    config: FarmingConfig,
    clock: Arc<dyn Clock>,
    balances: HashMap<AccountId, Amount>,
    total_supply: Amount,
    memberships: Memberships,
    farms: FarmRegistry,
    dispatcher: BalanceChangeDispatcher,
    events: Vec<FarmingEvent>,
}

impl StakeLedger {
    pub fn new(config: FarmingConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            memberships: Memberships::new(config.max_user_farms),
            dispatcher: BalanceChangeDispatcher::from_config(&config),
            config,
            clock,
            balances: HashMap::new(),
            total_supply: 0,
            farms: FarmRegistry::new(),
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &FarmingConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn register_farm(&mut self, farm: Box<dyn FarmPlugin>) -> Result<FarmId> {
        let id = self.farms.register(farm)?;
        info!(target: "farming", farm = %id, "Farm registered");
        Ok(id)
    }

    pub fn farm(&self, farm: &FarmId) -> Result<&dyn FarmPlugin> {
        self.farms.get(farm)
    }

    /// Events recorded since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<FarmingEvent> {
        std::mem::take(&mut self.events)
    }

    // -------------------------------------------------------------------------
    // Balances
    // -------------------------------------------------------------------------

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    fn set_balance(&mut self, account: AccountId, balance: Amount) {
        if balance == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }
    }

    pub fn mint(&mut self, account: &AccountId, amount: Amount) -> Result<DispatchReport> {
        let old = self.balance_of(account);
        let new = old
            .checked_add(amount)
            .ok_or(FarmingError::ArithmeticOverflow("stake balance"))?;
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(FarmingError::ArithmeticOverflow("stake supply"))?;
        self.set_balance(*account, new);
        self.total_supply = supply;
        Ok(self.balance_changed(account, old, new))
    }

    pub fn burn(&mut self, account: &AccountId, amount: Amount) -> Result<DispatchReport> {
        let old = self.balance_of(account);
        let new = old
            .checked_sub(amount)
            .ok_or(FarmingError::InsufficientBalance {
                requested: amount,
                available: old,
            })?;
        self.set_balance(*account, new);
        self.total_supply -= amount;
        Ok(self.balance_changed(account, old, new))
    }

    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<DispatchReport> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(FarmingError::InsufficientBalance {
                requested: amount,
                available: from_balance,
            });
        }
        if from != to {
            let to_balance = self
                .balance_of(to)
                .checked_add(amount)
                .ok_or(FarmingError::ArithmeticOverflow("stake balance"))?;
            self.set_balance(*from, from_balance - amount);
            self.set_balance(*to, to_balance);
        }
        let now = self.now();
        let report = self.dispatcher.dispatch_transfer(
            &mut self.farms,
            &self.memberships,
            from,
            to,
            amount,
            now,
        );
        self.record_failures(&report.failures);
        Ok(report)
    }

    fn balance_changed(&mut self, account: &AccountId, old: Amount, new: Amount) -> DispatchReport {
        let now = self.now();
        let report = self.dispatcher.on_balance_changed(
            &mut self.farms,
            &self.memberships,
            account,
            old,
            new,
            now,
        );
        self.record_failures(&report.failures);
        report
    }

    fn record_failures(&mut self, failures: &[DispatchFailure]) {
        for failure in failures {
            let account = failure
                .update
                .from
                .or(failure.update.to)
                .unwrap_or_default();
            self.events.push(FarmingEvent::CallbackFailed {
                farm: failure.farm,
                account,
                reason: failure.error.to_string(),
            });
        }
    }

    // -------------------------------------------------------------------------
    // Membership
    // -------------------------------------------------------------------------

    /// Start farming `farm` with the account's whole balance.
    pub fn join(&mut self, account: &AccountId, farm: &FarmId) -> Result<()> {
        if !self.farms.contains(farm) {
            return Err(FarmingError::FarmNotFound(*farm));
        }
        self.memberships.check_join(account, farm)?;

        let balance = self.balance_of(account);
        if balance > 0 {
            let now = self.now();
            let plugin = self.farms.get_mut(farm)?;
            self.dispatcher
                .notify(plugin, &BalanceUpdate::mint(*account, balance), now)
                .map_err(|failure| failure.error)?;
        }
        self.memberships.join(account, *farm)?;
        info!(target: "farming", account = %account, farm = %farm, balance, "Joined farm");
        self.events.push(FarmingEvent::Joined {
            account: *account,
            farm: *farm,
        });
        Ok(())
    }

    /// Stop farming `farm`. Succeeds even when the farm's callback fails, so
    /// a broken farm can always be left.
    pub fn quit(&mut self, account: &AccountId, farm: &FarmId) -> Result<()> {
        self.memberships.quit(account, farm)?;

        let balance = self.balance_of(account);
        if balance > 0 {
            let now = self.now();
            let plan = [(*farm, BalanceUpdate::burn(*account, balance))];
            let report = self.dispatcher.dispatch(&mut self.farms, &plan, now);
            self.record_failures(&report.failures);
        }
        info!(target: "farming", account = %account, farm = %farm, balance, "Quit farm");
        self.events.push(FarmingEvent::Quit {
            account: *account,
            farm: *farm,
        });
        Ok(())
    }

    /// Quit every joined farm. Returns the farms left.
    pub fn quit_all(&mut self, account: &AccountId) -> Result<Vec<FarmId>> {
        let farms = self.memberships.farms(account).to_vec();
        for farm in &farms {
            self.quit(account, farm)?;
        }
        Ok(farms)
    }

    pub fn user_farms(&self, account: &AccountId) -> &[FarmId] {
        self.memberships.farms(account)
    }

    pub fn user_farms_count(&self, account: &AccountId) -> usize {
        self.memberships.count(account)
    }

    pub fn user_farms_at(&self, account: &AccountId, index: usize) -> Option<FarmId> {
        self.memberships.at(account, index)
    }

    pub fn has_farm(&self, account: &AccountId, farm: &FarmId) -> bool {
        self.memberships.contains(account, farm)
    }

    /// Balance `account` farms with in `farm`; zero for non-members.
    pub fn farm_balance_of(&self, farm: &FarmId, account: &AccountId) -> Amount {
        if self.has_farm(account, farm) {
            self.balance_of(account)
        } else {
            0
        }
    }

    pub fn farm_total_supply(&self, farm: &FarmId) -> Result<Amount> {
        Ok(self.farms.get(farm)?.total_supply())
    }

    // -------------------------------------------------------------------------
    // Rewards
    // -------------------------------------------------------------------------

    /// Reward farmed in `farm`'s first reward token.
    pub fn farmed(&self, farm: &FarmId, account: &AccountId) -> Result<Amount> {
        let plugin = self.farms.get(farm)?;
        let Some(token) = plugin.rewards_tokens().first().copied() else {
            return Ok(0);
        };
        self.farmed_token(farm, &token, account)
    }

    pub fn farmed_token(&self, farm: &FarmId, token: &TokenId, account: &AccountId) -> Result<Amount> {
        let balance = self.farm_balance_of(farm, account);
        self.farms
            .get(farm)?
            .farmed(token, account, balance, self.now())
    }

    /// Claim every reward token of `farm`.
    pub fn claim(
        &mut self,
        account: &AccountId,
        farm: &FarmId,
        vault: &mut dyn TokenLedger,
    ) -> Result<Vec<(TokenId, Amount)>> {
        let tokens = self.farms.get(farm)?.rewards_tokens();
        let mut paid = Vec::with_capacity(tokens.len());
        for token in tokens {
            let amount = self.claim_token(account, farm, &token, vault)?;
            paid.push((token, amount));
        }
        Ok(paid)
    }

    pub fn claim_token(
        &mut self,
        account: &AccountId,
        farm: &FarmId,
        token: &TokenId,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        let balance = self.farm_balance_of(farm, account);
        let now = self.now();
        let amount = self
            .farms
            .get_mut(farm)?
            .claim(token, account, balance, now, vault)?;
        if amount > 0 {
            info!(
                target: "farming",
                account = %account,
                farm = %farm,
                token = %token,
                amount,
                "Rewards claimed"
            );
            self.events.push(FarmingEvent::Claimed {
                account: *account,
                farm: *farm,
                token: *token,
                amount,
            });
        }
        Ok(amount)
    }

    /// Claim from every joined farm.
    pub fn claim_all(
        &mut self,
        account: &AccountId,
        vault: &mut dyn TokenLedger,
    ) -> Result<Vec<(FarmId, TokenId, Amount)>> {
        let farms = self.memberships.farms(account).to_vec();
        let mut paid = Vec::new();
        for farm in farms {
            for (token, amount) in self.claim(account, &farm, vault)? {
                paid.push((farm, token, amount));
            }
        }
        Ok(paid)
    }

    // -------------------------------------------------------------------------
    // Farm administration
    // -------------------------------------------------------------------------

    pub fn start_farming(
        &mut self,
        caller: &AccountId,
        farm: &FarmId,
        token: &TokenId,
        amount: Amount,
        period: u64,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        let now = self.now();
        let reward = self
            .farms
            .get_mut(farm)?
            .start_farming(caller, token, amount, period, now, vault)?;
        self.events.push(FarmingEvent::FarmingStarted {
            farm: *farm,
            token: *token,
            amount,
            reward,
            period,
            at: now,
        });
        Ok(reward)
    }

    pub fn stop_farming(
        &mut self,
        caller: &AccountId,
        farm: &FarmId,
        token: &TokenId,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount> {
        let now = self.now();
        let refunded = self
            .farms
            .get_mut(farm)?
            .stop_farming(caller, token, now, vault)?;
        self.events.push(FarmingEvent::FarmingStopped {
            farm: *farm,
            token: *token,
            refunded,
            at: now,
        });
        Ok(refunded)
    }

    pub fn rescue_funds(
        &mut self,
        caller: &AccountId,
        farm: &FarmId,
        token: &TokenId,
        amount: Amount,
        vault: &mut dyn TokenLedger,
    ) -> Result<()> {
        self.farms
            .get_mut(farm)?
            .rescue_funds(caller, token, amount, vault)?;
        self.events.push(FarmingEvent::FundsRescued {
            farm: *farm,
            token: *token,
            amount,
        });
        Ok(())
    }

    pub fn set_distributor(
        &mut self,
        caller: &AccountId,
        farm: &FarmId,
        distributor: AccountId,
    ) -> Result<()> {
        self.farms
            .get_mut(farm)?
            .set_distributor(caller, distributor)?;
        self.events.push(FarmingEvent::DistributorChanged {
            farm: *farm,
            distributor,
        });
        Ok(())
    }

    pub fn add_rewards_token(
        &mut self,
        caller: &AccountId,
        farm: &FarmId,
        token: TokenId,
    ) -> Result<()> {
        self.farms.get_mut(farm)?.add_rewards_token(caller, token)?;
        self.events.push(FarmingEvent::RewardsTokenAdded { farm: *farm, token });
        Ok(())
    }

    pub fn withdrawable(
        &self,
        farm: &FarmId,
        token: &TokenId,
        at: Option<Timestamp>,
        vault: &dyn TokenLedger,
    ) -> Result<Amount> {
        self.farms.get(farm)?.withdrawable(token, at, vault)
    }
}

impl std::fmt::Debug for StakeLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StakeLedger")
            .field("config", &self.config)
            .field("total_supply", &self.total_supply)
            .field("holders", &self.balances.len())
            .field("farms", &self.farms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farm::Farm;
    use crate::hook::FarmAdmin;
    use crate::token_ledger::InMemoryTokenLedger;
    use drip_time::ManualClock;

    struct Fixture {
        ledger: StakeLedger,
        clock: ManualClock,
        farm: FarmId,
        token: TokenId,
        distributor: AccountId,
        vault: InMemoryTokenLedger,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(1_000);
        let config = FarmingConfig::default();
        let mut ledger = StakeLedger::new(config.clone(), Arc::new(clock.clone())).unwrap();
        let token = TokenId::from_label("RWD");
        let distributor = AccountId::from_label("distributor");
        let farm = ledger
            .register_farm(Box::new(Farm::new(
                FarmId::from_label("farm"),
                token,
                FarmAdmin::new(AccountId::from_label("owner"), distributor),
                &config,
            )))
            .unwrap();
        let mut vault = InMemoryTokenLedger::new();
        vault.mint(&token, &distributor, 1_000_000).unwrap();
        Fixture {
            ledger,
            clock,
            farm,
            token,
            distributor,
            vault,
        }
    }

    #[test]
    fn join_requires_registered_farm() {
        let mut f = fixture();
        let alice = AccountId::from_label("alice");
        let ghost = FarmId::from_label("ghost");
        assert_eq!(f.ledger.join(&alice, &ghost), Err(FarmingError::FarmNotFound(ghost)));
        assert_eq!(f.ledger.user_farms_count(&alice), 0);
    }

    #[test]
    fn join_moves_balance_into_farm_supply() {
        let mut f = fixture();
        let alice = AccountId::from_label("alice");
        f.ledger.mint(&alice, 40).unwrap();
        assert_eq!(f.ledger.farm_total_supply(&f.farm).unwrap(), 0);

        f.ledger.join(&alice, &f.farm).unwrap();
        assert_eq!(f.ledger.farm_total_supply(&f.farm).unwrap(), 40);
        assert_eq!(f.ledger.farm_balance_of(&f.farm, &alice), 40);
        assert!(f.ledger.has_farm(&alice, &f.farm));
        assert_eq!(f.ledger.user_farms_at(&alice, 0), Some(f.farm));

        f.ledger.burn(&alice, 15).unwrap();
        assert_eq!(f.ledger.farm_total_supply(&f.farm).unwrap(), 25);

        f.ledger.quit(&alice, &f.farm).unwrap();
        assert_eq!(f.ledger.farm_total_supply(&f.farm).unwrap(), 0);
        assert_eq!(f.ledger.farm_balance_of(&f.farm, &alice), 0);
        assert_eq!(
            f.ledger.quit(&alice, &f.farm),
            Err(FarmingError::AlreadyExited(f.farm))
        );
    }

    #[test]
    fn reward_survives_quit_and_is_claimable() {
        let mut f = fixture();
        let alice = AccountId::from_label("alice");
        f.ledger.mint(&alice, 10).unwrap();
        f.ledger.join(&alice, &f.farm).unwrap();
        f.ledger
            .start_farming(&f.distributor, &f.farm, &f.token, 1_000, 100, &mut f.vault)
            .unwrap();

        f.clock.advance(60);
        f.ledger.quit(&alice, &f.farm).unwrap();
        f.clock.advance(40);
        assert_eq!(f.ledger.farmed(&f.farm, &alice).unwrap(), 600);

        let paid = f.ledger.claim(&alice, &f.farm, &mut f.vault).unwrap();
        assert_eq!(paid, vec![(f.token, 600)]);
        assert_eq!(f.vault.balance_of(&f.token, &alice), 600);
        assert_eq!(f.ledger.farmed(&f.farm, &alice).unwrap(), 0);
    }

    #[test]
    fn transfer_rejects_overdraft_without_effect() {
        let mut f = fixture();
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");
        f.ledger.mint(&alice, 5).unwrap();
        assert_eq!(
            f.ledger.transfer(&alice, &bob, 6).unwrap_err(),
            FarmingError::InsufficientBalance {
                requested: 6,
                available: 5
            }
        );
        assert_eq!(f.ledger.balance_of(&alice), 5);
        assert_eq!(f.ledger.balance_of(&bob), 0);
    }

    #[test]
    fn events_are_recorded_in_order() {
        let mut f = fixture();
        let alice = AccountId::from_label("alice");
        f.ledger.join(&alice, &f.farm).unwrap();
        f.ledger.quit_all(&alice).unwrap();

        let events = f.ledger.drain_events();
        assert_eq!(
            events,
            vec![
                FarmingEvent::Joined {
                    account: alice,
                    farm: f.farm
                },
                FarmingEvent::Quit {
                    account: alice,
                    farm: f.farm
                },
            ]
        );
        assert!(f.ledger.drain_events().is_empty());
    }
}
