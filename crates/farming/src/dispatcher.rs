//! Balance-change dispatcher
//!
//! Fans one balance movement out to every farm either side has joined. Each
//! farm callback runs under its own [`GasMeter`]; a callback that fails is
//! logged, reported and skipped, and the balance movement itself always
//! stands. A callback that panics is caught at this boundary and treated
//! like any other failure.

use crate::config::FarmingConfig;
use crate::errors::FarmingError;
use crate::gas::GasMeter;
use crate::hook::{BalanceUpdate, FarmPlugin, FarmRegistry};
use crate::membership::Memberships;
use drip_types::{AccountId, Amount, FarmId, Timestamp};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// A farm callback that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    pub farm: FarmId,
    pub update: BalanceUpdate,
    pub error: FarmingError,
}

/// Outcome of one dispatched balance movement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Farms that applied their update, with the gas each used.
    pub delivered: Vec<(FarmId, u64)>,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn gas_used(&self) -> u64 {
        self.delivered.iter().map(|(_, gas)| gas).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChangeDispatcher {
    gas_limit: u64,
}

impl BalanceChangeDispatcher {
    pub fn new(gas_limit: u64) -> Self {
        Self { gas_limit }
    }

    pub fn from_config(config: &FarmingConfig) -> Self {
        Self::new(config.callback_gas_limit)
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Deliver `update` to a single farm. Returns the gas it used.
    pub fn notify(
        &self,
        farm: &mut dyn FarmPlugin,
        update: &BalanceUpdate,
        now: Timestamp,
    ) -> std::result::Result<u64, DispatchFailure> {
        let mut meter = GasMeter::new(self.gas_limit);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            farm.update_balances(update, now, &mut meter)
        }))
        .unwrap_or_else(|payload| Err(FarmingError::CallbackPanicked(panic_message(&*payload))));
        match outcome {
            Ok(()) => {
                debug!(
                    target: "dispatch",
                    farm = %farm.id(),
                    gas_used = meter.used(),
                    "Balance update delivered"
                );
                Ok(meter.used())
            }
            Err(error) => {
                warn!(
                    target: "dispatch",
                    farm = %farm.id(),
                    error = %error,
                    "Balance update callback failed; skipping farm"
                );
                Err(DispatchFailure {
                    farm: farm.id(),
                    update: *update,
                    error,
                })
            }
        }
    }

    /// Per-farm updates for a transfer of `amount` from `from` to `to`.
    pub fn plan_transfer(
        memberships: &Memberships,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Vec<(FarmId, BalanceUpdate)> {
        if amount == 0 || from == to {
            return Vec::new();
        }
        let mut plan = Vec::new();
        for farm in memberships.farms(from) {
            let receiver = memberships.contains(to, farm).then_some(*to);
            plan.push((
                *farm,
                BalanceUpdate {
                    from: Some(*from),
                    to: receiver,
                    amount,
                },
            ));
        }
        for farm in memberships.farms(to) {
            if !memberships.contains(from, farm) {
                plan.push((*farm, BalanceUpdate::mint(*to, amount)));
            }
        }
        plan
    }

    /// Per-farm updates for `account`'s balance moving from `old` to `new`.
    pub fn plan_balance_change(
        memberships: &Memberships,
        account: &AccountId,
        old: Amount,
        new: Amount,
    ) -> Vec<(FarmId, BalanceUpdate)> {
        match BalanceUpdate::from_balance_change(*account, old, new) {
            Some(update) => memberships
                .farms(account)
                .iter()
                .map(|farm| (*farm, update))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Deliver a planned set of updates. Unknown farm ids are reported as
    /// failures.
    pub fn dispatch(
        &self,
        registry: &mut FarmRegistry,
        plan: &[(FarmId, BalanceUpdate)],
        now: Timestamp,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        for (farm_id, update) in plan {
            let farm = match registry.get_mut(farm_id) {
                Ok(farm) => farm,
                Err(error) => {
                    warn!(target: "dispatch", farm = %farm_id, "Dispatch to unknown farm");
                    report.failures.push(DispatchFailure {
                        farm: *farm_id,
                        update: *update,
                        error,
                    });
                    continue;
                }
            };
            match self.notify(farm, update, now) {
                Ok(gas) => report.delivered.push((*farm_id, gas)),
                Err(failure) => report.failures.push(failure),
            }
        }
        report
    }

    pub fn dispatch_transfer(
        &self,
        registry: &mut FarmRegistry,
        memberships: &Memberships,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> DispatchReport {
        let plan = Self::plan_transfer(memberships, from, to, amount);
        self.dispatch(registry, &plan, now)
    }

    pub fn on_balance_changed(
        &self,
        registry: &mut FarmRegistry,
        memberships: &Memberships,
        account: &AccountId,
        old: Amount,
        new: Amount,
        now: Timestamp,
    ) -> DispatchReport {
        let plan = Self::plan_balance_change(memberships, account, old, new);
        self.dispatch(registry, &plan, now)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farm::Farm;
    use crate::hook::FarmAdmin;
    use drip_types::TokenId;

    fn farm_id(n: u8) -> FarmId {
        FarmId::from_label(&format!("farm-{n}"))
    }

    fn registry(count: u8) -> FarmRegistry {
        let config = FarmingConfig::default();
        let admin = FarmAdmin::new(AccountId::from_label("owner"), AccountId::from_label("dist"));
        let mut registry = FarmRegistry::new();
        for n in 0..count {
            registry
                .register(Box::new(Farm::new(
                    farm_id(n),
                    TokenId::from_label("RWD"),
                    admin,
                    &config,
                )))
                .unwrap();
        }
        registry
    }

    #[test]
    fn transfer_plan_merges_membership_sets() {
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");
        let mut memberships = Memberships::new(10);
        memberships.join(&alice, farm_id(0)).unwrap();
        memberships.join(&alice, farm_id(1)).unwrap();
        memberships.join(&bob, farm_id(1)).unwrap();
        memberships.join(&bob, farm_id(2)).unwrap();

        let plan = BalanceChangeDispatcher::plan_transfer(&memberships, &alice, &bob, 5);
        assert_eq!(
            plan,
            vec![
                (farm_id(0), BalanceUpdate::burn(alice, 5)),
                (farm_id(1), BalanceUpdate::transfer(alice, bob, 5)),
                (farm_id(2), BalanceUpdate::mint(bob, 5)),
            ]
        );
    }

    #[test]
    fn zero_and_self_transfers_are_not_dispatched() {
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");
        let mut memberships = Memberships::new(10);
        memberships.join(&alice, farm_id(0)).unwrap();

        assert!(BalanceChangeDispatcher::plan_transfer(&memberships, &alice, &bob, 0).is_empty());
        assert!(BalanceChangeDispatcher::plan_transfer(&memberships, &alice, &alice, 9).is_empty());
        assert!(
            BalanceChangeDispatcher::plan_balance_change(&memberships, &alice, 4, 4).is_empty()
        );
    }

    #[test]
    fn failures_are_isolated_per_farm() {
        let alice = AccountId::from_label("alice");
        let mut registry = registry(2);
        let mut memberships = Memberships::new(10);
        memberships.join(&alice, farm_id(0)).unwrap();
        memberships.join(&alice, farm_id(1)).unwrap();
        memberships.join(&alice, farm_id(9)).unwrap();

        let dispatcher = BalanceChangeDispatcher::from_config(&FarmingConfig::default());
        let report = dispatcher.on_balance_changed(&mut registry, &memberships, &alice, 0, 10, 0);

        assert_eq!(report.delivered.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].error, FarmingError::FarmNotFound(farm_id(9)));
        assert_eq!(registry.get(&farm_id(0)).unwrap().total_supply(), 10);
        assert_eq!(registry.get(&farm_id(1)).unwrap().total_supply(), 10);
    }

    #[test]
    fn exhausted_budget_skips_the_farm() {
        let alice = AccountId::from_label("alice");
        let mut registry = registry(1);
        let mut memberships = Memberships::new(10);
        memberships.join(&alice, farm_id(0)).unwrap();

        let dispatcher = BalanceChangeDispatcher::new(1_000);
        let report = dispatcher.on_balance_changed(&mut registry, &memberships, &alice, 0, 10, 0);
        assert!(!report.is_clean());
        assert!(matches!(report.failures[0].error, FarmingError::OutOfGas { .. }));
        assert_eq!(registry.get(&farm_id(0)).unwrap().total_supply(), 0);
    }

    struct PanickingFarm(FarmId);

    impl FarmPlugin for PanickingFarm {
        fn id(&self) -> FarmId {
            self.0
        }

        fn total_supply(&self) -> Amount {
            0
        }

        fn rewards_tokens(&self) -> Vec<TokenId> {
            Vec::new()
        }

        fn update_balances(
            &mut self,
            update: &BalanceUpdate,
            _now: Timestamp,
            _meter: &mut GasMeter,
        ) -> crate::errors::Result<()> {
            panic!("cannot handle {}", update.amount);
        }

        fn farmed(
            &self,
            token: &TokenId,
            _: &AccountId,
            _: Amount,
            _: Timestamp,
        ) -> crate::errors::Result<Amount> {
            Err(FarmingError::RewardsTokenNotFound(*token))
        }

        fn claim(
            &mut self,
            token: &TokenId,
            _: &AccountId,
            _: Amount,
            _: Timestamp,
            _: &mut dyn crate::token_ledger::TokenLedger,
        ) -> crate::errors::Result<Amount> {
            Err(FarmingError::RewardsTokenNotFound(*token))
        }

        fn start_farming(
            &mut self,
            caller: &AccountId,
            _: &TokenId,
            _: Amount,
            _: u64,
            _: Timestamp,
            _: &mut dyn crate::token_ledger::TokenLedger,
        ) -> crate::errors::Result<Amount> {
            Err(FarmingError::AccessDenied { caller: *caller })
        }

        fn stop_farming(
            &mut self,
            caller: &AccountId,
            _: &TokenId,
            _: Timestamp,
            _: &mut dyn crate::token_ledger::TokenLedger,
        ) -> crate::errors::Result<Amount> {
            Err(FarmingError::AccessDenied { caller: *caller })
        }

        fn rescue_funds(
            &mut self,
            caller: &AccountId,
            _: &TokenId,
            _: Amount,
            _: &mut dyn crate::token_ledger::TokenLedger,
        ) -> crate::errors::Result<()> {
            Err(FarmingError::AccessDenied { caller: *caller })
        }

        fn withdrawable(
            &self,
            _: &TokenId,
            _: Option<Timestamp>,
            _: &dyn crate::token_ledger::TokenLedger,
        ) -> crate::errors::Result<Amount> {
            Ok(0)
        }

        fn distributor(&self) -> AccountId {
            AccountId::default()
        }

        fn set_distributor(
            &mut self,
            caller: &AccountId,
            _: AccountId,
        ) -> crate::errors::Result<()> {
            Err(FarmingError::AccessDenied { caller: *caller })
        }
    }

    #[test]
    fn panicking_callback_is_caught_and_later_farms_still_run() {
        let alice = AccountId::from_label("alice");
        let mut registry = registry(1);
        registry.register(Box::new(PanickingFarm(farm_id(7)))).unwrap();
        let mut memberships = Memberships::new(10);
        memberships.join(&alice, farm_id(7)).unwrap();
        memberships.join(&alice, farm_id(0)).unwrap();

        let dispatcher = BalanceChangeDispatcher::from_config(&FarmingConfig::default());
        let report = dispatcher.on_balance_changed(&mut registry, &memberships, &alice, 0, 7, 0);

        assert_eq!(report.delivered.len(), 1);
        assert_eq!(report.delivered[0].0, farm_id(0));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].error,
            FarmingError::CallbackPanicked("cannot handle 7".to_string())
        );
        assert_eq!(registry.get(&farm_id(0)).unwrap().total_supply(), 7);
    }
}
