//! Shared fixtures for the farming integration tests.

#![allow(dead_code)]

use drip_farming::{
    Farm, FarmAdmin, FarmingConfig, InMemoryTokenLedger, MultiFarm, StakeLedger, TokenLedger,
};
use drip_time::ManualClock;
use drip_types::{AccountId, Amount, FarmId, TokenId, ONE};
use std::sync::Arc;

pub const START: u64 = 1_700_000_000;

/// Floor division drifts by a few base units per operation.
pub fn assert_close(actual: Amount, expected: Amount) {
    let diff = actual.abs_diff(expected);
    assert!(
        diff <= 1_000,
        "expected ≈ {expected}, got {actual} (off by {diff})"
    );
}

pub struct World {
    pub ledger: StakeLedger,
    pub clock: ManualClock,
    pub vault: InMemoryTokenLedger,
    pub config: FarmingConfig,
    pub owner: AccountId,
    pub distributor: AccountId,
    pub reward: TokenId,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(FarmingConfig::default())
    }

    pub fn with_config(config: FarmingConfig) -> Self {
        let clock = ManualClock::new(START);
        let ledger = StakeLedger::new(config.clone(), Arc::new(clock.clone())).unwrap();
        let owner = AccountId::from_label("owner");
        let distributor = AccountId::from_label("distributor");
        let reward = TokenId::from_label("RWD");
        let mut vault = InMemoryTokenLedger::new();
        vault.mint(&reward, &distributor, 10_000_000 * ONE).unwrap();
        Self {
            ledger,
            clock,
            vault,
            config,
            owner,
            distributor,
            reward,
        }
    }

    pub fn admin(&self) -> FarmAdmin {
        FarmAdmin::new(self.owner, self.distributor)
    }

    pub fn add_farm(&mut self, label: &str) -> FarmId {
        let farm = Farm::new(FarmId::from_label(label), self.reward, self.admin(), &self.config);
        self.ledger.register_farm(Box::new(farm)).unwrap()
    }

    pub fn add_multi_farm(&mut self, label: &str) -> FarmId {
        let farm = MultiFarm::new(FarmId::from_label(label), self.reward, self.admin(), &self.config)
            .unwrap();
        self.ledger.register_farm(Box::new(farm)).unwrap()
    }

    /// Mint `amount` whole tokens of stake and join `farm`.
    pub fn stake(&mut self, label: &str, amount: Amount, farm: &FarmId) -> AccountId {
        let account = AccountId::from_label(label);
        self.ledger.mint(&account, amount * ONE).unwrap();
        self.ledger.join(&account, farm).unwrap();
        account
    }

    pub fn start(&mut self, farm: &FarmId, amount: Amount, period: u64) {
        let token = self.reward;
        self.start_token(farm, &token, amount, period);
    }

    pub fn start_token(&mut self, farm: &FarmId, token: &TokenId, amount: Amount, period: u64) {
        let distributor = self.distributor;
        self.ledger
            .start_farming(&distributor, farm, token, amount * ONE, period, &mut self.vault)
            .unwrap();
    }

    pub fn farmed(&self, farm: &FarmId, account: &AccountId) -> Amount {
        self.ledger.farmed(farm, account).unwrap()
    }

    pub fn reward_balance(&self, account: &AccountId) -> Amount {
        self.vault.balance_of(&self.reward, account)
    }
}
