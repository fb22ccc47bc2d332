//! Participant correction ledger.
//!
//! `farmed(account) = (balance * fpt - correction) / SCALE`. A balance change
//! of `d` at accumulator value `fpt` adds `d * fpt` to the correction, which
//! cancels the accrual the new balance would otherwise claim for the past.
//! No per-account history is stored and no other account is touched.
//!
//! Corrections are signed. They are kept as two's complement `U256` values and
//! updated with wrapping arithmetic; the farmed amount read back out is exact
//! because its true value is non-negative and fits in 256 bits.

use crate::hook::BalanceUpdate;
use drip_types::{
    is_negative, scale, to_amount_saturating, wide, wrapping_add, wrapping_mul, wrapping_sub,
    AccountId, Amount, U256,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Signed 256-bit correction in two's complement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction(pub U256);

impl Correction {
    pub fn credit(&mut self, value: U256) {
        self.0 = wrapping_add(self.0, value);
    }

    pub fn debit(&mut self, value: U256) {
        self.0 = wrapping_sub(self.0, value);
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        is_negative(self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionLedger {
    corrections: HashMap<AccountId, Correction>,
}

impl CorrectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn correction(&self, account: &AccountId) -> Correction {
        self.corrections.get(account).copied().unwrap_or_default()
    }

    /// Number of accounts holding a non-zero correction.
    pub fn len(&self) -> usize {
        self.corrections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }

    /// Reward farmed by `account` holding `balance` at accumulator `fpt`.
    pub fn farmed(&self, account: &AccountId, balance: Amount, fpt: U256) -> Amount {
        let gross = wrapping_mul(wide(balance), fpt);
        let net = wrapping_sub(gross, self.correction(account).0);
        if is_negative(net) {
            // Only reachable on malformed input; nothing is owed.
            return 0;
        }
        to_amount_saturating(net / scale())
    }

    /// Shift corrections for a balance movement at accumulator `fpt`.
    pub fn apply(&mut self, update: &BalanceUpdate, fpt: U256) {
        let diff = wrapping_mul(wide(update.amount), fpt);
        if let Some(from) = update.from {
            self.adjust(from, |c| c.debit(diff));
        }
        if let Some(to) = update.to {
            self.adjust(to, |c| c.credit(diff));
        }
    }

    /// Reset so `farmed(account)` is zero without affecting future accrual.
    pub fn erase(&mut self, account: &AccountId, balance: Amount, fpt: U256) {
        let value = wrapping_mul(wide(balance), fpt);
        self.adjust(*account, |c| *c = Correction(value));
    }

    fn adjust(&mut self, account: AccountId, f: impl FnOnce(&mut Correction)) {
        let mut correction = self.correction(&account);
        f(&mut correction);
        if correction.is_zero() {
            self.corrections.remove(&account);
        } else {
            self.corrections.insert(account, correction);
        }
    }
}
