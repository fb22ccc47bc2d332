//! Reward schedule
//!
//! One distribution window per reward token: `reward` is streamed linearly
//! between `finished - duration` and `finished`. The rate is derived from
//! `reward / duration` whenever it is needed and never stored.
//!
//! ## Key Invariants
//! - `reward <= max_reward_amount` and `duration <= max_duration`, so the
//!   scaled accrual `elapsed * reward * SCALE` always fits in 256 bits
//! - Restarting folds the undistributed remainder into the new window
//! - `balance` (reward still owed to holders) only shrinks through claims and
//!   stop refunds

use crate::errors::{FarmingError, Result};
use drip_types::{scale, wide, Amount, Timestamp, U256};
use serde::{Deserialize, Serialize};

/// Bounds applied to every schedule start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleLimits {
    pub max_duration: u64,
    pub max_reward_amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleState {
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSchedule {
    /// End of the current window.
    pub finished: Timestamp,
    /// Length of the current window in seconds; zero once stopped.
    pub duration: u64,
    /// Reward streamed over the current window.
    pub reward: Amount,
    /// Reward tokens funded and not yet claimed or refunded.
    pub balance: Amount,
}

impl RewardSchedule {
    pub fn state(&self, now: Timestamp) -> ScheduleState {
        if self.duration > 0 && now < self.finished {
            ScheduleState::Active
        } else {
            ScheduleState::Idle
        }
    }

    /// Start of the current window.
    pub fn started(&self) -> Timestamp {
        self.finished.saturating_sub(self.duration)
    }

    /// Instantaneous rate in base units per second (floored, informational).
    pub fn rate(&self) -> Amount {
        if self.duration == 0 {
            0
        } else {
            self.reward / self.duration as u128
        }
    }

    /// Reward accrued between `checkpoint` and `now`, scaled by `SCALE`.
    pub fn farmed_since_scaled(&self, checkpoint: Timestamp, now: Timestamp) -> U256 {
        if self.duration == 0 {
            return U256::zero();
        }
        let end = now.min(self.finished);
        let begin = checkpoint.min(self.finished);
        let elapsed = end.saturating_sub(begin);
        wide(elapsed as u128)
            .saturating_mul(wide(self.reward))
            .saturating_mul(scale())
            / U256::from(self.duration)
    }

    /// Reward not yet streamed at `now`.
    pub fn remaining(&self, now: Timestamp) -> Amount {
        if self.duration == 0 || now >= self.finished {
            return 0;
        }
        let left = self.finished - now;
        let value = wide(self.reward).saturating_mul(U256::from(left)) / U256::from(self.duration);
        // left <= duration, so value <= reward.
        value.low_u128()
    }

    /// Check a start request and return the total reward of the new window.
    pub fn validate_start(
        &self,
        now: Timestamp,
        amount: Amount,
        period: u64,
        limits: &ScheduleLimits,
    ) -> Result<Amount> {
        if period == 0 {
            return Err(FarmingError::ZeroDuration);
        }
        if period > limits.max_duration || now.checked_add(period).is_none() {
            return Err(FarmingError::DurationTooLarge {
                duration: period,
                max: limits.max_duration,
            });
        }
        if amount > limits.max_reward_amount {
            return Err(FarmingError::AmountTooLarge {
                amount,
                max: limits.max_reward_amount,
            });
        }
        let reward = amount
            .checked_add(self.remaining(now))
            .filter(|reward| *reward <= limits.max_reward_amount)
            .ok_or(FarmingError::AmountTooLarge {
                amount,
                max: limits.max_reward_amount,
            })?;
        self.balance
            .checked_add(amount)
            .ok_or(FarmingError::ArithmeticOverflow("schedule balance"))?;
        Ok(reward)
    }

    /// Open a new window at `now`. The accumulator must already be settled.
    pub fn start(
        &mut self,
        now: Timestamp,
        amount: Amount,
        period: u64,
        limits: &ScheduleLimits,
    ) -> Result<Amount> {
        let reward = self.validate_start(now, amount, period, limits)?;
        self.finished = now + period;
        self.duration = period;
        self.reward = reward;
        self.balance += amount;
        Ok(reward)
    }

    /// Close the window at `now` and return the unstreamed reward. The
    /// accumulator must already be settled.
    pub fn stop(&mut self, now: Timestamp) -> Amount {
        let leftover = self.remaining(now);
        self.finished = now;
        self.duration = 0;
        self.reward = 0;
        self.balance = self.balance.saturating_sub(leftover);
        leftover
    }

    /// Account for `amount` paid out to a holder.
    pub fn record_claim(&mut self, amount: Amount) {
        self.balance = self.balance.saturating_sub(amount);
    }
}
