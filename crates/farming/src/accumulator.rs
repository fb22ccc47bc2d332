//! Farmed-per-token accumulator.
//!
//! Reward earned by one unit of stake since the farm was created, scaled by
//! `SCALE`. Advanced lazily: views compute the current value without writing
//! it, every state-changing path settles it first.

use crate::schedule::RewardSchedule;
use drip_types::{wide, Amount, Timestamp, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    /// Time of the last settlement.
    pub checkpoint: Timestamp,
    /// Settled farmed-per-token value.
    pub farmed_per_token: U256,
}

impl Accumulator {
    /// Current farmed-per-token value, without settling.
    pub fn farmed_per_token_at(
        &self,
        schedule: &RewardSchedule,
        total_supply: Amount,
        now: Timestamp,
    ) -> U256 {
        if total_supply == 0 || now <= self.checkpoint {
            return self.farmed_per_token;
        }
        let accrued = schedule.farmed_since_scaled(self.checkpoint, now) / wide(total_supply);
        self.farmed_per_token.saturating_add(accrued)
    }

    /// Advance to `now` using the supply that was staked since the last
    /// checkpoint. Returns the settled value.
    pub fn settle(
        &mut self,
        schedule: &RewardSchedule,
        total_supply: Amount,
        now: Timestamp,
    ) -> U256 {
        let fpt = self.farmed_per_token_at(schedule, total_supply, now);
        if fpt != self.farmed_per_token {
            debug!(
                target: "farming",
                checkpoint = self.checkpoint,
                now,
                total_supply,
                "Settled farmed-per-token"
            );
        }
        self.farmed_per_token = fpt;
        self.checkpoint = self.checkpoint.max(now);
        fpt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleLimits;
    use drip_types::scale;

    fn schedule(reward: Amount, period: u64) -> RewardSchedule {
        let mut schedule = RewardSchedule::default();
        schedule
            .start(
                0,
                reward,
                period,
                &ScheduleLimits {
                    max_duration: u64::MAX / 2,
                    max_reward_amount: u128::MAX / 2,
                },
            )
            .unwrap();
        schedule
    }

    #[test]
    fn advances_proportionally_to_supply() {
        let schedule = schedule(1_000, 100);
        let mut acc = Accumulator::default();

        let fpt = acc.settle(&schedule, 10, 50);
        // 500 reward over 10 units of stake.
        assert_eq!(fpt, wide(50) * scale());
        assert_eq!(acc.checkpoint, 50);
    }

    #[test]
    fn frozen_while_nothing_is_staked() {
        let schedule = schedule(1_000, 100);
        let mut acc = Accumulator::default();

        assert_eq!(acc.settle(&schedule, 0, 50), U256::zero());
        assert_eq!(acc.checkpoint, 50);
        // The unstaked half is never credited.
        let fpt = acc.settle(&schedule, 1, 100);
        assert_eq!(fpt, wide(500) * scale());
    }

    #[test]
    fn view_matches_settle() {
        let schedule = schedule(7_777, 333);
        let mut acc = Accumulator::default();
        acc.settle(&schedule, 3, 10);

        let viewed = acc.farmed_per_token_at(&schedule, 3, 200);
        assert_eq!(acc.settle(&schedule, 3, 200), viewed);
    }

    #[test]
    fn backwards_time_is_ignored() {
        let schedule = schedule(1_000, 100);
        let mut acc = Accumulator::default();
        let fpt = acc.settle(&schedule, 10, 60);

        assert_eq!(acc.settle(&schedule, 10, 40), fpt);
        assert_eq!(acc.checkpoint, 60);
    }

    #[test]
    fn monotone_non_decreasing() {
        let schedule = schedule(1_000_000, 1_000);
        let mut acc = Accumulator::default();
        let mut last = U256::zero();
        for (t, supply) in [(10, 5), (20, 1), (20, 9), (500, 3), (2_000, 7)] {
            let fpt = acc.settle(&schedule, supply, t);
            assert!(fpt >= last);
            last = fpt;
        }
    }
}
