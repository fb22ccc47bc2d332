//! Execution budget for balance-change callbacks.
//!
//! The dispatcher hands every farm callback a fresh [`GasMeter`] holding the
//! configured budget. Farms charge the full cost of an update before touching
//! any state, so a callback that runs out of budget fails without side
//! effects.

use crate::errors::{FarmingError, Result};
use serde::{Deserialize, Serialize};

/// Fixed overhead of entering a callback.
pub const CALL_OVERHEAD: u64 = 2_600;
/// Settling one reward stream's accumulator.
pub const SETTLE_COST: u64 = 5_000;
/// Writing one participant correction.
pub const CORRECTION_WRITE_COST: u64 = 5_000;
/// Writing a farm's total staked supply.
pub const SUPPLY_WRITE_COST: u64 = 5_000;

/// Worst-case cost of one balance update against a farm with `streams`
/// reward streams (both sides present, supply written).
pub const fn balance_update_cost(streams: usize) -> u64 {
    CALL_OVERHEAD
        + SUPPLY_WRITE_COST
        + streams as u64 * (SETTLE_COST + 2 * CORRECTION_WRITE_COST)
}

/// Cost of a concrete update: `writes` is the number of correction entries
/// touched per stream (1 or 2) and `supply_changes` whether total supply moves.
pub fn update_cost(streams: usize, writes: u64, supply_changes: bool) -> u64 {
    let per_stream = SETTLE_COST + writes * CORRECTION_WRITE_COST;
    let supply = if supply_changes { SUPPLY_WRITE_COST } else { 0 };
    CALL_OVERHEAD
        .saturating_add(supply)
        .saturating_add(per_stream.saturating_mul(streams as u64))
}

/// Budget handed to a single callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    /// Consume `units`, or fail without consuming anything.
    pub fn charge(&mut self, units: u64) -> Result<()> {
        let remaining = self.remaining();
        if units > remaining {
            return Err(FarmingError::OutOfGas {
                required: units,
                remaining,
            });
        }
        self.used += units;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_within_budget() {
        let mut meter = GasMeter::new(10_000);
        meter.charge(4_000).unwrap();
        meter.charge(6_000).unwrap();
        assert_eq!(meter.used(), 10_000);
        assert_eq!(meter.remaining(), 0);
    }

    #[test]
    fn overcharge_consumes_nothing() {
        let mut meter = GasMeter::new(10_000);
        meter.charge(3_000).unwrap();
        let err = meter.charge(8_000).unwrap_err();
        assert_eq!(
            err,
            FarmingError::OutOfGas {
                required: 8_000,
                remaining: 7_000
            }
        );
        assert_eq!(meter.used(), 3_000);
    }

    #[test]
    fn worst_case_bounds_concrete_costs() {
        for streams in 1..=5 {
            assert!(update_cost(streams, 2, true) <= balance_update_cost(streams));
            assert!(update_cost(streams, 1, true) < balance_update_cost(streams));
        }
    }
}
