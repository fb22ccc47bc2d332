//! Fixed-point helpers for reward accounting.
//!
//! Accumulators are `U256` values scaled by [`SCALE`]. Products such as
//! `balance * farmed_per_token` use wrapping ring arithmetic: intermediate
//! values may wrap, but every quantity that is read back out (a farmed
//! amount) is a difference whose true value fits in 256 bits, so the result
//! is exact.

use crate::Amount;
pub use primitive_types::U256;

/// Fixed-point scale applied to the farmed-per-token accumulator.
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Widen an amount.
#[inline]
pub fn wide(value: Amount) -> U256 {
    U256::from(value)
}

/// The accumulator scale as a `U256`.
#[inline]
pub fn scale() -> U256 {
    U256::from(SCALE)
}

/// Narrow to an amount, saturating at `u128::MAX`.
#[inline]
pub fn to_amount_saturating(value: U256) -> Amount {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.low_u128()
    }
}

/// Checked narrowing to an amount.
#[inline]
pub fn to_amount(value: U256) -> Option<Amount> {
    if value > U256::from(u128::MAX) {
        None
    } else {
        Some(value.low_u128())
    }
}

/// `a * b / d` with floor rounding. `None` on overflow or `d == 0`.
pub fn mul_div(a: U256, b: U256, d: U256) -> Option<U256> {
    if d.is_zero() {
        return None;
    }
    a.checked_mul(b).map(|product| product / d)
}

/// `a * b` modulo 2^256.
#[inline]
pub fn wrapping_mul(a: U256, b: U256) -> U256 {
    a.overflowing_mul(b).0
}

/// `a + b` modulo 2^256.
#[inline]
pub fn wrapping_add(a: U256, b: U256) -> U256 {
    a.overflowing_add(b).0
}

/// `a - b` modulo 2^256.
#[inline]
pub fn wrapping_sub(a: U256, b: U256) -> U256 {
    a.overflowing_sub(b).0
}

/// Whether a two's complement 256-bit value is negative.
#[inline]
pub fn is_negative(value: U256) -> bool {
    value.bit(255)
}
