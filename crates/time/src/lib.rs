//! Drip Time Library
//!
//! Provides the monotonic time sources injected into every reward
//! settlement.
//!
//! # Features
//! - Second precision (`Timestamp` is seconds since the UNIX epoch)
//! - Monotonic time advancement, a reading never goes backwards
//! - Thread-safe system clock
//! - Manually driven clock for simulation and tests

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

/// Seconds since the UNIX epoch.
pub type Timestamp = u64;

pub const MINUTE: u64 = 60;
pub const HOUR: u64 = 60 * MINUTE;
pub const DAY: u64 = 24 * HOUR;
pub const WEEK: u64 = 7 * DAY;
