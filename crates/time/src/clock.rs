// src/clock.rs
//
// Time sources for reward settlement. Every source is monotonic: a reading
// is never lower than any reading returned before it.

use crate::Timestamp;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A monotonically non-decreasing source of the current time.
pub trait Clock: Send + Sync {
    /// Current time in seconds.
    fn now(&self) -> Timestamp;
}

// ==== SYSTEM CLOCK ====

/// Wall clock clamped so it never moves backwards.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<Timestamp>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(0),
        }
    }
}

fn system_time_secs() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let mut last = self.last.lock();
        let candidate = system_time_secs();
        if candidate > *last {
            *last = candidate;
        }
        *last
    }
}

// ==== MANUAL CLOCK ====

/// Clock advanced explicitly by its owner. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Move the clock forward by `secs`, returning the new reading.
    pub fn advance(&self, secs: u64) -> Timestamp {
        let previous = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_add(secs))
            })
            .unwrap_or_else(|t| t);
        previous.saturating_add(secs)
    }

    /// Jump to `time`. Attempts to move backwards are ignored.
    pub fn set(&self, time: Timestamp) -> Timestamp {
        let previous = self.now.fetch_max(time, Ordering::SeqCst);
        previous.max(time)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

// ==== TESTS ====
