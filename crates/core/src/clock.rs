//! Millisecond clock used for cache freshness
//!
//! Freshness compares `timestamp + ttl > now` in milliseconds. The clock
//! must never move backwards; `SystemClock` clamps wall-clock regressions
//! (NTP adjustments) to the highest value it has already returned.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of monotonically non-decreasing millisecond timestamps
pub trait Clock: Send + Sync + fmt::Debug {
    /// Milliseconds since Unix epoch
    fn now_millis(&self) -> u64;
}

/// Wall clock, clamped so it never goes backwards
#[derive(Debug, Default)]
pub struct SystemClock {
    high_water: AtomicU64,
}

impl SystemClock {
    /// Create a new system clock
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let previous = self.high_water.fetch_max(wall, Ordering::Relaxed);
        previous.max(wall)
    }
}

/// Clock that only moves when told to
///
/// Used by tests to step across freshness boundaries exactly.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `start`
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move to `millis`; ignored if that would go backwards
    pub fn set(&self, millis: u64) {
        self.now.fetch_max(millis, Ordering::Relaxed);
    }

    /// Move forward by `millis`
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}
