//! Time source for `elastic_get_current_time_nanoseconds`

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_nanos(&self) -> u64;
}

/// Wall clock that never goes backwards.
///
/// The epoch offset is sampled once; later readings add monotonic elapsed
/// time to it, so a system clock adjustment during a run is not observed.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin_nanos: u64,
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        let origin_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self {
            origin_nanos,
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        let elapsed = u64::try_from(self.started.elapsed().as_nanos())
            .unwrap_or(u64::MAX);
        self.origin_nanos.saturating_add(elapsed)
    }
}

/// Always reports the same instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_nanos(&self) -> u64 {
        self.0
    }
}
