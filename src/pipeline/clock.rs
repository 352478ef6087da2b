//! Monotonic nanosecond clock shared by the pacing components

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock for frame scheduling
///
/// All scheduling decisions are made on integer nanoseconds relative to a
/// base `Instant`, so timestamps coming from different threads can be
/// compared and subtracted without going through `Instant` arithmetic.
///
/// # Thread Safety
///
/// The clock is cheap to clone; clones share the same base and therefore
/// produce comparable timestamps.
#[derive(Clone)]
pub struct PacerClock {
    /// Base instant when the clock started
    base: Arc<Instant>,
}

impl PacerClock {
    /// Create a new clock starting now
    pub fn new() -> Self {
        Self {
            base: Arc::new(Instant::now()),
        }
    }

    /// Nanoseconds elapsed since the clock base
    pub fn now_ns(&self) -> u64 {
        self.base.elapsed().as_nanos() as u64
    }

    /// Instant corresponding to a clock timestamp
    pub fn instant_at(&self, ns: u64) -> Instant {
        *self.base + Duration::from_nanos(ns)
    }
}

impl Default for PacerClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PacerClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacerClock")
            .field("elapsed", &self.base.elapsed())
            .finish()
    }
}
