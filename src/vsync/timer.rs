use anyhow::{Result, bail};
use std::thread;
use std::time::{Duration, Instant};

use super::{DisplayTarget, SyncVsyncSource};
use crate::assets::{DEFAULT_DISPLAY_FPS, NANOS_PER_SEC};

/// Software vsync: sleeps until the next multiple of the refresh interval.
///
/// Ticks are phase locked to the instant the source was initialized, so a
/// late wake-up shortens the next wait instead of shifting every later tick.
pub struct TimerVsyncSource {
    interval: Duration,
    epoch: Instant,
}

impl TimerVsyncSource {
    pub fn new() -> Self {
        Self {
            interval: Duration::from_nanos(NANOS_PER_SEC / DEFAULT_DISPLAY_FPS as u64),
            epoch: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Deadline of the first tick strictly after `now`
    fn next_tick_after(&self, now: Instant) -> Instant {
        let interval_ns = self.interval.as_nanos().max(1);
        let elapsed_ns = now.saturating_duration_since(self.epoch).as_nanos();
        let ticks = elapsed_ns / interval_ns + 1;
        self.epoch + Duration::from_nanos((ticks * interval_ns) as u64)
    }
}

impl Default for TimerVsyncSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncVsyncSource for TimerVsyncSource {
    fn initialize(&mut self, display: &DisplayTarget, display_fps: u32) -> Result<()> {
        if display_fps == 0 {
            bail!("Refresh rate of {} is unknown", display.name);
        }
        self.interval = Duration::from_nanos(NANOS_PER_SEC / display_fps as u64);
        self.epoch = Instant::now();
        log::debug!(
            "TimerVsyncSource: ticking every {:?} for {}",
            self.interval,
            display
        );
        Ok(())
    }

    fn wait_for_vsync(&mut self) {
        let now = Instant::now();
        let deadline = self.next_tick_after(now);
        thread::sleep(deadline.saturating_duration_since(now));
    }
}
