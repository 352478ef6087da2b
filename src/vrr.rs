//! Variable refresh rate frame scheduling
//!
//! On a VRR display the panel refreshes when a frame arrives, so the goal is
//! to hand frames over at an even cadence close to the stream frame rate.
//! The scheduler keeps a short history of real submission times and nudges
//! the next target toward the stream interval. How hard it pushes depends on
//! how jittery the history is: a steady stream gets the full correction, a
//! noisy one only a fraction of it so a single late frame does not whiplash
//! the following ones.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::assets::{
    NANOS_PER_SEC, VRR_JITTER_SENSITIVITY, VRR_MAX_ADJUSTMENT, VRR_MIN_ADJUSTMENT,
    VRR_SPIN_MARGIN,
};
use crate::pipeline::PacerClock;

struct VrrState {
    target_fps: u32,
    target_interval_ns: u64,

    last_frame_time_ns: Option<u64>,
    next_frame_time_ns: Option<u64>,

    history: VecDeque<u64>,
    history_size: usize,

    average_interval_ns: f64,
    interval_variance: f64,
    adjustment_factor: f64,

    // bumped by reset/interrupt so pending waits give up
    generation: u64,
}

impl VrrState {
    fn clear(&mut self) {
        self.last_frame_time_ns = None;
        self.next_frame_time_ns = None;
        self.history.clear();
        self.average_interval_ns = self.target_interval_ns as f64;
        self.interval_variance = 0.0;
        self.adjustment_factor = VRR_MAX_ADJUSTMENT;
    }

    fn update_statistics(&mut self) {
        let deltas: Vec<f64> = self
            .history
            .iter()
            .zip(self.history.iter().skip(1))
            .map(|(prev, next)| next.saturating_sub(*prev) as f64)
            .collect();

        if deltas.is_empty() {
            self.average_interval_ns = self.target_interval_ns as f64;
            self.interval_variance = 0.0;
            self.adjustment_factor = VRR_MAX_ADJUSTMENT;
            return;
        }

        let count = deltas.len() as f64;
        let average = deltas.iter().sum::<f64>() / count;
        let variance = deltas
            .iter()
            .map(|delta| (delta - average).powi(2))
            .sum::<f64>()
            / count;

        // coefficient of variation relative to the stream interval
        let cv = variance.sqrt() / self.target_interval_ns.max(1) as f64;
        let factor = VRR_MAX_ADJUSTMENT / (1.0 + VRR_JITTER_SENSITIVITY * cv);

        self.average_interval_ns = average;
        self.interval_variance = variance;
        self.adjustment_factor = factor.clamp(VRR_MIN_ADJUSTMENT, VRR_MAX_ADJUSTMENT);
    }
}

pub struct VrrFrameScheduler {
    state: Mutex<VrrState>,
    wake: Condvar,
    clock: PacerClock,
    spin_margin: Duration,
}

impl VrrFrameScheduler {
    pub fn new(target_fps: u32, history_size: usize) -> Self {
        let target_fps = target_fps.max(1);
        let target_interval_ns = NANOS_PER_SEC / target_fps as u64;
        let history_size = history_size.max(2);

        Self {
            state: Mutex::new(VrrState {
                target_fps,
                target_interval_ns,
                last_frame_time_ns: None,
                next_frame_time_ns: None,
                history: VecDeque::with_capacity(history_size),
                history_size,
                average_interval_ns: target_interval_ns as f64,
                interval_variance: 0.0,
                adjustment_factor: VRR_MAX_ADJUSTMENT,
                generation: 0,
            }),
            wake: Condvar::new(),
            clock: PacerClock::new(),
            spin_margin: VRR_SPIN_MARGIN,
        }
    }

    /// Measure time against `clock` instead of a private one
    pub fn with_clock(mut self, clock: PacerClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_spin_margin(mut self, spin_margin: Duration) -> Self {
        self.spin_margin = spin_margin;
        self
    }

    pub fn clock(&self) -> &PacerClock {
        &self.clock
    }

    /// Compute and store the ideal submission time of the next frame
    pub fn schedule_frame(&self) -> u64 {
        let mut state = self.state.lock();

        let next = match state.last_frame_time_ns {
            None => self.clock.now_ns(),
            Some(last) => {
                let target = state.target_interval_ns as f64;
                let correction = state.adjustment_factor * (target - state.average_interval_ns);
                let next = last as f64 + target + correction;
                // never schedule before the previous submission
                next.max(last as f64) as u64
            }
        };

        state.next_frame_time_ns = Some(next);
        next
    }

    /// Block until the scheduled submission time.
    ///
    /// Sleeps on a condition variable until shortly before the deadline and
    /// spins for the rest. Returns `false` if [`reset`](Self::reset) or
    /// [`interrupt`](Self::interrupt) was called meanwhile.
    pub fn wait_for_optimal_submission_time(&self) -> bool {
        let mut state = self.state.lock();
        let generation = state.generation;

        let Some(deadline_ns) = state.next_frame_time_ns else {
            return true;
        };
        let deadline = self.clock.instant_at(deadline_ns);
        let coarse_deadline = deadline.checked_sub(self.spin_margin).unwrap_or(deadline);

        while state.generation == generation && Instant::now() < coarse_deadline {
            if self
                .wake
                .wait_until(&mut state, coarse_deadline)
                .timed_out()
            {
                break;
            }
        }
        if state.generation != generation {
            return false;
        }
        drop(state);

        while Instant::now() < deadline {
            std::hint::spin_loop();
        }

        self.state.lock().generation == generation
    }

    pub fn record_frame_submission(&self) {
        self.record_frame_submission_at(self.clock.now_ns());
    }

    pub fn record_frame_submission_at(&self, submitted_ns: u64) {
        let mut state = self.state.lock();

        if state.history.len() == state.history_size {
            state.history.pop_front();
        }
        state.history.push_back(submitted_ns);
        state.last_frame_time_ns = Some(submitted_ns);
        state.update_statistics();
    }

    /// Forget all timing history, pending waits return `false`
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.clear();
        state.generation = state.generation.wrapping_add(1);
        self.wake.notify_all();
    }

    /// Wake a pending wait without touching the history
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        self.wake.notify_all();
    }

    pub fn target_fps(&self) -> u32 {
        self.state.lock().target_fps
    }

    pub fn target_interval_ns(&self) -> u64 {
        self.state.lock().target_interval_ns
    }

    pub fn average_interval_ns(&self) -> f64 {
        self.state.lock().average_interval_ns
    }

    pub fn interval_variance(&self) -> f64 {
        self.state.lock().interval_variance
    }

    pub fn adjustment_factor(&self) -> f64 {
        self.state.lock().adjustment_factor
    }

    pub fn next_frame_time_ns(&self) -> Option<u64> {
        self.state.lock().next_frame_time_ns
    }

    pub fn last_frame_time_ns(&self) -> Option<u64> {
        self.state.lock().last_frame_time_ns
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }
}

impl std::fmt::Debug for VrrFrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("VrrFrameScheduler")
            .field("target_fps", &state.target_fps)
            .field("average_interval_ns", &state.average_interval_ns)
            .field("adjustment_factor", &state.adjustment_factor)
            .finish()
    }
}
