//! Pacing statistics sink

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Why a frame never reached the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropCause {
    /// Evicted from a full pacing queue by a newer frame
    PacingOverflow,
    /// Evicted from a full render queue by a newer frame
    RenderOverflow,
    /// A newer frame was available when the display was ready
    Stale,
    /// The renderer failed to present it
    RenderFailure,
    /// Submitted while the pacer was not running
    Inactive,
}

/// Which of the two pacer queues a depth sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Render,
    Pacing,
}

/// Counters written by the pacer
///
/// The pacer receives this sink at construction and only ever increments it;
/// observers read it through the getters or [`VideoStats::summary`]. All
/// fields are atomics, there is no other synchronization contract.
#[derive(Debug, Default)]
pub struct VideoStats {
    pub frames_submitted: AtomicU64,
    pub frames_rendered: AtomicU64,

    pub pacing_overflow_drops: AtomicU64,
    pub render_overflow_drops: AtomicU64,
    pub stale_drops: AtomicU64,
    pub render_failures: AtomicU64,
    pub inactive_drops: AtomicU64,

    /// Time spent between submission and presentation (microseconds)
    pub total_pacer_time_us: AtomicU64,
    /// Time spent inside the renderer (microseconds)
    pub total_render_time_us: AtomicU64,

    /// Sessions that had to give up on their vsync source
    pub vsync_fallbacks: AtomicU64,

    pub render_queue_depth: AtomicU64,
    pub pacing_queue_depth: AtomicU64,
    pub max_render_queue_depth: AtomicU64,
    pub max_pacing_queue_depth: AtomicU64,
}

impl VideoStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.frames_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rendered(&self, time_in_pacer: Duration, render_time: Duration) {
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
        self.total_pacer_time_us
            .fetch_add(time_in_pacer.as_micros() as u64, Ordering::Relaxed);
        self.total_render_time_us
            .fetch_add(render_time.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_drop(&self, cause: DropCause) {
        self.record_drops(cause, 1);
    }

    pub fn record_drops(&self, cause: DropCause, count: u64) {
        if count == 0 {
            return;
        }
        let counter = match cause {
            DropCause::PacingOverflow => &self.pacing_overflow_drops,
            DropCause::RenderOverflow => &self.render_overflow_drops,
            DropCause::Stale => &self.stale_drops,
            DropCause::RenderFailure => &self.render_failures,
            DropCause::Inactive => &self.inactive_drops,
        };
        counter.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_vsync_fallback(&self) {
        self.vsync_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_depth(&self, queue: QueueKind, depth: usize) {
        let (last, max) = match queue {
            QueueKind::Render => (&self.render_queue_depth, &self.max_render_queue_depth),
            QueueKind::Pacing => (&self.pacing_queue_depth, &self.max_pacing_queue_depth),
        };
        last.store(depth as u64, Ordering::Relaxed);
        max.fetch_max(depth as u64, Ordering::Relaxed);
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted.load(Ordering::Relaxed)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn drops(&self, cause: DropCause) -> u64 {
        match cause {
            DropCause::PacingOverflow => self.pacing_overflow_drops.load(Ordering::Relaxed),
            DropCause::RenderOverflow => self.render_overflow_drops.load(Ordering::Relaxed),
            DropCause::Stale => self.stale_drops.load(Ordering::Relaxed),
            DropCause::RenderFailure => self.render_failures.load(Ordering::Relaxed),
            DropCause::Inactive => self.inactive_drops.load(Ordering::Relaxed),
        }
    }

    /// Frames dropped for any reason
    pub fn frames_dropped(&self) -> u64 {
        [
            DropCause::PacingOverflow,
            DropCause::RenderOverflow,
            DropCause::Stale,
            DropCause::RenderFailure,
            DropCause::Inactive,
        ]
        .iter()
        .map(|cause| self.drops(*cause))
        .sum()
    }

    pub fn vsync_fallbacks(&self) -> u64 {
        self.vsync_fallbacks.load(Ordering::Relaxed)
    }

    /// Calculate the frame drop rate as a percentage of submitted frames
    pub fn frame_drop_rate(&self) -> f64 {
        let submitted = self.frames_submitted();
        if submitted == 0 {
            return 0.0;
        }
        (self.frames_dropped() as f64 / submitted as f64) * 100.0
    }

    pub fn summary(&self) -> StatsSummary {
        let rendered = self.frames_rendered();
        let per_frame_ms = |total_us: &AtomicU64| {
            if rendered == 0 {
                0.0
            } else {
                total_us.load(Ordering::Relaxed) as f64 / rendered as f64 / 1000.0
            }
        };

        StatsSummary {
            frames_submitted: self.frames_submitted(),
            frames_rendered: rendered,
            pacing_overflow_drops: self.drops(DropCause::PacingOverflow),
            render_overflow_drops: self.drops(DropCause::RenderOverflow),
            stale_drops: self.drops(DropCause::Stale),
            render_failures: self.drops(DropCause::RenderFailure),
            frame_drop_rate: self.frame_drop_rate(),
            avg_pacer_time_ms: per_frame_ms(&self.total_pacer_time_us),
            avg_render_time_ms: per_frame_ms(&self.total_render_time_us),
            max_render_queue_depth: self.max_render_queue_depth.load(Ordering::Relaxed),
            max_pacing_queue_depth: self.max_pacing_queue_depth.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self, title: &str) {
        log::info!("{}: {}", title, self.summary());
    }
}

/// Snapshot of the pacing counters
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSummary {
    pub frames_submitted: u64,
    pub frames_rendered: u64,
    pub pacing_overflow_drops: u64,
    pub render_overflow_drops: u64,
    pub stale_drops: u64,
    pub render_failures: u64,
    pub frame_drop_rate: f64,
    pub avg_pacer_time_ms: f64,
    pub avg_render_time_ms: f64,
    pub max_render_queue_depth: u64,
    pub max_pacing_queue_depth: u64,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} submitted, {} rendered ({:.2}% dropped: {} pacing overflow, {} render overflow, {} stale, {} failed) | pacer={:.2}ms render={:.2}ms | max depth render={} pacing={}",
            self.frames_submitted,
            self.frames_rendered,
            self.frame_drop_rate,
            self.pacing_overflow_drops,
            self.render_overflow_drops,
            self.stale_drops,
            self.render_failures,
            self.avg_pacer_time_ms,
            self.avg_render_time_ms,
            self.max_render_queue_depth,
            self.max_pacing_queue_depth,
        )
    }
}
