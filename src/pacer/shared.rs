//! State shared between the pacer handle and its threads

use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::assets::{DEFAULT_DISPLAY_FPS, NANOS_PER_SEC, RENDER_FAILURE_LOG_BURST};
use crate::config::PacerConfig;
use crate::frame::FrameHandle;
use crate::pipeline::{
    DropCause, FrameQueue, PacingMode, QueueDepthHistory, QueueKind, VideoStats,
};
use crate::renderer::Renderer;
use crate::vrr::VrrFrameScheduler;

pub(crate) struct Queues {
    pub render: FrameQueue,
    pub pacing: FrameQueue,
    pub render_history: QueueDepthHistory,
    pub pacing_history: QueueDepthHistory,
    /// `Some` while frames are accepted
    pub mode: Option<PacingMode>,
    pub stopping: bool,
}

pub(crate) struct Shared {
    pub queues: Mutex<Queues>,
    pub render_queue_not_empty: Condvar,
    pub pacing_queue_not_empty: Condvar,

    pub renderer: Arc<dyn Renderer>,
    pub stats: Arc<VideoStats>,
    pub config: PacerConfig,

    pub vrr: OnceLock<VrrFrameScheduler>,
    pub display_fps: AtomicU32,
    pub has_render_thread: AtomicBool,

    render_failures: AtomicU64,
    last_stats_log: Mutex<Instant>,
}

impl Shared {
    pub fn new(renderer: Arc<dyn Renderer>, stats: Arc<VideoStats>, config: PacerConfig) -> Self {
        let window = (DEFAULT_DISPLAY_FPS / 2).max(1) as usize;
        Self {
            queues: Mutex::new(Queues {
                render: FrameQueue::new(config.render_queue_capacity),
                pacing: FrameQueue::new(config.pacing_queue_capacity),
                render_history: QueueDepthHistory::new(window),
                pacing_history: QueueDepthHistory::new(window),
                mode: None,
                stopping: false,
            }),
            render_queue_not_empty: Condvar::new(),
            pacing_queue_not_empty: Condvar::new(),
            renderer,
            stats,
            config,
            vrr: OnceLock::new(),
            display_fps: AtomicU32::new(DEFAULT_DISPLAY_FPS),
            has_render_thread: AtomicBool::new(false),
            render_failures: AtomicU64::new(0),
            last_stats_log: Mutex::new(Instant::now()),
        }
    }

    /// Size queues and histories for the session, then open the gates
    pub fn activate(&self, mode: PacingMode, display_fps: u32, render_queue_capacity: usize) {
        self.display_fps.store(display_fps, Ordering::Relaxed);
        let window = (display_fps / 2).max(1) as usize;

        let mut queues = self.queues.lock();
        queues.render = FrameQueue::new(render_queue_capacity);
        queues.render_history = QueueDepthHistory::new(window);
        queues.pacing_history = QueueDepthHistory::new(window);
        queues.mode = Some(mode);
    }

    pub fn is_stopping(&self) -> bool {
        self.queues.lock().stopping
    }

    /// Estimated time between two refreshes
    pub fn vsync_interval(&self) -> Duration {
        let fps = self.display_fps.load(Ordering::Relaxed).max(1);
        Duration::from_nanos(NANOS_PER_SEC / fps as u64)
    }

    /// Flag the session as stopping and wake every waiter
    pub fn request_stop(&self) -> Vec<FrameHandle> {
        let mut queues = self.queues.lock();
        queues.stopping = true;
        queues.mode = None;
        self.render_queue_not_empty.notify_all();
        self.pacing_queue_not_empty.notify_all();

        let mut held = queues.render.drain();
        held.extend(queues.pacing.drain());
        held
    }

    pub fn submit(&self, mut frame: FrameHandle) {
        self.stats.record_submitted();
        frame.mark_submitted(Instant::now());

        let mut queues = self.queues.lock();
        let mode = queues.mode;
        let (evicted, cause) = match mode {
            None => {
                drop(queues);
                log::trace!("Pacer: frame {} submitted while inactive", frame.sequence());
                self.stats.record_drop(DropCause::Inactive);
                return;
            }
            Some(PacingMode::Paced) => {
                let evicted = queues.pacing.push(frame);
                self.stats
                    .record_queue_depth(QueueKind::Pacing, queues.pacing.len());
                self.pacing_queue_not_empty.notify_one();
                (evicted, DropCause::PacingOverflow)
            }
            Some(PacingMode::Vrr | PacingMode::Unpaced) => {
                let evicted = queues.render.push(frame);
                self.stats
                    .record_queue_depth(QueueKind::Render, queues.render.len());
                self.render_queue_not_empty.notify_one();
                (evicted, DropCause::RenderOverflow)
            }
        };
        drop(queues);

        if let Some(frame) = evicted {
            log::debug!("Pacer: dropping frame {} ({:?})", frame.sequence(), cause);
            self.stats.record_drop(cause);
        }
    }

    /// Move the newest pending frame to the render queue
    ///
    /// Waits for a late frame until shortly before the following vsync.
    pub fn handle_vsync(&self, time_until_next_vsync: Duration) {
        let deadline = Instant::now()
            + time_until_next_vsync.saturating_sub(self.config.timer_slack());

        let (stale, overflow) = {
            let mut queues = self.queues.lock();
            if queues.stopping || queues.mode != Some(PacingMode::Paced) {
                return;
            }

            let depth = queues.pacing.len();
            queues.pacing_history.record(depth);
            self.stats.record_queue_depth(QueueKind::Pacing, depth);

            // the renderer has not picked up the previous frame yet
            if !queues.render.is_empty() {
                return;
            }

            while queues.pacing.is_empty() && !queues.stopping {
                if self
                    .pacing_queue_not_empty
                    .wait_until(&mut queues, deadline)
                    .timed_out()
                {
                    break;
                }
            }
            if queues.stopping {
                return;
            }
            // another vsync handler filled the slot while we waited
            if !queues.render.is_empty() {
                return;
            }

            let Some((newest, stale)) = queues.pacing.take_newest() else {
                return;
            };
            let overflow = queues.render.push(newest);
            let depth = queues.render.len();
            self.stats.record_queue_depth(QueueKind::Render, depth);
            self.render_queue_not_empty.notify_one();
            (stale, overflow)
        };

        if !stale.is_empty() {
            log::debug!(
                "Pacer: {} stale frame(s) dropped at vsync: {:?}",
                stale.len(),
                stale.iter().map(|f| f.sequence()).collect::<Vec<_>>()
            );
            self.stats.record_drops(DropCause::Stale, stale.len() as u64);
        }
        if overflow.is_some() {
            self.stats.record_drop(DropCause::RenderOverflow);
        }
    }

    /// Block until the render queue has a frame, `None` once stopping
    pub fn next_render_frame(&self) -> Option<FrameHandle> {
        let mut queues = self.queues.lock();
        loop {
            if queues.stopping || queues.mode.is_none() {
                return None;
            }
            if !queues.render.is_empty() {
                break;
            }
            self.render_queue_not_empty.wait(&mut queues);
        }

        let depth = queues.render.len();
        queues.render_history.record(depth);
        queues.render.pop_front()
    }

    /// Hold `frame` until the VRR scheduler says go.
    ///
    /// Frames that arrived meanwhile supersede it. Returns `None` when the
    /// session is stopping.
    fn wait_for_vrr_slot(&self, vrr: &VrrFrameScheduler, frame: FrameHandle) -> Option<FrameHandle> {
        vrr.schedule_frame();
        if !vrr.wait_for_optimal_submission_time() && self.is_stopping() {
            return None;
        }

        let (frame, stale) = {
            let mut queues = self.queues.lock();
            if queues.stopping {
                return None;
            }
            match queues.render.take_newest() {
                Some((newest, mut stale)) => {
                    stale.insert(0, frame);
                    (newest, stale)
                }
                None => (frame, Vec::new()),
            }
        };

        if !stale.is_empty() {
            log::debug!("Pacer: {} frame(s) superseded during VRR wait", stale.len());
            self.stats.record_drops(DropCause::Stale, stale.len() as u64);
        }
        Some(frame)
    }

    /// Present one dequeued frame, pacing it first in VRR mode
    pub fn present(&self, frame: FrameHandle) {
        let frame = match self.vrr.get() {
            Some(vrr) => match self.wait_for_vrr_slot(vrr, frame) {
                Some(frame) => frame,
                None => return,
            },
            None => frame,
        };

        self.render(frame);
    }

    fn render(&self, frame: FrameHandle) {
        self.renderer.prepare_to_render();

        let time_in_pacer = frame.time_in_pacer();
        let start = Instant::now();
        let result = self.renderer.render_frame(&frame);
        let render_time = start.elapsed();

        match result {
            Ok(()) => {
                self.stats.record_rendered(time_in_pacer, render_time);
                if let Some(vrr) = self.vrr.get() {
                    vrr.record_frame_submission();
                }
            }
            Err(e) => {
                let failures = self.render_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures <= RENDER_FAILURE_LOG_BURST || failures % 100 == 0 {
                    log::warn!(
                        "Renderer failed to present frame {} ({} failure(s) so far): {:#}",
                        frame.sequence(),
                        failures,
                        e
                    );
                }
                self.stats.record_drop(DropCause::RenderFailure);
            }
        }

        drop(frame);
        self.maybe_log_stats();
    }

    fn maybe_log_stats(&self) {
        let interval = self.config.stats_log_interval();
        if interval.is_zero() {
            return;
        }
        let mut last = self.last_stats_log.lock();
        if last.elapsed() >= interval {
            *last = Instant::now();
            drop(last);
            self.stats.log_summary("Pacer");
        }
    }
}
