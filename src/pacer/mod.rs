//! Frame pacer
//!
//! Sits between a decoder and a [`Renderer`] and decides when each decoded
//! frame is presented.
//!
//! # Modes
//!
//! - **Paced**: frames land in the pacing queue. On every display refresh
//!   the newest pending frame moves to the render queue and older ones are
//!   dropped, so the display always shows the freshest picture and the
//!   decoder never builds up latency.
//! - **Vrr**: the display follows the content, frames go straight to the
//!   render queue and a [`VrrFrameScheduler`] spaces out their presentation.
//! - **Unpaced**: frames go straight to the render queue and are presented
//!   as soon as the renderer is free.
//!
//! # Threads
//!
//! - The decoder calls [`Pacer::submit_frame`]; it never blocks on a consumer.
//! - A vsync thread runs only for synchronous vsync sources. Asynchronous
//!   sources call back through a [`VsyncSignal`] from their own thread.
//! - A render thread presents frames, unless the renderer must be driven
//!   from the main thread through [`Pacer::render_on_main_thread`].
//!
//! Both queues live behind one lock. Frames leave the pacer by being dropped
//! outside that lock, either after presentation or as a counted drop.

mod shared;
mod signal;
mod threads;

pub use signal::VsyncSignal;

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::assets::DEFAULT_DISPLAY_FPS;
use crate::config::PacerConfig;
use crate::error::PacerError;
use crate::frame::FrameHandle;
use crate::pipeline::{DepthSnapshot, PacerClock, PacerState, PacingMode, VideoStats};
use crate::renderer::{Renderer, RendererAttributes};
use crate::vrr::VrrFrameScheduler;
use crate::vsync::{AsyncVsyncSource, DisplayTarget, SyncVsyncSource, VsyncSource};
use shared::Shared;

/// Sequence numbers currently held by each queue, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueuedSequences {
    pub render: Vec<u64>,
    pub pacing: Vec<u64>,
}

/// Recent depth samples of both queues
#[derive(Debug, Clone, PartialEq)]
pub struct QueueDepths {
    pub render: DepthSnapshot,
    pub pacing: DepthSnapshot,
}

struct Session {
    state: PacerState,
    /// Override handed in before `initialize`
    vsync_source: Option<VsyncSource>,
    async_source: Option<Box<dyn AsyncVsyncSource>>,
    threads: Vec<JoinHandle<()>>,
}

impl Session {
    /// Move to `next` if the state machine allows it
    fn transition_to(&mut self, next: PacerState) -> bool {
        if !self.state.can_transition_to(&next) {
            log::warn!("Pacer: refusing transition from {} to {}", self.state, next);
            return false;
        }
        log::debug!("Pacer: {} -> {}", self.state, next);
        self.state = next;
        true
    }
}

pub struct Pacer {
    shared: Arc<Shared>,
    session: Mutex<Session>,
}

impl Pacer {
    pub fn new(renderer: Arc<dyn Renderer>, stats: Arc<VideoStats>, config: PacerConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(renderer, stats, config)),
            session: Mutex::new(Session {
                state: PacerState::Idle,
                vsync_source: None,
                async_source: None,
                threads: Vec::new(),
            }),
        }
    }

    /// Use `source` instead of the one [`VsyncSource::for_display`] picks
    pub fn with_vsync_source(self, source: VsyncSource) -> Self {
        self.session.lock().vsync_source = Some(source);
        self
    }

    /// Pick a pacing mode for `display` and start the pacer threads.
    ///
    /// A vsync source that cannot be brought up is not an error: the pacer
    /// falls back to unpaced presentation and reports it in the stats.
    pub fn initialize(
        &self,
        display: &DisplayTarget,
        max_video_fps: u32,
        enable_pacing: bool,
    ) -> Result<PacingMode, PacerError> {
        let mut session = self.session.lock();
        if !session.state.can_transition_to(&PacerState::Initializing) {
            return Err(PacerError::InvalidState(session.state));
        }
        self.shared.config.validate()?;
        session.transition_to(PacerState::Initializing);

        let attributes = self.shared.renderer.attributes();
        let enable_pacing = enable_pacing || attributes.contains(RendererAttributes::FORCE_PACING);
        let display_fps = if display.refresh_rate > 0 {
            display.refresh_rate
        } else {
            DEFAULT_DISPLAY_FPS
        };

        let mut mode = PacingMode::Unpaced;
        let mut sync_source = None;

        if attributes.contains(RendererAttributes::VRR_TIMING)
            && display.vrr_capable
            && max_video_fps > 0
        {
            let config = &self.shared.config;
            let scheduler = VrrFrameScheduler::new(max_video_fps, config.vrr_history_size)
                .with_clock(PacerClock::new())
                .with_spin_margin(config.vrr_spin_margin());
            if self.shared.vrr.set(scheduler).is_err() {
                log::warn!("Pacer: VRR scheduler already configured");
            }
            mode = PacingMode::Vrr;
        } else if enable_pacing {
            let source = session
                .vsync_source
                .take()
                .or_else(|| VsyncSource::for_display(display));

            match source {
                Some(source) => match self.start_vsync_source(source, display, display_fps) {
                    Ok(VsyncStart::Thread(source)) => {
                        sync_source = Some(source);
                        mode = PacingMode::Paced;
                    }
                    Ok(VsyncStart::Callback(source)) => {
                        session.async_source = Some(source);
                        mode = PacingMode::Paced;
                    }
                    Err(e) => {
                        log::warn!(
                            "Pacer: vsync unavailable on {}, frames will not be paced: {:#}",
                            display,
                            e
                        );
                        self.shared.stats.record_vsync_fallback();
                    }
                },
                None => log::info!("Pacer: no vsync source for {}, frames will not be paced", display),
            }
        }

        let render_queue_capacity = if attributes.contains(RendererAttributes::NO_BUFFERING) {
            1
        } else {
            self.shared.config.render_queue_capacity
        };
        self.shared.activate(mode, display_fps, render_queue_capacity);

        if let Err(e) = self.spawn_threads(&mut session, sync_source, attributes) {
            drop(session);
            log::error!("Pacer: {}", e);
            self.stop();
            return Err(e);
        }

        session.transition_to(PacerState::Running {
            mode,
            started_at: Instant::now(),
        });
        log::info!(
            "Pacer: {} presentation on {} (stream {} fps, display {} fps)",
            mode,
            display,
            max_video_fps,
            display_fps
        );
        Ok(mode)
    }

    fn start_vsync_source(
        &self,
        mut source: VsyncSource,
        display: &DisplayTarget,
        display_fps: u32,
    ) -> anyhow::Result<VsyncStart> {
        source.initialize(display, display_fps)?;
        Ok(match source {
            VsyncSource::Synchronous(source) => VsyncStart::Thread(source),
            VsyncSource::Asynchronous(mut source) => {
                source.start(VsyncSignal::for_pacer(&self.shared))?;
                VsyncStart::Callback(source)
            }
        })
    }

    fn spawn_threads(
        &self,
        session: &mut Session,
        sync_source: Option<Box<dyn SyncVsyncSource>>,
        attributes: RendererAttributes,
    ) -> Result<(), PacerError> {
        if let Some(source) = sync_source {
            let shared = Arc::clone(&self.shared);
            session
                .threads
                .push(threads::spawn("pacer-vsync", move || {
                    threads::vsync_loop(shared, source)
                })?);
        }

        if !attributes.contains(RendererAttributes::REQUIRES_MAIN_THREAD) {
            let shared = Arc::clone(&self.shared);
            session
                .threads
                .push(threads::spawn("pacer-render", move || threads::render_loop(shared))?);
            self.shared
                .has_render_thread
                .store(true, std::sync::atomic::Ordering::Release);
        }
        Ok(())
    }

    /// Hand a decoded frame to the pacer. Never blocks on the renderer.
    pub fn submit_frame(&self, frame: FrameHandle) {
        self.shared.submit(frame);
    }

    /// Report one display refresh, from any thread
    pub fn signal_vsync(&self) {
        self.shared.handle_vsync(self.shared.vsync_interval());
    }

    /// Present the next frame on the calling thread.
    ///
    /// Blocks until a frame is ready. Returns `false` without rendering when
    /// the pacer owns a render thread, is not running or is shutting down.
    pub fn render_on_main_thread(&self) -> bool {
        if self
            .shared
            .has_render_thread
            .load(std::sync::atomic::Ordering::Acquire)
        {
            return false;
        }

        match self.shared.next_render_frame() {
            Some(frame) => {
                self.shared.present(frame);
                true
            }
            None => false,
        }
    }

    /// Stop the threads and release every queued frame. Idempotent.
    pub fn stop(&self) {
        let (was_idle, ran_for, async_source, threads) = {
            let mut session = self.session.lock();
            if session.state.is_stopped() {
                return;
            }
            let was_idle = session.state == PacerState::Idle;
            let ran_for = session.state.running_duration();
            session.transition_to(PacerState::Stopping);
            (
                was_idle,
                ran_for,
                session.async_source.take(),
                std::mem::take(&mut session.threads),
            )
        };

        let mut released = self.shared.request_stop();
        if let Some(vrr) = self.shared.vrr.get() {
            vrr.interrupt();
        }
        if let Some(mut source) = async_source {
            source.stop();
        }

        for handle in threads {
            let name = handle.thread().name().unwrap_or("pacer").to_owned();
            if handle.join().is_err() {
                log::error!("Pacer: {} thread panicked", name);
            }
        }

        // anything a thread managed to queue before it noticed
        released.extend(self.shared.request_stop());
        let count = released.len();
        drop(released);

        self.session.lock().transition_to(PacerState::Stopped);

        if !was_idle {
            match ran_for {
                Some(ran_for) => log::info!(
                    "Pacer stopped after {:.1}s, released {} queued frame(s)",
                    ran_for.as_secs_f64(),
                    count
                ),
                None => log::info!("Pacer stopped, released {} queued frame(s)", count),
            }
            self.shared.stats.log_summary("Pacer session");
        }
    }

    pub fn state(&self) -> PacerState {
        self.session.lock().state
    }

    pub fn mode(&self) -> Option<PacingMode> {
        self.session.lock().state.mode()
    }

    pub fn stats(&self) -> &Arc<VideoStats> {
        &self.shared.stats
    }

    pub fn vrr_scheduler(&self) -> Option<&VrrFrameScheduler> {
        self.shared.vrr.get()
    }

    pub fn queued_sequences(&self) -> QueuedSequences {
        let queues = self.shared.queues.lock();
        QueuedSequences {
            render: queues.render.sequences(),
            pacing: queues.pacing.sequences(),
        }
    }

    pub fn queue_depths(&self) -> QueueDepths {
        let queues = self.shared.queues.lock();
        QueueDepths {
            render: queues.render_history.snapshot(),
            pacing: queues.pacing_history.snapshot(),
        }
    }
}

impl Drop for Pacer {
    fn drop(&mut self) {
        self.stop();
    }
}

enum VsyncStart {
    Thread(Box<dyn SyncVsyncSource>),
    Callback(Box<dyn AsyncVsyncSource>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, FrameStore};
    use crate::pipeline::DropCause;
    use crate::vsync::{TimerVsyncSource, VsyncDelivery};
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::thread;
    use std::time::Duration;

    struct RecordingRenderer {
        attributes: RendererAttributes,
        fail_on: Vec<u64>,
        rendered: Mutex<Vec<u64>>,
        attempts: AtomicU64,
        prepared: AtomicU64,
    }

    impl RecordingRenderer {
        fn new(attributes: RendererAttributes) -> Arc<Self> {
            Self::failing_on(attributes, Vec::new())
        }

        fn failing_on(attributes: RendererAttributes, fail_on: Vec<u64>) -> Arc<Self> {
            Arc::new(Self {
                attributes,
                fail_on,
                rendered: Mutex::new(Vec::new()),
                attempts: AtomicU64::new(0),
                prepared: AtomicU64::new(0),
            })
        }

        fn rendered(&self) -> Vec<u64> {
            self.rendered.lock().clone()
        }

        fn attempts(&self) -> u64 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl Renderer for RecordingRenderer {
        fn render_frame(&self, frame: &Frame) -> anyhow::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&frame.sequence) {
                return Err(anyhow!("device lost"));
            }
            self.rendered.lock().push(frame.sequence);
            Ok(())
        }

        fn attributes(&self) -> RendererAttributes {
            self.attributes
        }

        fn prepare_to_render(&self) {
            self.prepared.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Asynchronous source that never ticks on its own; tests call
    /// `signal_vsync` instead.
    struct ManualVsync;

    impl AsyncVsyncSource for ManualVsync {
        fn initialize(&mut self, _: &DisplayTarget, _: u32) -> anyhow::Result<()> {
            Ok(())
        }

        fn start(&mut self, _: VsyncSignal) -> anyhow::Result<()> {
            Ok(())
        }

        fn stop(&mut self) {}
    }

    struct BrokenVsync;

    impl SyncVsyncSource for BrokenVsync {
        fn initialize(&mut self, display: &DisplayTarget, _: u32) -> anyhow::Result<()> {
            Err(anyhow!("{} has no vblank interrupt", display.name))
        }

        fn wait_for_vsync(&mut self) {
            thread::sleep(Duration::from_millis(16));
        }
    }

    fn display() -> DisplayTarget {
        DisplayTarget::new("test", 60)
    }

    fn config() -> PacerConfig {
        PacerConfig {
            stats_log_interval_secs: 0,
            ..PacerConfig::default()
        }
    }

    fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    fn acquire(store: &FrameStore, sequence: u64) -> FrameHandle {
        store.acquire(sequence, Duration::from_millis(sequence * 16), 4, 4, 64)
    }

    fn manual_pacer(renderer: Arc<RecordingRenderer>, config: PacerConfig) -> Pacer {
        let pacer = Pacer::new(renderer, Arc::new(VideoStats::new()), config)
            .with_vsync_source(VsyncSource::asynchronous(ManualVsync));
        assert_eq!(
            pacer.initialize(&display(), 60, true).unwrap(),
            PacingMode::Paced
        );
        pacer
    }

    #[test]
    fn test_pacing_queue_keeps_newest() {
        let renderer = RecordingRenderer::new(RendererAttributes::NONE);
        let pacer = manual_pacer(
            renderer.clone(),
            PacerConfig {
                pacing_queue_capacity: 3,
                ..config()
            },
        );
        let store = FrameStore::new();

        for sequence in 1..=5 {
            pacer.submit_frame(acquire(&store, sequence));
        }

        assert_eq!(pacer.queued_sequences().pacing, vec![3, 4, 5]);
        assert_eq!(pacer.stats().drops(DropCause::PacingOverflow), 2);
        assert_eq!(store.outstanding(), 3);
        assert!(!store.is_live(1));
        assert!(!store.is_live(2));

        pacer.signal_vsync();
        assert!(wait_for(Duration::from_secs(2), || renderer.rendered() == vec![5]));
        assert_eq!(pacer.stats().drops(DropCause::Stale), 2);
        assert_eq!(pacer.queued_sequences(), QueuedSequences::default());
        assert!(wait_for(Duration::from_secs(1), || store.outstanding() == 0));

        let depths = pacer.queue_depths();
        assert_eq!(depths.pacing.samples, vec![3]);
    }

    #[test]
    fn test_latest_frame_wins_at_vsync() {
        let renderer = RecordingRenderer::new(RendererAttributes::NONE);
        let pacer = manual_pacer(renderer.clone(), config());

        for sequence in 1..=4 {
            pacer.submit_frame(FrameHandle::detached(Frame::new(
                sequence,
                Duration::ZERO,
                1,
                1,
                Vec::new(),
            )));
        }
        pacer.signal_vsync();

        assert!(wait_for(Duration::from_secs(2), || renderer.rendered() == vec![4]));
        assert_eq!(pacer.stats().drops(DropCause::Stale), 3);
        assert_eq!(pacer.stats().frames_rendered(), 1);
        assert_eq!(renderer.prepared.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_vsync_without_frames_times_out() {
        let renderer = RecordingRenderer::new(RendererAttributes::NONE);
        let pacer = manual_pacer(renderer.clone(), config());

        let start = Instant::now();
        pacer.signal_vsync();
        // one refresh at 60 Hz minus the timer slack
        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(renderer.rendered().is_empty());
    }

    #[test]
    fn test_late_frame_is_picked_up_during_vsync() {
        let renderer = RecordingRenderer::new(RendererAttributes::NONE);
        let pacer = Arc::new(manual_pacer(renderer.clone(), config()));

        let producer = {
            let pacer = Arc::clone(&pacer);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(2));
                pacer.submit_frame(FrameHandle::detached(Frame::new(
                    7,
                    Duration::ZERO,
                    1,
                    1,
                    Vec::new(),
                )));
            })
        };
        pacer.signal_vsync();
        producer.join().unwrap();

        assert!(wait_for(Duration::from_secs(2), || renderer.rendered() == vec![7]));
    }

    #[test]
    fn test_concurrent_vsyncs_fill_one_render_slot() {
        let renderer = RecordingRenderer::new(RendererAttributes::REQUIRES_MAIN_THREAD);
        let pacer = Arc::new(manual_pacer(renderer.clone(), config()));

        let vsyncs: Vec<_> = (0..2)
            .map(|_| {
                let pacer = Arc::clone(&pacer);
                thread::spawn(move || pacer.signal_vsync())
            })
            .collect();

        thread::sleep(Duration::from_millis(2));
        pacer.submit_frame(FrameHandle::detached(Frame::new(1, Duration::ZERO, 1, 1, Vec::new())));
        thread::sleep(Duration::from_millis(3));
        pacer.submit_frame(FrameHandle::detached(Frame::new(2, Duration::ZERO, 1, 1, Vec::new())));

        for vsync in vsyncs {
            vsync.join().unwrap();
        }

        let queued = pacer.queued_sequences();
        assert!(queued.render.len() <= 1, "render queue {:?}", queued.render);
        assert_eq!(pacer.stats().drops(DropCause::RenderOverflow), 0);
        assert!(pacer.stats().max_render_queue_depth.load(Ordering::Relaxed) <= 1);

        // nothing is lost: frames are queued or counted as stale
        let stale = pacer.stats().drops(DropCause::Stale) as usize;
        assert_eq!(queued.render.len() + queued.pacing.len() + stale, 2);
        assert!(queued.render.contains(&2) || queued.pacing.contains(&2));
        assert!(renderer.rendered().is_empty());
    }

    #[test]
    fn test_bursty_stream_under_ticking_and_manual_vsync() {
        let renderer = RecordingRenderer::new(RendererAttributes::NONE);
        let pacer = Arc::new(Pacer::new(renderer.clone(), Arc::new(VideoStats::new()), config()));
        let display = DisplayTarget::new("callback", 200).with_delivery(VsyncDelivery::Callback);
        assert_eq!(pacer.initialize(&display, 60, true).unwrap(), PacingMode::Paced);

        let store = FrameStore::new();
        let done = Arc::new(AtomicBool::new(false));

        let producer = {
            let pacer = Arc::clone(&pacer);
            let store = store.clone();
            thread::spawn(move || {
                let mut sequence = 0u64;
                for round in 0..40u64 {
                    // bursts of one to four frames, then a gap of up to 9 ms
                    for _ in 0..=(round % 4) {
                        sequence += 1;
                        pacer.submit_frame(acquire(&store, sequence));
                    }
                    thread::sleep(Duration::from_millis((round * 7) % 10));
                }
                sequence
            })
        };

        let vsyncs = {
            let pacer = Arc::clone(&pacer);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    pacer.signal_vsync();
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        let submitted = producer.join().unwrap();
        thread::sleep(Duration::from_millis(50));
        done.store(true, Ordering::Release);
        vsyncs.join().unwrap();
        pacer.stop();

        let stats = pacer.stats();
        assert_eq!(stats.frames_submitted(), submitted);
        assert!(
            stats.max_render_queue_depth.load(Ordering::Relaxed)
                <= pacer.shared.config.render_queue_capacity as u64
        );
        assert_eq!(stats.drops(DropCause::RenderOverflow), 0);

        let rendered = renderer.rendered();
        assert!(!rendered.is_empty());
        assert!(
            rendered.windows(2).all(|pair| pair[0] < pair[1]),
            "out of order: {:?}",
            rendered
        );
        assert_eq!(store.outstanding(), 0);
    }

    #[test]
    fn test_session_refuses_illegal_transitions() {
        let mut session = Session {
            state: PacerState::Idle,
            vsync_source: None,
            async_source: None,
            threads: Vec::new(),
        };
        let running = PacerState::Running {
            mode: PacingMode::Paced,
            started_at: Instant::now(),
        };

        assert!(!session.transition_to(running));
        assert_eq!(session.state, PacerState::Idle);
        assert!(!session.transition_to(PacerState::Stopped));

        assert!(session.transition_to(PacerState::Initializing));
        assert!(!session.transition_to(PacerState::Initializing));
        assert!(session.transition_to(running));
        assert!(session.transition_to(PacerState::Stopping));
        assert!(session.transition_to(PacerState::Stopped));
        assert!(!session.transition_to(PacerState::Idle));
        assert_eq!(session.state, PacerState::Stopped);
    }

    #[test]
    fn test_failing_vsync_falls_back_to_unpaced() {
        let renderer = RecordingRenderer::new(RendererAttributes::NONE);
        let pacer = Pacer::new(renderer.clone(), Arc::new(VideoStats::new()), config())
            .with_vsync_source(VsyncSource::synchronous(BrokenVsync));

        assert_eq!(
            pacer.initialize(&display(), 60, true).unwrap(),
            PacingMode::Unpaced
        );
        assert_eq!(pacer.mode(), Some(PacingMode::Unpaced));
        assert_eq!(pacer.stats().vsync_fallbacks(), 1);

        for sequence in 1..=10 {
            pacer.submit_frame(FrameHandle::detached(Frame::new(
                sequence,
                Duration::ZERO,
                1,
                1,
                Vec::new(),
            )));
            assert!(wait_for(Duration::from_secs(2), || {
                renderer.rendered().len() == sequence as usize
            }));
        }

        assert_eq!(renderer.rendered(), (1..=10).collect::<Vec<_>>());
        assert_eq!(pacer.stats().frames_dropped(), 0);
    }

    #[test]
    fn test_stop_releases_every_frame() {
        let renderer = RecordingRenderer::new(RendererAttributes::NONE);
        let pacer = manual_pacer(renderer.clone(), config());
        let store = FrameStore::new();

        for sequence in 1..=4 {
            pacer.submit_frame(acquire(&store, sequence));
        }
        assert_eq!(store.outstanding(), 4);

        let start = Instant::now();
        pacer.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(store.outstanding(), 0);
        assert_eq!(pacer.state(), PacerState::Stopped);

        pacer.submit_frame(acquire(&store, 5));
        assert_eq!(pacer.stats().drops(DropCause::Inactive), 1);
        assert_eq!(store.outstanding(), 0);

        // second stop is a no-op
        pacer.stop();
        assert_eq!(pacer.state(), PacerState::Stopped);
        assert!(renderer.rendered().is_empty());
    }

    #[test]
    fn test_drop_stops_pacer() {
        let store = FrameStore::new();
        {
            let pacer = manual_pacer(RecordingRenderer::new(RendererAttributes::NONE), config());
            pacer.submit_frame(acquire(&store, 1));
            pacer.submit_frame(acquire(&store, 2));
        }
        assert_eq!(store.outstanding(), 0);
    }

    #[test]
    fn test_submit_before_initialize_is_dropped() {
        let pacer = Pacer::new(
            RecordingRenderer::new(RendererAttributes::NONE),
            Arc::new(VideoStats::new()),
            config(),
        );
        let store = FrameStore::new();

        pacer.submit_frame(acquire(&store, 1));
        assert_eq!(pacer.stats().frames_submitted(), 1);
        assert_eq!(pacer.stats().drops(DropCause::Inactive), 1);
        assert_eq!(store.outstanding(), 0);
        assert_eq!(pacer.state(), PacerState::Idle);
        assert!(!pacer.render_on_main_thread());
    }

    #[test]
    fn test_initialize_only_once() {
        let pacer = manual_pacer(RecordingRenderer::new(RendererAttributes::NONE), config());
        assert!(matches!(
            pacer.initialize(&display(), 60, true),
            Err(PacerError::InvalidState(PacerState::Running { .. }))
        ));

        pacer.stop();
        assert!(matches!(
            pacer.initialize(&display(), 60, true),
            Err(PacerError::InvalidState(PacerState::Stopped))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let pacer = Pacer::new(
            RecordingRenderer::new(RendererAttributes::NONE),
            Arc::new(VideoStats::new()),
            PacerConfig {
                pacing_queue_capacity: 0,
                ..config()
            },
        );
        assert!(matches!(
            pacer.initialize(&display(), 60, true),
            Err(PacerError::InvalidConfig(_))
        ));
        assert_eq!(pacer.state(), PacerState::Idle);
    }

    #[test]
    fn test_render_failure_does_not_stop_presentation() {
        let renderer = RecordingRenderer::failing_on(RendererAttributes::NONE, vec![2]);
        let pacer = Pacer::new(renderer.clone(), Arc::new(VideoStats::new()), config());
        assert_eq!(
            pacer.initialize(&display(), 60, false).unwrap(),
            PacingMode::Unpaced
        );

        for sequence in 1..=3 {
            pacer.submit_frame(FrameHandle::detached(Frame::new(
                sequence,
                Duration::ZERO,
                1,
                1,
                Vec::new(),
            )));
            assert!(wait_for(Duration::from_secs(2), || renderer.attempts() == sequence));
        }

        assert_eq!(renderer.rendered(), vec![1, 3]);
        assert_eq!(pacer.stats().drops(DropCause::RenderFailure), 1);
        assert_eq!(pacer.stats().frames_rendered(), 2);
    }

    #[test]
    fn test_main_thread_renderer() {
        let renderer = RecordingRenderer::new(RendererAttributes::REQUIRES_MAIN_THREAD);
        let pacer = Arc::new(Pacer::new(
            renderer.clone(),
            Arc::new(VideoStats::new()),
            config(),
        ));
        assert_eq!(
            pacer.initialize(&display(), 60, false).unwrap(),
            PacingMode::Unpaced
        );

        // render queue holds two frames, the oldest goes first
        for sequence in 1..=5 {
            pacer.submit_frame(FrameHandle::detached(Frame::new(
                sequence,
                Duration::ZERO,
                1,
                1,
                Vec::new(),
            )));
        }
        assert_eq!(pacer.queued_sequences().render, vec![4, 5]);
        assert_eq!(pacer.stats().drops(DropCause::RenderOverflow), 3);

        assert!(pacer.render_on_main_thread());
        assert!(pacer.render_on_main_thread());
        assert_eq!(renderer.rendered(), vec![4, 5]);

        let stopper = {
            let pacer = Arc::clone(&pacer);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                pacer.stop();
            })
        };
        assert!(!pacer.render_on_main_thread());
        stopper.join().unwrap();
    }

    #[test]
    fn test_render_thread_refuses_main_thread_calls() {
        let pacer = manual_pacer(RecordingRenderer::new(RendererAttributes::NONE), config());
        assert!(!pacer.render_on_main_thread());
    }

    #[test]
    fn test_unbuffered_renderer_gets_one_slot() {
        let renderer = RecordingRenderer::new(
            RendererAttributes::REQUIRES_MAIN_THREAD | RendererAttributes::NO_BUFFERING,
        );
        let pacer = Pacer::new(renderer, Arc::new(VideoStats::new()), config());
        pacer.initialize(&display(), 60, false).unwrap();

        for sequence in 1..=3 {
            pacer.submit_frame(FrameHandle::detached(Frame::new(
                sequence,
                Duration::ZERO,
                1,
                1,
                Vec::new(),
            )));
        }
        assert_eq!(pacer.queued_sequences().render, vec![3]);
        assert_eq!(pacer.stats().drops(DropCause::RenderOverflow), 2);
    }

    #[test]
    fn test_force_pacing_overrides_caller() {
        let pacer = Pacer::new(
            RecordingRenderer::new(RendererAttributes::FORCE_PACING),
            Arc::new(VideoStats::new()),
            config(),
        )
        .with_vsync_source(VsyncSource::asynchronous(ManualVsync));

        assert_eq!(
            pacer.initialize(&display(), 60, false).unwrap(),
            PacingMode::Paced
        );
    }

    #[test]
    fn test_unknown_refresh_rate_is_unpaced() {
        let pacer = Pacer::new(
            RecordingRenderer::new(RendererAttributes::NONE),
            Arc::new(VideoStats::new()),
            config(),
        );
        assert_eq!(
            pacer
                .initialize(&DisplayTarget::new("headless", 0), 60, true)
                .unwrap(),
            PacingMode::Unpaced
        );
        assert_eq!(pacer.stats().vsync_fallbacks(), 0);
    }

    #[test]
    fn test_vrr_presents_in_order() {
        let renderer = RecordingRenderer::new(RendererAttributes::VRR_TIMING);
        let pacer = Pacer::new(renderer.clone(), Arc::new(VideoStats::new()), config());
        let display = DisplayTarget::new("vrr panel", 144).with_vrr(true);

        assert_eq!(pacer.initialize(&display, 120, true).unwrap(), PacingMode::Vrr);
        let scheduler = pacer.vrr_scheduler().unwrap();
        assert_eq!(scheduler.target_fps(), 120);

        for sequence in 1..=5 {
            pacer.submit_frame(FrameHandle::detached(Frame::new(
                sequence,
                Duration::ZERO,
                1,
                1,
                Vec::new(),
            )));
            assert!(wait_for(Duration::from_secs(2), || {
                renderer.rendered().len() == sequence as usize
            }));
        }

        assert_eq!(renderer.rendered(), vec![1, 2, 3, 4, 5]);
        assert_eq!(scheduler.history_len(), 5);

        let start = Instant::now();
        pacer.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_vrr_needs_capable_display() {
        let pacer = Pacer::new(
            RecordingRenderer::new(RendererAttributes::VRR_TIMING),
            Arc::new(VideoStats::new()),
            config(),
        )
        .with_vsync_source(VsyncSource::asynchronous(ManualVsync));

        assert_eq!(
            pacer.initialize(&display(), 60, true).unwrap(),
            PacingMode::Paced
        );
        assert!(pacer.vrr_scheduler().is_none());
    }

    #[test]
    fn test_timer_vsync_paces_frames() {
        let renderer = RecordingRenderer::new(RendererAttributes::NONE);
        let pacer = Pacer::new(renderer.clone(), Arc::new(VideoStats::new()), config())
            .with_vsync_source(VsyncSource::synchronous(TimerVsyncSource::new()));
        let display = DisplayTarget::new("timer", 100);
        assert_eq!(pacer.initialize(&display, 60, true).unwrap(), PacingMode::Paced);

        for sequence in 1..=3 {
            pacer.submit_frame(FrameHandle::detached(Frame::new(
                sequence,
                Duration::ZERO,
                1,
                1,
                Vec::new(),
            )));
            assert!(wait_for(Duration::from_secs(2), || {
                renderer.rendered().last() == Some(&sequence)
            }));
        }

        let start = Instant::now();
        pacer.stop();
        // bounded by one refresh of the synchronous source
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_ticker_vsync_paces_frames() {
        let renderer = RecordingRenderer::new(RendererAttributes::NONE);
        let pacer = Pacer::new(renderer.clone(), Arc::new(VideoStats::new()), config());
        let display = DisplayTarget::new("callback", 100).with_delivery(VsyncDelivery::Callback);
        assert_eq!(pacer.initialize(&display, 60, true).unwrap(), PacingMode::Paced);

        pacer.submit_frame(FrameHandle::detached(Frame::new(
            1,
            Duration::ZERO,
            1,
            1,
            Vec::new(),
        )));
        assert!(wait_for(Duration::from_secs(2), || renderer.rendered() == vec![1]));

        pacer.stop();
        assert_eq!(pacer.state(), PacerState::Stopped);
    }
}
