//! Display refresh signaling
//!
//! Platforms deliver refreshes in one of two ways, so a source comes in one
//! of two flavours:
//!
//! - **Synchronous**: the pacer's vsync thread calls
//!   [`SyncVsyncSource::wait_for_vsync`] in a loop, each return is one tick.
//! - **Asynchronous**: the source runs on its own schedule and pokes the
//!   pacer through a [`VsyncSignal`]; no vsync thread is spawned.
//!
//! Both report failure from `initialize` when the display or timing facility
//! is unavailable, and the pacer then degrades instead of failing.

mod display;
mod ticker;
mod timer;

pub use crate::pacer::VsyncSignal;
pub use display::{DisplayTarget, VsyncDelivery};
pub use ticker::TickerVsyncSource;
pub use timer::TimerVsyncSource;

/// A source the caller has to wait on
pub trait SyncVsyncSource: Send {
    fn initialize(&mut self, display: &DisplayTarget, display_fps: u32) -> anyhow::Result<()>;

    /// Block until the next refresh
    fn wait_for_vsync(&mut self);
}

/// A source that signals refreshes by itself
pub trait AsyncVsyncSource: Send {
    fn initialize(&mut self, display: &DisplayTarget, display_fps: u32) -> anyhow::Result<()>;

    /// Begin delivering refreshes to `signal`, from any thread
    fn start(&mut self, signal: VsyncSignal) -> anyhow::Result<()>;

    /// Stop delivering refreshes; no signal may be raised after this returns
    fn stop(&mut self);
}

pub enum VsyncSource {
    Synchronous(Box<dyn SyncVsyncSource>),
    Asynchronous(Box<dyn AsyncVsyncSource>),
}

impl VsyncSource {
    pub fn synchronous(source: impl SyncVsyncSource + 'static) -> Self {
        VsyncSource::Synchronous(Box::new(source))
    }

    pub fn asynchronous(source: impl AsyncVsyncSource + 'static) -> Self {
        VsyncSource::Asynchronous(Box::new(source))
    }

    /// The portable source matching how `display` delivers refreshes, or
    /// `None` when there is no timing to follow.
    pub fn for_display(display: &DisplayTarget) -> Option<Self> {
        if display.refresh_rate == 0 {
            return None;
        }
        Some(match display.delivery {
            VsyncDelivery::Polled => Self::synchronous(TimerVsyncSource::new()),
            VsyncDelivery::Callback => Self::asynchronous(TickerVsyncSource::new()),
        })
    }

    pub fn initialize(&mut self, display: &DisplayTarget, display_fps: u32) -> anyhow::Result<()> {
        match self {
            VsyncSource::Synchronous(source) => source.initialize(display, display_fps),
            VsyncSource::Asynchronous(source) => source.initialize(display, display_fps),
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, VsyncSource::Asynchronous(_))
    }
}

impl std::fmt::Debug for VsyncSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VsyncSource::Synchronous(_) => write!(f, "VsyncSource::Synchronous"),
            VsyncSource::Asynchronous(_) => write!(f, "VsyncSource::Asynchronous"),
        }
    }
}
