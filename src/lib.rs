//! Frame pacing for real-time streaming clients.
//!
//! Decoded frames go into a [`Pacer`], which presents them through a
//! [`Renderer`] in step with the display: on vsync, as a VRR display wants
//! them, or as fast as they come when neither is available.

pub mod assets;
pub mod config;
pub mod error;
pub mod frame;
pub mod pacer;
pub mod pipeline;
pub mod renderer;
pub mod utils;
pub mod vrr;
pub mod vsync;

pub use config::PacerConfig;
pub use error::PacerError;
pub use frame::{Frame, FrameHandle, FrameStore};
pub use pacer::{Pacer, QueueDepths, QueuedSequences, VsyncSignal};
pub use pipeline::{DropCause, PacerState, PacingMode, VideoStats};
pub use renderer::{Renderer, RendererAttributes};
pub use vrr::VrrFrameScheduler;
pub use vsync::{DisplayTarget, VsyncDelivery, VsyncSource};
