//! Building blocks shared by the pacer
//!
//! - `clock`: monotonic nanosecond time base
//! - `health`: statistics sink written by the pacer
//! - `queue`: bounded drop-oldest frame queues and depth history
//! - `state`: lifecycle state machine and pacing modes

pub mod clock;
pub mod health;
pub mod queue;
pub mod state;

pub use clock::PacerClock;
pub use health::{DropCause, QueueKind, StatsSummary, VideoStats};
pub use queue::{DepthSnapshot, FrameQueue, QueueDepthHistory};
pub use state::{PacerState, PacingMode};
