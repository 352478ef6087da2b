use std::time::Duration;

pub const DEFAULT_DISPLAY_FPS: u32 = 60;
pub const DEFAULT_STREAM_FPS: u32 = 60;

// queues
pub const RENDER_QUEUE_CAPACITY: usize = 2;
pub const PACING_QUEUE_CAPACITY: usize = 4;

/// Wake up this long before the next vsync when waiting for a late frame
pub const TIMER_SLACK: Duration = Duration::from_millis(3);

// vrr
pub const VRR_HISTORY_SIZE: usize = 30;
pub const VRR_SPIN_MARGIN: Duration = Duration::from_micros(100);
pub const VRR_MAX_ADJUSTMENT: f64 = 0.5;
pub const VRR_MIN_ADJUSTMENT: f64 = 0.05;
pub const VRR_JITTER_SENSITIVITY: f64 = 10.0;

// frame store
pub const MAX_POOLED_BUFFERS: usize = 8;

// diagnostics
pub const RENDER_FAILURE_LOG_BURST: u64 = 5;
pub const STATS_LOG_INTERVAL: Duration = Duration::from_secs(10);

pub const NANOS_PER_SEC: u64 = 1_000_000_000;
