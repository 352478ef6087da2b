//! Pacer lifecycle state

use std::time::Instant;

/// How frames travel from the decoder to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingMode {
    /// Frames wait in the pacing queue and are released on vsync
    Paced,
    /// Frames are released by the VRR scheduler at the optimal instant
    Vrr,
    /// Frames are rendered as soon as they are submitted
    Unpaced,
}

impl std::fmt::Display for PacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacingMode::Paced => write!(f, "paced"),
            PacingMode::Vrr => write!(f, "vrr"),
            PacingMode::Unpaced => write!(f, "unpaced"),
        }
    }
}

/// Pacer state machine
///
/// A pacer lives through a single streaming session: once stopped it cannot
/// be restarted, a new instance is created instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    /// Constructed, `initialize` not called yet
    Idle,

    /// Vsync source and threads are being brought up
    Initializing,

    /// Accepting and presenting frames
    Running {
        /// Selected pacing policy
        mode: PacingMode,
        /// When the pacer started running
        started_at: Instant,
    },

    /// Threads are being told to exit
    Stopping,

    /// All threads joined and queues drained
    Stopped,
}

impl PacerState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &PacerState) -> bool {
        use PacerState::*;

        match (self, target) {
            (Idle, Initializing) => true,
            (Idle, Stopping) => true,

            (Initializing, Running { .. }) => true,
            (Initializing, Stopping) => true, // spawn failure

            (Running { .. }, Stopping) => true,

            (Stopping, Stopped) => true,

            _ => false,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PacerState::Idle => "idle",
            PacerState::Initializing => "initializing",
            PacerState::Running { .. } => "running",
            PacerState::Stopping => "stopping",
            PacerState::Stopped => "stopped",
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, PacerState::Stopped | PacerState::Stopping)
    }

    pub fn mode(&self) -> Option<PacingMode> {
        match self {
            PacerState::Running { mode, .. } => Some(*mode),
            _ => None,
        }
    }

    pub fn running_duration(&self) -> Option<std::time::Duration> {
        if let PacerState::Running { started_at, .. } = self {
            Some(started_at.elapsed())
        } else {
            None
        }
    }
}

impl std::fmt::Display for PacerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacerState::Running { mode, .. } => write!(f, "running ({})", mode),
            other => write!(f, "{}", other.description()),
        }
    }
}
