use thiserror::Error;

use crate::pipeline::PacerState;

/// Errors surfaced by [`crate::pacer::Pacer`].
///
/// Everything else (queue overflow, a missing vsync source, a failed
/// presentation) is handled locally and only shows up in the statistics.
#[derive(Debug, Error)]
pub enum PacerError {
    #[error("pacer cannot be initialized while {0}")]
    InvalidState(PacerState),

    #[error("failed to spawn the {name} thread: {source}")]
    ThreadSpawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pacer configuration: {0}")]
    InvalidConfig(String),
}
