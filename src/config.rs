use crate::assets::{
    PACING_QUEUE_CAPACITY, RENDER_QUEUE_CAPACITY, STATS_LOG_INTERVAL, TIMER_SLACK, VRR_HISTORY_SIZE,
    VRR_SPIN_MARGIN,
};
use crate::error::PacerError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables of a pacing session.
///
/// Every field has a default so a partial JSON document is enough, e.g.
/// `{"pacing_queue_capacity": 3}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    pub render_queue_capacity: usize,
    pub pacing_queue_capacity: usize,
    pub vrr_history_size: usize,
    pub timer_slack_ms: u64,
    pub vrr_spin_margin_us: u64,
    pub stats_log_interval_secs: u64,
}

impl Default for PacerConfig {
    fn default() -> Self {
        PacerConfig {
            render_queue_capacity: RENDER_QUEUE_CAPACITY,
            pacing_queue_capacity: PACING_QUEUE_CAPACITY,
            vrr_history_size: VRR_HISTORY_SIZE,
            timer_slack_ms: TIMER_SLACK.as_millis() as u64,
            vrr_spin_margin_us: VRR_SPIN_MARGIN.as_micros() as u64,
            stats_log_interval_secs: STATS_LOG_INTERVAL.as_secs(),
        }
    }
}

impl PacerConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: PacerConfig = serde_json::from_str(json).context("Malformed pacer config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read pacer config {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), PacerError> {
        if self.render_queue_capacity == 0 {
            return Err(PacerError::InvalidConfig(
                "render_queue_capacity must be at least 1".into(),
            ));
        }
        if self.pacing_queue_capacity == 0 {
            return Err(PacerError::InvalidConfig(
                "pacing_queue_capacity must be at least 1".into(),
            ));
        }
        if self.vrr_history_size < 2 {
            return Err(PacerError::InvalidConfig(
                "vrr_history_size must hold at least two submissions".into(),
            ));
        }
        Ok(())
    }

    pub fn timer_slack(&self) -> Duration {
        Duration::from_millis(self.timer_slack_ms)
    }

    pub fn vrr_spin_margin(&self) -> Duration {
        Duration::from_micros(self.vrr_spin_margin_us)
    }

    pub fn stats_log_interval(&self) -> Duration {
        Duration::from_secs(self.stats_log_interval_secs)
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
