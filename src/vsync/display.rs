use anyhow::{Result, anyhow};
use display_info::DisplayInfo as OsDisplayInfo;
use std::time::Duration;

use crate::assets::NANOS_PER_SEC;

/// How the platform reports refreshes for a display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VsyncDelivery {
    /// Somebody has to block and wait for the next refresh
    Polled,
    /// The platform calls back on every refresh
    Callback,
}

/// The display a session presents on
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTarget {
    pub name: String,
    /// Refresh rate in Hz, 0 when unknown
    pub refresh_rate: u32,
    pub vrr_capable: bool,
    pub delivery: VsyncDelivery,
}

impl DisplayTarget {
    pub fn new(name: impl Into<String>, refresh_rate: u32) -> Self {
        Self {
            name: name.into(),
            refresh_rate,
            vrr_capable: false,
            delivery: VsyncDelivery::Polled,
        }
    }

    pub fn with_vrr(mut self, vrr_capable: bool) -> Self {
        self.vrr_capable = vrr_capable;
        self
    }

    pub fn with_delivery(mut self, delivery: VsyncDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Probe the primary monitor of this machine
    pub fn primary() -> Result<Self> {
        let displays =
            OsDisplayInfo::all().map_err(|e| anyhow!("Failed to enumerate displays: {}", e))?;

        let display = displays
            .iter()
            .find(|d| d.is_primary)
            .or_else(|| displays.first())
            .ok_or_else(|| anyhow!("No displays found"))?;

        Ok(Self::new(
            format!("{} ({} x {})", display.name, display.width, display.height),
            display.frequency.round().max(0.0) as u32,
        ))
    }

    /// Duration of one refresh, `None` when the refresh rate is unknown
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_rate > 0)
            .then(|| Duration::from_nanos(NANOS_PER_SEC / self.refresh_rate as u64))
    }
}

impl std::fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {} Hz", self.name, self.refresh_rate)?;
        if self.vrr_capable {
            write!(f, " (VRR)")?;
        }
        Ok(())
    }
}
