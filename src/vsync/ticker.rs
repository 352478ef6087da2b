use anyhow::{Context, Result, bail};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{AsyncVsyncSource, DisplayTarget, VsyncSignal};
use crate::assets::NANOS_PER_SEC;
use crate::utils::SignalOfStop;

/// Callback-style vsync driven from its own ticker thread.
///
/// Stands in for platform display-link callbacks: the pacer never waits on
/// it, it gets poked through the [`VsyncSignal`] once per refresh.
pub struct TickerVsyncSource {
    interval: Option<Duration>,
    sos: Option<SignalOfStop>,
    thread: Option<JoinHandle<()>>,
}

impl TickerVsyncSource {
    pub fn new() -> Self {
        Self {
            interval: None,
            sos: None,
            thread: None,
        }
    }

    fn run(interval: Duration, signal: VsyncSignal, sos: SignalOfStop) {
        let epoch = Instant::now();
        let interval_ns = interval.as_nanos().max(1);
        let mut tick: u128 = 1;

        loop {
            let deadline = epoch + Duration::from_nanos((tick * interval_ns) as u64);
            if sos.sleep_until(deadline) {
                break;
            }
            if !signal.signal() {
                log::debug!("TickerVsyncSource: pacer is gone, stopping");
                break;
            }
            // skip the ticks we slept through while the pacer handled this one
            let elapsed_ns = epoch.elapsed().as_nanos();
            tick = (tick + 1).max(elapsed_ns / interval_ns + 1);
        }
    }
}

impl Default for TickerVsyncSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncVsyncSource for TickerVsyncSource {
    fn initialize(&mut self, display: &DisplayTarget, display_fps: u32) -> Result<()> {
        if display_fps == 0 {
            bail!("Refresh rate of {} is unknown", display.name);
        }
        self.interval = Some(Duration::from_nanos(NANOS_PER_SEC / display_fps as u64));
        Ok(())
    }

    fn start(&mut self, signal: VsyncSignal) -> Result<()> {
        let Some(interval) = self.interval else {
            bail!("TickerVsyncSource started before initialize");
        };
        if self.thread.is_some() {
            bail!("TickerVsyncSource already running");
        }

        let sos = SignalOfStop::new();
        let thread_sos = sos.clone();
        let handle = thread::Builder::new()
            .name("vsync-ticker".into())
            .spawn(move || Self::run(interval, signal, thread_sos))
            .context("Unable to spawn vsync ticker thread")?;

        self.sos = Some(sos);
        self.thread = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sos) = self.sos.take() {
            sos.cancel();
        }
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            log::error!("TickerVsyncSource: ticker thread panicked");
        }
    }
}

impl Drop for TickerVsyncSource {
    fn drop(&mut self) {
        self.stop();
    }
}
