use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::shared::Shared;
use crate::error::PacerError;
use crate::vsync::SyncVsyncSource;

pub(super) fn spawn(
    name: &'static str,
    body: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>, PacerError> {
    thread::Builder::new()
        .name(name.into())
        .spawn(body)
        .map_err(|source| PacerError::ThreadSpawn { name, source })
}

pub(super) fn render_loop(shared: Arc<Shared>) {
    log::debug!("Pacer: render thread started");
    while let Some(frame) = shared.next_render_frame() {
        shared.present(frame);
    }
    log::debug!("Pacer: render thread exiting");
}

/// Drive a synchronous source. Exits on the first tick after stop.
pub(super) fn vsync_loop(shared: Arc<Shared>, mut source: Box<dyn SyncVsyncSource>) {
    log::debug!("Pacer: vsync thread started");
    loop {
        source.wait_for_vsync();
        if shared.is_stopping() {
            break;
        }
        shared.handle_vsync(shared.vsync_interval());
    }
    log::debug!("Pacer: vsync thread exiting");
}
