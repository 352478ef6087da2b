use std::sync::{Arc, Weak};

use super::shared::Shared;

/// Handle an asynchronous vsync source uses to report refreshes.
///
/// Only a weak reference to the pacer is kept: a source that outlives its
/// pacer just sees [`signal`](VsyncSignal::signal) return `false`.
#[derive(Clone)]
pub struct VsyncSignal {
    target: SignalTarget,
}

#[derive(Clone)]
enum SignalTarget {
    Pacer(Weak<Shared>),
    Callback(Arc<dyn Fn() + Send + Sync>),
}

impl VsyncSignal {
    pub(crate) fn for_pacer(shared: &Arc<Shared>) -> Self {
        Self {
            target: SignalTarget::Pacer(Arc::downgrade(shared)),
        }
    }

    /// Deliver refreshes to an arbitrary callback instead of a pacer
    pub fn from_fn(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            target: SignalTarget::Callback(Arc::new(callback)),
        }
    }

    /// Report one display refresh.
    ///
    /// May block for up to one refresh interval while the pacer waits for a
    /// late frame. Returns `false` once the receiver is gone or stopping.
    pub fn signal(&self) -> bool {
        match &self.target {
            SignalTarget::Pacer(shared) => {
                let Some(shared) = shared.upgrade() else {
                    return false;
                };
                if shared.is_stopping() {
                    return false;
                }
                shared.handle_vsync(shared.vsync_interval());
                true
            }
            SignalTarget::Callback(callback) => {
                callback();
                true
            }
        }
    }
}

impl std::fmt::Debug for VsyncSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            SignalTarget::Pacer(shared) => f
                .debug_struct("VsyncSignal")
                .field("pacer_alive", &(shared.strong_count() > 0))
                .finish(),
            SignalTarget::Callback(_) => f.debug_struct("VsyncSignal").finish_non_exhaustive(),
        }
    }
}
