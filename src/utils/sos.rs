use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Signal of stop: a cloneable, one-shot cancellation flag that sleeping
/// threads can wait on.
#[derive(Debug, Clone)]
pub struct SignalOfStop {
    // Shared state between clones
    shared: Arc<SharedState>,
}

#[derive(Debug)]
struct SharedState {
    closing: AtomicBool,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl SignalOfStop {
    pub fn new() -> SignalOfStop {
        SignalOfStop {
            shared: Arc::new(SharedState {
                closing: AtomicBool::new(false),
                mutex: Mutex::new(()),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        self.shared.closing.store(true, Ordering::Release);

        // Lock briefly so a waiter cannot miss the notification between its
        // flag check and its wait.
        let _guard = self.shared.mutex.lock();
        self.shared.condvar.notify_all();
    }

    pub fn cancelled(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    /// Sleep until `deadline` unless cancelled first.
    ///
    /// Returns `true` if the signal was cancelled.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        let mut guard = self.shared.mutex.lock();
        while !self.cancelled() {
            if self
                .shared
                .condvar
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                break;
            }
        }
        self.cancelled()
    }

    /// Sleep for `timeout` unless cancelled first.
    pub fn sleep(&self, timeout: Duration) -> bool {
        self.sleep_until(Instant::now() + timeout)
    }
}

impl Default for SignalOfStop {
    fn default() -> Self {
        Self::new()
    }
}
