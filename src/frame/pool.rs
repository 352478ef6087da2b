use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{Frame, FrameHandle};
use crate::assets::MAX_POOLED_BUFFERS;

/// Pool of pixel buffers plus an index of the frames currently alive.
///
/// Cloning the store is cheap; clones share the pool.
#[derive(Clone)]
pub struct FrameStore {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    state: Mutex<StoreState>,
    max_pooled: usize,
    allocations: AtomicU64,
    reuses: AtomicU64,
}

struct StoreState {
    free: VecDeque<Vec<u8>>,
    /// sequence number -> number of live handles carrying it
    live: BTreeMap<u64, u32>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_POOLED_BUFFERS)
    }

    /// Keep at most `max_pooled` released buffers around for reuse.
    pub fn with_capacity(max_pooled: usize) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState {
                    free: VecDeque::with_capacity(max_pooled),
                    live: BTreeMap::new(),
                }),
                max_pooled,
                allocations: AtomicU64::new(0),
                reuses: AtomicU64::new(0),
            }),
        }
    }

    /// Take a zeroed buffer of `len` bytes from the pool, or allocate a new
    /// one if necessary, and wrap it in a handle.
    pub fn acquire(
        &self,
        sequence: u64,
        pts: Duration,
        width: u32,
        height: u32,
        len: usize,
    ) -> FrameHandle {
        let recycled = {
            let mut state = self.inner.state.lock();
            *state.live.entry(sequence).or_insert(0) += 1;
            state.free.pop_front()
        };

        let data = match recycled {
            Some(mut buffer) => {
                self.inner.reuses.fetch_add(1, Ordering::Relaxed);
                buffer.clear();
                buffer.resize(len, 0);
                buffer
            }
            None => {
                self.inner.allocations.fetch_add(1, Ordering::Relaxed);
                vec![0u8; len]
            }
        };

        FrameHandle::pooled(
            Frame::new(sequence, pts, width, height, data),
            Arc::clone(&self.inner),
        )
    }

    /// Number of handles created by this store that have not been dropped
    pub fn outstanding(&self) -> usize {
        self.inner
            .state
            .lock()
            .live
            .values()
            .map(|count| *count as usize)
            .sum()
    }

    /// Sequence numbers of the live frames, ascending
    pub fn live_sequences(&self) -> Vec<u64> {
        self.inner.state.lock().live.keys().copied().collect()
    }

    pub fn is_live(&self, sequence: u64) -> bool {
        self.inner.state.lock().live.contains_key(&sequence)
    }

    /// Buffers currently waiting in the pool
    pub fn pooled(&self) -> usize {
        self.inner.state.lock().free.len()
    }

    pub fn allocations(&self) -> u64 {
        self.inner.allocations.load(Ordering::Relaxed)
    }

    pub fn reuses(&self) -> u64 {
        self.inner.reuses.load(Ordering::Relaxed)
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreInner {
    /// Put a given buffer back to the pool after its frame was released.
    pub(crate) fn release(&self, sequence: u64, buffer: Vec<u8>) {
        let mut state = self.state.lock();
        if let Some(count) = state.live.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                state.live.remove(&sequence);
            }
        }
        if state.free.len() < self.max_pooled {
            state.free.push_back(buffer);
        }
    }
}

impl std::fmt::Debug for FrameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStore")
            .field("outstanding", &self.outstanding())
            .field("pooled", &self.pooled())
            .field("allocations", &self.allocations())
            .field("reuses", &self.reuses())
            .finish()
    }
}
