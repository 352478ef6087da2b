//! Bounded frame queues used by the pacer
//!
//! Neither type is synchronized on its own: the pacer keeps both queues (and
//! their depth histories) behind a single lock.

use std::collections::VecDeque;

use crate::frame::FrameHandle;

/// FIFO of frames with a drop-oldest overflow policy
pub struct FrameQueue {
    frames: VecDeque<FrameHandle>,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a frame. At capacity the oldest frame is evicted and returned
    /// so the caller can release it outside the lock.
    pub fn push(&mut self, frame: FrameHandle) -> Option<FrameHandle> {
        let evicted = if self.frames.len() >= self.capacity {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    pub fn pop_front(&mut self) -> Option<FrameHandle> {
        self.frames.pop_front()
    }

    /// Remove the most recently pushed frame and every older one.
    ///
    /// Returns the newest frame and the older frames in queue order.
    pub fn take_newest(&mut self) -> Option<(FrameHandle, Vec<FrameHandle>)> {
        let newest = self.frames.pop_back()?;
        let stale = self.frames.drain(..).collect();
        Some((newest, stale))
    }

    /// Empty the queue, handing every frame back in order
    pub fn drain(&mut self) -> Vec<FrameHandle> {
        self.frames.drain(..).collect()
    }

    /// Sequence numbers in presentation order
    pub fn sequences(&self) -> Vec<u64> {
        self.frames.iter().map(|frame| frame.sequence()).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Rolling window of queue length samples, for diagnostics only
#[derive(Debug, Clone)]
pub struct QueueDepthHistory {
    samples: VecDeque<usize>,
    window: usize,
}

impl QueueDepthHistory {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn record(&mut self, depth: usize) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(depth);
    }

    pub fn snapshot(&self) -> DepthSnapshot {
        let samples: Vec<usize> = self.samples.iter().copied().collect();
        let average = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<usize>() as f64 / samples.len() as f64
        };
        DepthSnapshot {
            max: samples.iter().copied().max().unwrap_or(0),
            average,
            samples,
        }
    }
}

/// Copy of a [`QueueDepthHistory`] taken under the pacer lock
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSnapshot {
    pub samples: Vec<usize>,
    pub average: f64,
    pub max: usize,
}
