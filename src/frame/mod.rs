//! Decoded frames and their ownership
//!
//! A decoded picture travels through the pacer as a move-only
//! [`FrameHandle`]. The handle is owned by exactly one queue (or by the
//! render step) at a time; dropping it is what "releasing" a frame means.
//! Handles created by a [`FrameStore`] hand their pixel buffer back to the
//! store's pool on drop so steady-state streaming does not allocate.

mod pool;

pub use pool::FrameStore;

use pool::StoreInner;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decoded video frame with raw pixel data.
#[derive(Debug)]
pub struct Frame {
    /// Decode order number, unique within a session
    pub sequence: u64,
    /// Presentation timestamp from the stream
    pub pts: Duration,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    /// When the frame was handed to the pacer
    submitted_at: Option<Instant>,
}

impl Frame {
    pub fn new(sequence: u64, pts: Duration, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            sequence,
            pts,
            width,
            height,
            data,
            submitted_at: None,
        }
    }

    pub fn submitted_at(&self) -> Option<Instant> {
        self.submitted_at
    }

    pub(crate) fn mark_submitted(&mut self, at: Instant) {
        self.submitted_at = Some(at);
    }

    /// Time spent since submission, zero if the frame never entered a pacer
    pub fn time_in_pacer(&self) -> Duration {
        self.submitted_at
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Exclusive owner of an in-flight [`Frame`].
///
/// Not `Clone`: a frame can only be moved between queues, never duplicated,
/// so it can neither sit in two queues nor be rendered twice.
pub struct FrameHandle {
    frame: Option<Frame>,
    store: Option<Arc<StoreInner>>,
}

impl FrameHandle {
    /// A handle that is not backed by any store; its buffer is freed on drop.
    pub fn detached(frame: Frame) -> Self {
        Self {
            frame: Some(frame),
            store: None,
        }
    }

    pub(crate) fn pooled(frame: Frame, store: Arc<StoreInner>) -> Self {
        Self {
            frame: Some(frame),
            store: Some(store),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.frame().sequence
    }

    fn frame(&self) -> &Frame {
        // Only `drop` takes the frame out.
        match &self.frame {
            Some(frame) => frame,
            None => unreachable!("frame handle used after release"),
        }
    }

    fn frame_mut(&mut self) -> &mut Frame {
        match &mut self.frame {
            Some(frame) => frame,
            None => unreachable!("frame handle used after release"),
        }
    }
}

impl Deref for FrameHandle {
    type Target = Frame;

    fn deref(&self) -> &Self::Target {
        self.frame()
    }
}

impl DerefMut for FrameHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.frame_mut()
    }
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        if let (Some(frame), Some(store)) = (self.frame.take(), self.store.take()) {
            store.release(frame.sequence, frame.data);
        }
    }
}

impl std::fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("FrameHandle");
        if let Some(frame) = &self.frame {
            debug
                .field("sequence", &frame.sequence)
                .field("pts", &frame.pts)
                .field("size", &frame.size());
        }
        debug.field("pooled", &self.store.is_some()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_handle_derefs() {
        let mut handle = FrameHandle::detached(Frame::new(
            7,
            Duration::from_millis(116),
            2,
            2,
            vec![0u8; 6],
        ));
        assert_eq!(handle.sequence(), 7);
        assert_eq!(handle.size(), 6);
        assert_eq!(handle.time_in_pacer(), Duration::ZERO);

        handle.data[0] = 42;
        assert_eq!(handle.data[0], 42);
    }

    #[test]
    fn test_submission_stamp() {
        let mut handle =
            FrameHandle::detached(Frame::new(1, Duration::ZERO, 1, 1, Vec::new()));
        handle.mark_submitted(Instant::now());
        assert!(handle.submitted_at().is_some());
        std::thread::sleep(Duration::from_millis(2));
        assert!(handle.time_in_pacer() >= Duration::from_millis(2));
    }
}
