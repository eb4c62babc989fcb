use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::Frame;

/// A thread-safe pool of reusable [`Frame`]s of one `(channels, capacity)`
/// shape.
///
/// Acquired frames carry the full capacity with undefined contents; callers
/// that need silence must zero them. A frame must be released back to the
/// pool it was drawn from; narrowed frames are re-expanded on release.
/// Double release is prevented by the ownership discipline above the pool,
/// not by the pool itself.
pub struct FramePool {
    channels: usize,
    capacity: usize,
    free: SegQueue<Frame>,
    allocated: AtomicUsize,
}

impl FramePool {
    pub fn new(channels: usize, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            channels,
            capacity,
            free: SegQueue::new(),
            allocated: AtomicUsize::new(0),
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Takes a frame off the free list, allocating a fresh one when the
    /// list is empty.
    pub fn acquire(&self) -> Frame {
        match self.free.pop() {
            Some(frame) => frame,
            None => {
                let total = self.allocated.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::trace!(
                    channels = self.channels,
                    capacity = self.capacity,
                    total,
                    "frame pool grows"
                );
                Frame::new(self.channels, self.capacity)
            }
        }
    }

    /// Returns a frame to the free list, restoring its full capacity.
    pub fn release(&self, mut frame: Frame) {
        assert_eq!(
            (frame.channels(), frame.capacity()),
            (self.channels, self.capacity),
            "frame released to a pool of a different shape"
        );
        frame.reset();
        self.free.push(frame);
    }

    /// Number of frames ever allocated by this pool.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Number of frames currently out of the pool.
    pub fn in_use(&self) -> usize {
        self.allocated().saturating_sub(self.free.len())
    }
}
