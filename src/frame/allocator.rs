//! Bounded pool of frame storage.
//!
//! The allocator owns the physical memory of the pool and nothing else: it
//! hands out empty frames and takes them back. Identity, pinning, and
//! eviction policy live in the [`FrameManager`](crate::frame::FrameManager),
//! which coordinates the allocator and the cache as one critical section.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{MinirelError, Result};
use crate::frame::frame::{Frame, FrameRef};

/// Bounded pool of [`Frame`] storage, preallocated up front.
#[derive(Debug)]
pub struct FrameAllocator {
    /// Frames not currently handed out.
    free: Vec<FrameRef>,
    /// Total number of frames in the pool.
    capacity: usize,
}

impl FrameAllocator {
    /// Preallocates a pool of `pool_num` frames.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::InvalidArgument`] for a zero-sized pool and
    /// [`MinirelError::NoMem`] if the backing storage cannot be reserved.
    pub fn new(pool_num: usize) -> Result<Self> {
        if pool_num == 0 {
            return Err(MinirelError::InvalidArgument(
                "frame pool size must be greater than 0".into(),
            ));
        }

        let mut free = Vec::new();
        free.try_reserve_exact(pool_num)
            .map_err(|_| MinirelError::NoMem(format!("frame pool of {pool_num} frames")))?;
        for _ in 0..pool_num {
            free.push(Arc::new(RwLock::new(Frame::new())));
        }

        Ok(Self {
            free,
            capacity: pool_num,
        })
    }

    /// Hands out an unused frame, or `None` when the pool is exhausted.
    ///
    /// The returned frame has no identity, a pin count of zero, and
    /// unspecified page contents.
    pub fn alloc(&mut self) -> Option<FrameRef> {
        self.free.pop()
    }

    /// Returns a frame to the pool.
    ///
    /// # Panics
    ///
    /// Panics if the frame is still pinned; returning a claimed frame is a
    /// caller bug.
    pub fn free(&mut self, frame: FrameRef) {
        {
            let mut f = frame.write();
            assert_eq!(
                f.pin_count, 0,
                "frame {:?} returned to the pool while still pinned",
                f.frame_id
            );
            f.reset();
        }
        debug_assert!(self.free.len() < self.capacity);
        self.free.push(frame);
    }

    /// Total number of frames in the pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames currently available.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Number of frames currently handed out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.capacity - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_pool_rejected() {
        let err = FrameAllocator::new(0).unwrap_err();
        assert!(matches!(err, MinirelError::InvalidArgument(_)));
    }

    #[test]
    fn test_alloc_until_exhausted() {
        let mut allocator = FrameAllocator::new(3).unwrap();
        assert_eq!(allocator.capacity(), 3);

        let mut held = Vec::new();
        for _ in 0..3 {
            held.push(allocator.alloc().expect("pool not yet exhausted"));
        }
        assert!(allocator.alloc().is_none());
        assert_eq!(allocator.in_use(), 3);
    }

    #[test]
    fn test_free_returns_to_pool() {
        let mut allocator = FrameAllocator::new(1).unwrap();

        let frame = allocator.alloc().unwrap();
        frame.write().dirty = true;
        assert!(allocator.alloc().is_none());

        allocator.free(frame);
        assert_eq!(allocator.available(), 1);

        // Contents were invalidated on the way back in.
        let again = allocator.alloc().unwrap();
        assert!(!again.read().dirty);
        assert!(again.read().frame_id.is_none());
    }

    #[test]
    #[should_panic(expected = "still pinned")]
    fn test_free_pinned_frame_panics() {
        let mut allocator = FrameAllocator::new(1).unwrap();
        let frame = allocator.alloc().unwrap();
        frame.write().pin();
        allocator.free(frame);
    }
}
