//! Frame management for the shared page cache.
//!
//! This module implements the pinned-frame cache over a bounded physical
//! pool shared by every open file. It provides:
//! - Page pinning with explicit reference counting
//! - LRU eviction over unpinned frames
//! - A leak check at teardown
//!
//! # Architecture
//!
//! [`FrameAllocator`] owns the bounded pool, [`FrameCache`] owns identity
//! and eviction order, and [`FrameManager`] is the concurrent facade that
//! coordinates both under a single mutex. Every public operation holds the
//! mutex for its entire duration and never suspends while holding it.
//!
//! # Example
//!
//! ```ignore
//! let manager = FrameManager::new(pool_num)?;
//! let frame = manager.alloc(fd, page_num).expect("pool not exhausted");
//! frame.write().data[0] = 0xAB;
//! manager.unpin(fd, page_num);
//! ```

mod allocator;
mod cache;
#[allow(clippy::module_inception)]
mod frame;

pub use allocator::FrameAllocator;
pub use cache::FrameCache;
pub use frame::{Frame, FrameId, FrameRef, PAGE_SIZE};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::{MinirelError, Result};

/// Concurrent facade over the frame pool.
///
/// One mutex guards the cache and the allocator together, so lookup,
/// allocation, pin mutation, and eviction are a single critical section.
/// Once `alloc` or `get` returns a pinned frame, no other thread can evict
/// it until the last pin is released.
pub struct FrameManager {
    inner: Mutex<FrameManagerInner>,
    /// Maximum number of resident frames.
    capacity: usize,
    /// Counter for lookups served from the cache.
    cache_hits: AtomicU64,
    /// Counter for lookups that missed the cache.
    cache_misses: AtomicU64,
    /// Counter for frames evicted.
    evictions: AtomicU64,
}

struct FrameManagerInner {
    cache: FrameCache,
    allocator: FrameAllocator,
}

impl FrameManager {
    /// Creates a frame manager over a preallocated pool of `pool_num`
    /// frames.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::NoMem`] if the pool cannot be allocated and
    /// [`MinirelError::InvalidArgument`] for a zero-sized pool.
    pub fn new(pool_num: usize) -> Result<Self> {
        let allocator = FrameAllocator::new(pool_num)?;
        debug!("frame pool initialized with {pool_num} frames");

        Ok(Self {
            inner: Mutex::new(FrameManagerInner {
                cache: FrameCache::with_capacity(pool_num),
                allocator,
            }),
            capacity: pool_num,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Maximum number of resident frames.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames currently resident.
    #[must_use]
    pub fn resident(&self) -> usize {
        self.inner.lock().cache.len()
    }

    /// Tears the manager down, verifying no frame is still resident.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Internal`] if any frame is still in the
    /// cache; a resident frame at teardown means some caller leaked a pin
    /// or skipped `free`.
    pub fn cleanup(&self) -> Result<()> {
        let inner = self.inner.lock();
        if inner.cache.is_empty() {
            Ok(())
        } else {
            Err(MinirelError::Internal(format!(
                "{} frames still resident at cleanup",
                inner.cache.len()
            )))
        }
    }

    /// Pins and returns the frame for `(file_desc, page_num)`, allocating
    /// one from the pool if the page is not resident.
    ///
    /// Returns `None` when the page is not resident and the pool is
    /// exhausted; callers are expected to run [`Self::evict_frames`] and
    /// retry.
    pub fn alloc(&self, file_desc: i32, page_num: u32) -> Option<FrameRef> {
        let id = FrameId::new(file_desc, page_num);
        let mut inner = self.inner.lock();

        if let Some(frame) = inner.cache.get(id) {
            frame.write().pin();
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Some(frame);
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let frame = inner.allocator.alloc()?;
        {
            let mut f = frame.write();
            assert_eq!(
                f.pin_count, 0,
                "allocator handed out a pinned frame for {id}"
            );
            f.frame_id = Some(id);
            f.dirty = false;
            f.pin();
        }
        inner.cache.put(id, Arc::clone(&frame));

        Some(frame)
    }

    /// Pins and returns the frame for `(file_desc, page_num)` if resident.
    ///
    /// Never allocates; a miss returns `None`.
    pub fn get(&self, file_desc: i32, page_num: u32) -> Option<FrameRef> {
        let id = FrameId::new(file_desc, page_num);
        let mut inner = self.inner.lock();

        match inner.cache.get(id) {
            Some(frame) => {
                frame.write().pin();
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                Some(frame)
            }
            None => {
                self.cache_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Releases one pin on a resident frame.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not resident or its pin count is already
    /// zero; an unbalanced unpin is a caller bug.
    pub fn unpin(&self, file_desc: i32, page_num: u32) {
        let id = FrameId::new(file_desc, page_num);
        let inner = self.inner.lock();

        let frame = inner
            .cache
            .peek(id)
            .unwrap_or_else(|| panic!("unpin of non-resident frame {id}"));
        let mut f = frame.write();
        assert!(
            f.pin_count > 0,
            "frame {id} has pin count 0, but an unpin was attempted"
        );
        f.unpin();
    }

    /// Removes a frame from the cache and returns it to the pool.
    ///
    /// The caller must be the last holder: the provided `frame` must match
    /// the resident entry and its pin count must be exactly one.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not resident, the pointer does not match the
    /// resident entry, or the pin count is not one. All three are
    /// programmer errors.
    pub fn free(&self, file_desc: i32, page_num: u32, frame: &FrameRef) {
        let id = FrameId::new(file_desc, page_num);
        let mut inner = self.inner.lock();

        let resident = inner
            .cache
            .peek(id)
            .unwrap_or_else(|| panic!("free of non-resident frame {id}"));
        assert!(
            Arc::ptr_eq(&resident, frame),
            "free of {id} with a frame that is not the resident entry"
        );
        {
            let mut f = resident.write();
            assert_eq!(
                f.pin_count, 1,
                "free of {id} while other holders still have it pinned"
            );
            f.unpin();
        }

        let removed = inner.cache.remove(id).unwrap_or_else(|| {
            panic!("cache entry for {id} vanished under the manager mutex")
        });
        inner.allocator.free(removed);
    }

    /// Pins and returns every resident frame belonging to `file_desc`.
    ///
    /// Used when closing or flushing a file; the caller owns one pin on
    /// each returned frame.
    #[must_use]
    pub fn find_list(&self, file_desc: i32) -> Vec<FrameRef> {
        let inner = self.inner.lock();
        let frames = inner.cache.frames_for_file(file_desc);
        for frame in &frames {
            frame.write().pin();
        }
        frames
    }

    /// Evicts up to `count` unpinned frames, oldest first.
    ///
    /// For each evictable candidate the `evict_action` callback runs while
    /// the manager mutex is held; it is expected to write dirty contents
    /// out and must not call back into this manager. If the action
    /// succeeds the frame leaves the cache and returns to the pool; if it
    /// fails the frame stays resident and the walk continues with the next
    /// candidate.
    ///
    /// Returns the number of frames actually evicted.
    pub fn evict_frames<F>(&self, count: usize, mut evict_action: F) -> usize
    where
        F: FnMut(&mut Frame) -> Result<()>,
    {
        if count == 0 {
            return 0;
        }

        let mut inner = self.inner.lock();

        let mut candidates = Vec::with_capacity(inner.cache.len());
        inner.cache.for_each(|id, _| {
            candidates.push(id);
            true
        });

        let mut evicted = 0;
        for id in candidates {
            if evicted == count {
                break;
            }
            let Some(frame) = inner.cache.peek(id) else {
                continue;
            };

            let outcome = {
                let mut f = frame.write();
                if f.can_evict() {
                    Some(evict_action(&mut f))
                } else {
                    None
                }
            };

            match outcome {
                None => {}
                Some(Ok(())) => {
                    if let Some(removed) = inner.cache.remove(id) {
                        inner.allocator.free(removed);
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                        evicted += 1;
                    }
                }
                Some(Err(e)) => {
                    warn!("eviction action failed for {id}, frame stays resident: {e}");
                }
            }
        }

        evicted
    }

    /// Writes every dirty resident frame out through `flush_action` and
    /// marks it clean.
    ///
    /// Frames stay resident and pinned; holders are unaffected. A failed
    /// action leaves its frame dirty and the walk continues. Returns the
    /// number of frames flushed.
    pub fn flush_dirty<F>(&self, mut flush_action: F) -> usize
    where
        F: FnMut(&mut Frame) -> Result<()>,
    {
        let inner = self.inner.lock();

        let mut frames = Vec::with_capacity(inner.cache.len());
        inner.cache.for_each(|_, frame| {
            frames.push(Arc::clone(frame));
            true
        });

        let mut flushed = 0;
        for frame in frames {
            let mut f = frame.write();
            if !f.dirty {
                continue;
            }
            match flush_action(&mut f) {
                Ok(()) => {
                    f.dirty = false;
                    flushed += 1;
                }
                Err(e) => {
                    warn!("flush failed for {:?}, frame stays dirty: {e}", f.frame_id);
                }
            }
        }
        flushed
    }

    /// Returns a snapshot of the manager's counters and occupancy.
    #[must_use]
    pub fn stats(&self) -> FrameManagerStats {
        let inner = self.inner.lock();

        let mut dirty_frames = 0;
        let mut pinned_frames = 0;
        inner.cache.for_each(|_, frame| {
            let f = frame.read();
            if f.dirty {
                dirty_frames += 1;
            }
            if f.pin_count > 0 {
                pinned_frames += 1;
            }
            true
        });

        FrameManagerStats {
            capacity: self.capacity,
            resident: inner.cache.len(),
            dirty_frames,
            pinned_frames,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the frame manager state.
#[derive(Debug, Clone)]
pub struct FrameManagerStats {
    /// Maximum number of resident frames.
    pub capacity: usize,
    /// Current number of resident frames.
    pub resident: usize,
    /// Number of dirty resident frames.
    pub dirty_frames: usize,
    /// Number of pinned resident frames.
    pub pinned_frames: usize,
    /// Lookups served from the cache.
    pub cache_hits: u64,
    /// Lookups that missed the cache.
    pub cache_misses: u64,
    /// Frames evicted over the manager's lifetime.
    pub evictions: u64,
}

impl FrameManagerStats {
    /// Cache hit rate in `[0.0, 1.0]`, or `None` before any lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            None
        } else {
            Some(self.cache_hits as f64 / total as f64)
        }
    }
}
