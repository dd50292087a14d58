//! Associative frame lookup with an eviction ordering.
//!
//! The cache maps a [`FrameId`] to its resident frame and additionally keeps
//! the identities in least-recently-used order, so eviction can walk
//! candidates oldest-first. A `get` promotes the entry to most recently
//! used; `peek` does not.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::frame::frame::{FrameId, FrameRef};

/// Map `FrameId -> FrameRef` with LRU-ordered traversal.
#[derive(Debug, Default)]
pub struct FrameCache {
    map: HashMap<FrameId, FrameRef>,
    /// Identities in eviction order, least recently used at the front.
    lru: VecDeque<FrameId>,
}

impl FrameCache {
    /// Creates an empty cache sized for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            lru: VecDeque::with_capacity(capacity),
        }
    }

    /// Looks up a frame and promotes it to most recently used.
    pub fn get(&mut self, id: FrameId) -> Option<FrameRef> {
        let frame = self.map.get(&id).map(Arc::clone)?;
        self.lru.retain(|&other| other != id);
        self.lru.push_back(id);
        Some(frame)
    }

    /// Looks up a frame without touching the eviction order.
    #[must_use]
    pub fn peek(&self, id: FrameId) -> Option<FrameRef> {
        self.map.get(&id).map(Arc::clone)
    }

    /// Inserts a frame as the most recently used entry.
    pub fn put(&mut self, id: FrameId, frame: FrameRef) {
        if self.map.insert(id, frame).is_some() {
            self.lru.retain(|&other| other != id);
        }
        self.lru.push_back(id);
    }

    /// Removes a frame from the cache, returning it if it was resident.
    pub fn remove(&mut self, id: FrameId) -> Option<FrameRef> {
        let frame = self.map.remove(&id)?;
        self.lru.retain(|&other| other != id);
        Some(frame)
    }

    /// Visits entries in eviction-candidate order (least recent first).
    ///
    /// The visitor returns `true` to continue and `false` to stop early.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(FrameId, &FrameRef) -> bool,
    {
        for id in &self.lru {
            let frame = &self.map[id];
            if !visitor(*id, frame) {
                break;
            }
        }
    }

    /// Returns every resident frame belonging to `file_desc`.
    #[must_use]
    pub fn frames_for_file(&self, file_desc: i32) -> Vec<FrameRef> {
        self.lru
            .iter()
            .filter(|id| id.file_desc == file_desc)
            .map(|id| Arc::clone(&self.map[id]))
            .collect()
    }

    /// Number of resident frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
