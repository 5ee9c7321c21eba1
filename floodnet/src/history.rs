//! Bounded duplicate-detection window.
//!
//! Each node remembers the last few (originator, version) pairs it accepted.
//! The window is a plain FIFO: once full, recording a new pair evicts the
//! oldest one, after which that packet would be treated as new again.

use alloc::collections::VecDeque;

use crate::types::{NodeId, PacketKey, Version, DEFAULT_HISTORY_CAPACITY};

/// Fixed-capacity, insertion-ordered record of recently seen packets.
///
/// [`insert`](Self::insert) does not check for an existing entry. Callers
/// that want dedup semantics check [`contains`](Self::contains) first.
#[derive(Debug, Clone)]
pub struct PacketHistory {
    entries: VecDeque<PacketKey>,
    capacity: usize,
}

impl Default for PacketHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl PacketHistory {
    /// Create an empty window holding at most `capacity` pairs.
    ///
    /// A capacity of zero is raised to one; use
    /// [`EngineConfig::validate`](crate::config::EngineConfig::validate) to
    /// reject it up front instead.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// True iff this exact pair is currently in the window.
    pub fn contains(&self, originator: NodeId, version: Version) -> bool {
        self.contains_key(&PacketKey::new(originator, version))
    }

    pub fn contains_key(&self, key: &PacketKey) -> bool {
        self.entries.iter().any(|entry| entry == key)
    }

    /// Record a pair at the newest end, evicting the oldest if full.
    pub fn insert(&mut self, originator: NodeId, version: Version) {
        self.insert_key(PacketKey::new(originator, version));
    }

    /// Record a key, returning the evicted entry if the window was full.
    pub fn insert_key(&mut self, key: PacketKey) -> Option<PacketKey> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(key);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &PacketKey> {
        self.entries.iter()
    }
}
