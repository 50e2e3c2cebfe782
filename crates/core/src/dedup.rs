// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded insertion-order dedup set.
//!
//! Eviction is oldest-insertion-first, atomic with insert. Reads and
//! writes both take the interior lock.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use parking_lot::Mutex;

/// Default capacity of the process-wide dedup sets.
pub const DEFAULT_DEDUP_CAPACITY: usize = 100;

struct RingInner<K> {
    order: VecDeque<K>,
    members: HashSet<K>,
}

/// Capacity-bounded set remembering the most recently inserted keys.
pub struct DedupRing<K: Eq + Hash + Clone> {
    capacity: usize,
    inner: Mutex<RingInner<K>>,
}

impl<K: Eq + Hash + Clone> DedupRing<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(RingInner {
                order: VecDeque::with_capacity(capacity),
                members: HashSet::with_capacity(capacity),
            }),
        }
    }

    /// Insert a key. Returns `false` when the key was already present
    /// (the insertion order is not refreshed). Evicts the oldest
    /// insertion when full.
    pub fn insert(&self, key: K) -> bool {
        let mut inner = self.inner.lock();
        if inner.members.contains(&key) {
            return false;
        }
        if inner.order.len() == self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.members.remove(&oldest);
            }
        }
        inner.order.push_back(key.clone());
        inner.members.insert(key);
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().members.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone> Default for DedupRing<K> {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
