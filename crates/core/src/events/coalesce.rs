// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time-window coalescing of same-key updates
//!
//! A burst of updates for one key (a USB device re-enumerating, a flapping
//! link) collapses into the latest value. An entry becomes ready once the
//! window has passed since the key was first seen, so a key that keeps
//! changing is still flushed at a steady rate.

use crate::clock::Timestamp;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

struct Pending<V> {
    value: V,
    first_seen: Timestamp,
    order: u64,
}

pub struct Coalescer<K, V> {
    window: f64,
    capacity: usize,
    pending: HashMap<K, Pending<V>>,
    next_order: u64,
}

impl<K: Eq + Hash + Clone, V> Coalescer<K, V> {
    /// Create a coalescer holding at most `capacity` pending keys
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window: window.as_secs_f64(),
            capacity: capacity.max(1),
            pending: HashMap::new(),
            next_order: 0,
        }
    }

    /// Record an update, replacing any pending value for the key
    ///
    /// Returns `true` when the coalescer is full and should be drained.
    pub fn push(&mut self, key: K, value: V, now: Timestamp) -> bool {
        match self.pending.get_mut(&key) {
            Some(pending) => pending.value = value,
            None => {
                let order = self.next_order;
                self.next_order += 1;
                self.pending.insert(
                    key,
                    Pending {
                        value,
                        first_seen: now,
                        order,
                    },
                );
            }
        }
        self.pending.len() >= self.capacity
    }

    /// Take every entry whose window has elapsed, oldest first
    pub fn drain_ready(&mut self, now: Timestamp) -> Vec<(K, V)> {
        let ready: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| now - p.first_seen >= self.window)
            .map(|(k, _)| k.clone())
            .collect();
        self.take(ready)
    }

    /// Take every pending entry, oldest first
    pub fn drain_all(&mut self) -> Vec<(K, V)> {
        let keys: Vec<K> = self.pending.keys().cloned().collect();
        self.take(keys)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn take(&mut self, keys: Vec<K>) -> Vec<(K, V)> {
        let mut entries: Vec<(u64, K, V)> = keys
            .into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (p.order, k, p.value)))
            .collect();
        entries.sort_by_key(|(order, _, _)| *order);
        entries.into_iter().map(|(_, k, v)| (k, v)).collect()
    }
}

#[cfg(test)]
#[path = "coalesce_tests.rs"]
mod tests;
