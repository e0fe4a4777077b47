//! Bounded history store.
//!
//! Keeps at most N persisted messages. Pushing at capacity evicts the oldest
//! entry (strict FIFO, never reordered). Owned by the event loop, so there is
//! no locking.

use std::collections::VecDeque;

/// Append-only history with a fixed capacity
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    /// Create an empty history holding up to `capacity` entries.
    ///
    /// `BrokerConfig::validate` rejects a zero capacity; if one gets here
    /// anyway it is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, returning the one evicted to make room, if any.
    pub fn push(&mut self, entry: T) -> Option<T> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// The last `min(len, k)` entries, oldest first. Does not modify the store.
    pub fn replay(&self, k: usize) -> Vec<T> {
        let skip = self.entries.len().saturating_sub(k);
        self.entries.iter().skip(skip).cloned().collect()
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

    /// Entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}
