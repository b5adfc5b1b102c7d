//! Slot-indexed reorder buffer

use std::collections::BTreeMap;

/// Holds out-of-order completions until every earlier slot has arrived
///
/// Slots are numbered from 0 in submission order. [`insert`](Self::insert)
/// returns the contiguous run of items that became emittable, so a
/// consumer sees items in submission order no matter how they complete.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    pending: BTreeMap<usize, T>,
    next: usize,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next: 0,
        }
    }

    /// Store the item for `slot` and take everything now emittable
    ///
    /// Slots already emitted, or already held, are ignored.
    pub fn insert(&mut self, slot: usize, item: T) -> Vec<T> {
        if slot < self.next || self.pending.contains_key(&slot) {
            return Vec::new();
        }
        self.pending.insert(slot, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    /// Slot that must arrive before anything else is emitted
    pub fn next_slot(&self) -> usize {
        self.next
    }

    /// Number of completed items waiting on an earlier slot
    pub fn waiting(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
