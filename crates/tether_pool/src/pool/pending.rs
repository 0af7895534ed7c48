//! # Pending Promotion Tracker
//!
//! Counts how often each unpromoted thread returns a value through the
//! shared pool. A thread that keeps doing it has earned a private slot.
//!
//! The counts are a heuristic. Losing them (table rollover, reset) only
//! delays a promotion, so the table stays small and is thrown away rather
//! than grown without bound.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::identity::ThreadIdentity;

struct PendingEntry {
    owner: ThreadIdentity,
    returns: AtomicU32,
}

struct PendingTable {
    entries: Vec<PendingEntry>,
    capacity: usize,
}

impl PendingTable {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    fn find(&self, id: ThreadIdentity) -> Option<&PendingEntry> {
        self.entries.iter().find(|entry| entry.owner == id)
    }

    fn is_saturated(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}

/// Per-thread return counters for promotion candidates.
///
/// # Thread Safety
///
/// Lookups and increments share a read lock; only inserting a new thread
/// takes the write lock. Counters are atomics, so concurrent increments
/// from different threads never clobber each other.
pub struct PendingTracker {
    table: RwLock<PendingTable>,
    initial_entries: usize,
    max_entries: usize,
    threshold: u32,
}

impl PendingTracker {
    /// Creates an empty tracker.
    ///
    /// # Arguments
    ///
    /// * `initial_entries` - Size of a fresh table
    /// * `max_entries` - Size at which the table is discarded instead of grown
    /// * `threshold` - Returns that make a thread due for promotion
    #[must_use]
    pub fn new(initial_entries: usize, max_entries: usize, threshold: u32) -> Self {
        let initial_entries = initial_entries.clamp(1, max_entries.max(1));
        Self {
            table: RwLock::new(PendingTable::with_capacity(initial_entries)),
            initial_entries,
            max_entries: max_entries.max(1),
            threshold,
        }
    }

    /// Makes sure `id` has a counter.
    pub fn record_take(&self, id: ThreadIdentity) {
        if self.table.read().find(id).is_some() {
            return;
        }

        let mut table = self.table.write();
        if table.find(id).is_some() {
            return;
        }

        if table.is_saturated() {
            if table.capacity >= self.max_entries {
                tracing::trace!(
                    "Pending promotion table full at {} threads, starting over",
                    table.capacity
                );
                *table = PendingTable::with_capacity(self.initial_entries);
            } else {
                let capacity = (table.capacity * 2).min(self.max_entries);
                tracing::trace!("Pending promotion table grown to {}", capacity);
                let additional = capacity - table.entries.len();
                table.entries.reserve_exact(additional);
                table.capacity = capacity;
            }
        }

        table.entries.push(PendingEntry {
            owner: id,
            returns: AtomicU32::new(0),
        });
    }

    /// Counts one shared-pool return by `id`.
    ///
    /// Returns `true` when `id` just reached the promotion threshold; its
    /// counter starts over from zero. Threads without a counter are ignored.
    pub fn record_return(&self, id: ThreadIdentity) -> bool {
        let table = self.table.read();
        let Some(entry) = table.find(id) else {
            return false;
        };

        let returns = entry.returns.fetch_add(1, Ordering::Relaxed) + 1;
        if returns >= self.threshold {
            entry.returns.store(0, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Drops every counter.
    pub fn reset(&self) {
        *self.table.write() = PendingTable::with_capacity(self.initial_entries);
    }

    /// Number of threads with a counter.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.table.read().entries.len()
    }

    /// Current size of the table.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.table.read().capacity
    }

    /// Current count for `id`, if tracked.
    #[must_use]
    pub fn returns_for(&self, id: ThreadIdentity) -> Option<u32> {
        self.table
            .read()
            .find(id)
            .map(|entry| entry.returns.load(Ordering::Relaxed))
    }
}
