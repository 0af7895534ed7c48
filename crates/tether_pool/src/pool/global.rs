//! # Global Pool
//!
//! Bounded LIFO stack shared by every thread, behind one short-held lock.
//! Its capacity is movable: each promotion moves one unit of quota from
//! here into a private slot, and a full reset moves it all back.

use parking_lot::Mutex;

/// Shared fallback stack with a mutable quota.
///
/// # Thread Safety
///
/// Every operation takes the internal mutex for O(1) work, except
/// [`set_max_count`](Self::set_max_count) which may pop several items.
pub struct GlobalPool<T> {
    state: Mutex<GlobalState<T>>,
}

struct GlobalState<T> {
    /// Pooled values, most recently returned last.
    items: Vec<T>,
    /// Current quota of this stack.
    max_count: usize,
    takes: u64,
    take_hits: u64,
    returns: u64,
    return_rejects: u64,
    evictions: u64,
}

/// Counters read out of a [`GlobalPool`] in one lock hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalSnapshot {
    /// Items currently stacked.
    pub len: usize,
    /// Current quota.
    pub max_count: usize,
    /// Calls to `take`.
    pub takes: u64,
    /// Calls to `take` that returned a value.
    pub take_hits: u64,
    /// Calls to `put`.
    pub returns: u64,
    /// Calls to `put` that found the stack full.
    pub return_rejects: u64,
    /// Items dropped to make room for a quota decrease.
    pub evictions: u64,
}

impl<T> GlobalPool<T> {
    /// Creates an empty stack with the given quota.
    ///
    /// Storage for the full quota is reserved up front.
    #[must_use]
    pub fn new(max_count: usize) -> Self {
        Self {
            state: Mutex::new(GlobalState {
                items: Vec::with_capacity(max_count),
                max_count,
                takes: 0,
                take_hits: 0,
                returns: 0,
                return_rejects: 0,
                evictions: 0,
            }),
        }
    }

    /// Pops the most recently returned value.
    pub fn take(&self) -> Option<T> {
        let mut state = self.state.lock();
        state.takes += 1;
        let value = state.items.pop();
        if value.is_some() {
            state.take_hits += 1;
        }
        value
    }

    /// Pushes a value if the stack is under quota.
    ///
    /// # Errors
    ///
    /// Hands the value back when the stack is full; the caller disposes of it.
    pub fn put(&self, value: T) -> Result<(), T> {
        let mut state = self.state.lock();
        state.returns += 1;
        if state.items.len() < state.max_count {
            state.items.push(value);
            Ok(())
        } else {
            state.return_rejects += 1;
            Err(value)
        }
    }

    /// Gives up one unit of quota, evicting an item if the stack is full.
    pub fn decrement_max_count(&self) {
        let evicted = {
            let mut state = self.state.lock();
            if state.max_count == 0 {
                return;
            }
            let evicted = if state.items.len() == state.max_count {
                state.evictions += 1;
                state.items.pop()
            } else {
                None
            };
            state.max_count -= 1;
            evicted
        };
        // Dropped outside the lock
        drop(evicted);
    }

    /// Sets the quota, evicting items above it.
    pub fn set_max_count(&self, max_count: usize) {
        let evicted = {
            let mut state = self.state.lock();
            let excess = state.items.len().saturating_sub(max_count);
            state.evictions += excess as u64;
            let keep = state.items.len() - excess;
            let evicted = state.items.split_off(keep);
            state.max_count = max_count;
            evicted
        };
        drop(evicted);
    }

    /// Removes every pooled value. The quota is left as is.
    pub fn clear(&self) {
        let items = std::mem::take(&mut self.state.lock().items);
        drop(items);
    }

    /// Number of pooled values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the stack holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Current quota.
    #[must_use]
    pub fn max_count(&self) -> usize {
        self.state.lock().max_count
    }

    /// Reads every counter under a single lock hold.
    #[must_use]
    pub fn snapshot(&self) -> GlobalSnapshot {
        let state = self.state.lock();
        GlobalSnapshot {
            len: state.items.len(),
            max_count: state.max_count,
            takes: state.takes,
            take_hits: state.take_hits,
            returns: state.returns,
            return_rejects: state.return_rejects,
            evictions: state.evictions,
        }
    }
}
