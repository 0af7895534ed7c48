//! # Per-Thread Slot Table
//!
//! Fixed-length table of single-value slots, each bound to one thread.
//!
//! ```text
//!   assigned = 3
//!   ┌────────┬────────┬────────┬────────┬────────┐
//!   │ T#4    │ T#9    │ T#2    │  free  │  free  │
//!   │ Some(x)│ None   │ Some(y)│        │        │
//!   └────────┴────────┴────────┴────────┴────────┘
//!        owner thread only ──▶ try_lock, never waits
//! ```
//!
//! Slots are bound in order and only ever unbound all at once by
//! [`SlotTable::reset`]. A thread that exits keeps its slot (and one unit of
//! quota) until the next reset.
//!
//! ## Locking
//!
//! - Binding a slot takes the table lock.
//! - The owner reaches its value through a per-slot lock it only
//!   `try_lock`s. Nobody else touches that lock outside a reset or a
//!   clear, so in steady state it is an uncontended compare-and-swap.
//! - The owner re-checks the binding while holding the slot lock. A reset
//!   unbinds under the same lock, so a stale owner can never write into a
//!   slot that has been handed to another thread.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::global::GlobalPool;
use crate::identity::ThreadIdentity;

/// Raw owner value of a slot nobody is bound to.
const UNBOUND: u64 = 0;

struct Slot<T> {
    /// Raw [`ThreadIdentity`] of the bound thread, or `UNBOUND`.
    owner: AtomicU64,
    value: Mutex<Option<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            owner: AtomicU64::new(UNBOUND),
            value: Mutex::new(None),
        }
    }

    #[inline]
    fn owner(&self) -> Option<ThreadIdentity> {
        ThreadIdentity::from_raw(self.owner.load(Ordering::Acquire))
    }

    #[inline]
    fn is_owned_by(&self, id: ThreadIdentity) -> bool {
        self.owner.load(Ordering::Acquire) == id.get()
    }
}

/// Fixed-length table of per-thread slots.
pub struct SlotTable<T> {
    slots: Box<[Slot<T>]>,
    /// Length of the bound prefix of `slots`.
    assigned: AtomicUsize,
    /// Serializes binding and reset.
    bind_lock: Mutex<()>,
    promotions: AtomicU64,
}

impl<T> SlotTable<T> {
    /// Creates a table of `len` unbound slots.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| Slot::new()).collect(),
            assigned: AtomicUsize::new(0),
            bind_lock: Mutex::new(()),
            promotions: AtomicU64::new(0),
        }
    }

    /// Total number of slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no slots at all.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots bound to a thread.
    #[inline]
    #[must_use]
    pub fn promoted(&self) -> usize {
        self.assigned.load(Ordering::Acquire)
    }

    /// Successful new bindings since construction.
    #[must_use]
    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    #[inline]
    fn bound(&self) -> &[Slot<T>] {
        // `assigned` never exceeds the table length
        &self.slots[..self.promoted()]
    }

    #[inline]
    fn find(&self, id: ThreadIdentity) -> Option<&Slot<T>> {
        self.bound().iter().find(|slot| slot.is_owned_by(id))
    }

    /// Whether `id` is bound to a slot.
    #[must_use]
    pub fn is_promoted(&self, id: ThreadIdentity) -> bool {
        self.find(id).is_some()
    }

    /// Takes the value out of `id`'s slot.
    ///
    /// `None` if `id` has no slot, the slot is empty, or the slot is busy
    /// with a reset.
    #[inline]
    pub fn take_for(&self, id: ThreadIdentity) -> Option<T> {
        let slot = self.find(id)?;
        let mut value = slot.value.try_lock()?;
        if !slot.is_owned_by(id) {
            return None;
        }
        value.take()
    }

    /// Stores `value` in `id`'s slot.
    ///
    /// # Errors
    ///
    /// Hands the value back if `id` has no slot or its slot is already full.
    #[inline]
    pub fn return_for(&self, id: ThreadIdentity, value: T) -> Result<(), T> {
        let Some(slot) = self.find(id) else {
            return Err(value);
        };
        let Some(mut cell) = slot.value.try_lock() else {
            return Err(value);
        };
        if cell.is_some() || !slot.is_owned_by(id) {
            return Err(value);
        }
        *cell = Some(value);
        Ok(())
    }

    /// Binds `id` to the next free slot, funded by one unit of `global`'s quota.
    ///
    /// Returns `true` if `id` is bound afterwards, including when it already
    /// was. Returns `false` only when every slot is taken.
    pub fn promote(&self, id: ThreadIdentity, global: &GlobalPool<T>) -> bool {
        let _guard = self.bind_lock.lock();

        if self.is_promoted(id) {
            return true;
        }

        let index = self.promoted();
        let Some(slot) = self.slots.get(index) else {
            return false;
        };

        global.decrement_max_count();
        slot.owner.store(id.get(), Ordering::Release);
        self.assigned.store(index + 1, Ordering::Release);
        self.promotions.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            "Promoted thread {} to slot {} (shared quota now {})",
            id.get(),
            index,
            global.max_count()
        );
        true
    }

    /// Unbinds every slot, drops their values, and restores `global` to
    /// `max_count`.
    pub fn reset(&self, global: &GlobalPool<T>, max_count: usize) {
        let _guard = self.bind_lock.lock();

        self.assigned.store(0, Ordering::Release);
        for slot in self.slots.iter() {
            let stale = {
                let mut cell = slot.value.lock();
                slot.owner.store(UNBOUND, Ordering::Release);
                cell.take()
            };
            drop(stale);
        }
        global.set_max_count(max_count);
    }

    /// Drops every slot value. Bindings are kept.
    pub fn clear_values(&self) {
        for slot in self.bound() {
            let stale = slot.value.lock().take();
            drop(stale);
        }
    }

    /// Number of slots currently holding a value.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value.lock().is_some())
            .count()
    }

    /// Bound threads, in binding order.
    #[must_use]
    pub fn owners(&self) -> Vec<ThreadIdentity> {
        self.bound().iter().filter_map(Slot::owner).collect()
    }
}
