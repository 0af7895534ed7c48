//! # Thread Identity
//!
//! The pool keys its fast slots by a stable, opaque per-thread identity.
//! Identities are handed out from a process-wide counter the first time a
//! thread asks, and are never reused, so a slot bound to a thread that has
//! exited can never be claimed by a newer thread with a recycled id.
//!
//! "No identity" is `None`, not a reserved integer. Callers without an
//! identity bypass pooling entirely.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Next identity to hand out. Starts at 1 so every id fits a `NonZeroU64`.
static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Option<ThreadIdentity> = ThreadIdentity::allocate();
}

/// Opaque identity of a thread, comparable for equality only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ThreadIdentity(NonZeroU64);

impl ThreadIdentity {
    fn allocate() -> Option<Self> {
        // Never wrap: a recycled id could bind two threads to one slot.
        NEXT_IDENTITY
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .ok()
            .and_then(NonZeroU64::new)
            .map(Self)
    }

    /// Identity built from a raw value. Zero has no identity.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Raw value, never zero.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Identity of the calling thread, if it still has one.
    ///
    /// Returns `None` while the thread's locals are being torn down.
    #[inline]
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.try_with(|id| *id).ok().flatten()
    }
}

/// Source of the caller's identity, consulted on every pool call.
pub trait IdentitySource: Send + Sync {
    /// Identity of the calling thread, or `None` for an untracked caller.
    fn current(&self) -> Option<ThreadIdentity>;
}

/// Identity of the OS thread making the call.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentThread;

impl IdentitySource for CurrentThread {
    #[inline]
    fn current(&self) -> Option<ThreadIdentity> {
        ThreadIdentity::current()
    }
}

/// Source that never resolves an identity. Every call misses.
#[derive(Clone, Copy, Debug, Default)]
pub struct Untracked;

impl IdentitySource for Untracked {
    #[inline]
    fn current(&self) -> Option<ThreadIdentity> {
        None
    }
}

/// Number of processors available to this process, at least 1.
#[must_use]
pub fn processor_count() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
