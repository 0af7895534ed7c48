//! # Affinity Pool
//!
//! Public face of the pool. Wires the three components together:
//!
//! ```text
//!  acquire ──▶ SlotTable::take_for ──hit──▶ value
//!                    │ miss
//!                    ▼
//!             PendingTracker::record_take ──▶ GlobalPool::take
//!
//!  release ──▶ SlotTable::return_for ──ok──▶ done
//!                    │ miss
//!                    ▼
//!             PendingTracker::record_return ──due──▶ SlotTable::promote
//!                    │                                     │ table full
//!                    ▼                                     ▼
//!             GlobalPool::put                     failure count ──▶ reset
//! ```
//!
//! ## Pool states
//!
//! - **Unsaturated**: free slots remain; busy threads get promoted.
//! - **Saturated**: every slot is bound; new candidates fail promotion.
//! - **Degraded**: failures pile up while the shared pool serves them.
//! - **Reset**: at the failure threshold every binding is dropped, the full
//!   quota goes back to the shared pool, and the thread that tripped the
//!   reset is promoted straight away.
//!
//! The shared pool is always a correct fallback, so poor promotion timing
//! only costs speed.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::global::GlobalPool;
use super::pending::PendingTracker;
use super::slots::SlotTable;
use crate::config::{PoolConfig, INITIAL_PENDING_ENTRIES};
use crate::error::PoolResult;
use crate::identity::{CurrentThread, IdentitySource, ThreadIdentity};
use crate::stats::PoolStats;

/// Bounded object pool with per-thread fast slots.
///
/// # Thread Safety
///
/// `AffinityPool<T>` is `Send + Sync` for `T: Send`; share it with `Arc`.
///
/// # Example
///
/// ```rust,ignore
/// let pool: AffinityPool<Vec<u8>> = AffinityPool::new(64)?;
///
/// let mut buf = pool.acquire_or_else(|| Vec::with_capacity(4096));
/// buf.clear();
/// // ... use buf ...
/// pool.release(buf);
/// ```
pub struct AffinityPool<T, I = CurrentThread> {
    config: PoolConfig,
    identity: I,
    slots: SlotTable<T>,
    pending: PendingTracker,
    global: GlobalPool<T>,
    /// Failures since the last reset.
    failures: AtomicU32,
    failures_total: AtomicU64,
    resets: AtomicU64,
}

impl<T> AffinityPool<T> {
    /// Creates a pool holding at most `max_count` values, keyed by OS thread.
    ///
    /// # Errors
    ///
    /// [`PoolError::ZeroCapacity`](crate::PoolError::ZeroCapacity) if
    /// `max_count` is zero.
    pub fn new(max_count: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::new(max_count))
    }

    /// Creates a pool from a full configuration, keyed by OS thread.
    ///
    /// # Errors
    ///
    /// Any error from [`PoolConfig::validate`].
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        Self::with_identity(config, CurrentThread)
    }
}

impl<T, I: IdentitySource> AffinityPool<T, I> {
    /// Creates a pool that resolves callers through `identity`.
    ///
    /// The processor count is read here, once.
    ///
    /// # Errors
    ///
    /// Any error from [`PoolConfig::validate`].
    pub fn with_identity(config: PoolConfig, identity: I) -> PoolResult<Self> {
        config.validate()?;

        let slot_len = config.slot_table_len();
        Ok(Self {
            identity,
            slots: SlotTable::new(slot_len),
            pending: PendingTracker::new(
                INITIAL_PENDING_ENTRIES,
                config.max_pending_entries,
                config.max_returns_before_promotion,
            ),
            global: GlobalPool::new(config.max_count),
            failures: AtomicU32::new(0),
            failures_total: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            config,
        })
    }

    /// Takes a pooled value.
    ///
    /// `None` means the caller allocates a fresh one. Callers without an
    /// identity always get `None`.
    #[inline]
    pub fn acquire(&self) -> Option<T> {
        let id = self.identity.current()?;

        if let Some(value) = self.slots.take_for(id) {
            return Some(value);
        }

        self.pending.record_take(id);
        self.global.take()
    }

    /// Takes a pooled value, or builds one with `create`.
    #[inline]
    pub fn acquire_or_else<F>(&self, create: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.acquire().unwrap_or_else(create)
    }

    /// Hands a value back to the pool.
    ///
    /// Returns `false` if the pool had no room; the value has been dropped.
    #[inline]
    pub fn release(&self, value: T) -> bool {
        self.try_release(value).is_ok()
    }

    /// Hands a value back to the pool.
    ///
    /// # Errors
    ///
    /// Gives the value back if the pool had no room or the caller has no
    /// identity, so the caller can dispose of it.
    pub fn try_release(&self, value: T) -> Result<(), T> {
        let Some(id) = self.identity.current() else {
            return Err(value);
        };

        let value = match self.slots.return_for(id, value) {
            Ok(()) => return Ok(()),
            Err(value) => value,
        };

        if self.pending.record_return(id) && !self.slots.promote(id, &self.global) {
            self.handle_promotion_failure(id);
        }

        self.global.put(value)
    }

    /// Drops every pooled value. Thread bindings are kept.
    pub fn clear(&self) {
        self.slots.clear_values();
        self.global.clear();
        tracing::debug!("Pool cleared");
    }

    fn handle_promotion_failure(&self, id: ThreadIdentity) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);

        // Exactly one caller sees the threshold value
        let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures != self.config.max_promotion_failures {
            return;
        }

        tracing::warn!(
            "{} promotion failures, resetting {} thread slots",
            failures,
            self.slots.len()
        );

        self.slots.reset(&self.global, self.config.max_count);
        self.pending.reset();
        self.failures.store(0, Ordering::Release);
        self.resets.fetch_add(1, Ordering::Relaxed);

        if !self.slots.promote(id, &self.global) {
            tracing::warn!("Thread {} not promoted after reset: no slots", id.get());
        }
    }

    /// Whether `id` owns a fast slot.
    #[must_use]
    pub fn is_promoted(&self, id: ThreadIdentity) -> bool {
        self.slots.is_promoted(id)
    }

    /// Threads that own a fast slot, in promotion order.
    #[must_use]
    pub fn promoted_threads(&self) -> Vec<ThreadIdentity> {
        self.slots.owners()
    }

    /// Configured total quota.
    #[inline]
    #[must_use]
    pub fn max_count(&self) -> usize {
        self.config.max_count
    }

    /// Configuration the pool was built with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Reads the current state and counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let global = self.global.snapshot();
        PoolStats {
            max_count: self.config.max_count,
            slot_table_len: self.slots.len(),
            promoted_threads: self.slots.promoted(),
            slot_values: self.slots.value_count(),
            global_len: global.len,
            global_capacity: global.max_count,
            global_takes: global.takes,
            global_take_hits: global.take_hits,
            global_returns: global.returns,
            global_return_rejects: global.return_rejects,
            evictions: global.evictions,
            promotions: self.slots.promotions(),
            promotion_failures: self.failures_total.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }
}

impl<T, I> std::fmt::Debug for AffinityPool<T, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityPool")
            .field("max_count", &self.config.max_count)
            .field("slot_table_len", &self.slots.len())
            .field("promoted_threads", &self.slots.promoted())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoolError;
    use crate::identity::Untracked;
    use std::sync::Arc;

    /// Identity source whose answer the test sets, so one OS thread can act
    /// as several pool callers. Zero means no identity.
    #[derive(Clone, Default)]
    struct Scripted(Arc<AtomicU64>);

    impl Scripted {
        fn act_as(&self, raw: u64) {
            self.0.store(raw, Ordering::Relaxed);
        }
    }

    impl IdentitySource for Scripted {
        fn current(&self) -> Option<ThreadIdentity> {
            ThreadIdentity::from_raw(self.0.load(Ordering::Relaxed))
        }
    }

    fn id(raw: u64) -> ThreadIdentity {
        ThreadIdentity::from_raw(raw).unwrap()
    }

    fn scripted_pool(config: PoolConfig) -> (AffinityPool<u32, Scripted>, Scripted) {
        let who = Scripted::default();
        let pool = AffinityPool::with_identity(config, who.clone()).unwrap();
        (pool, who)
    }

    /// Acquire once, then `rounds` release-then-acquire round trips.
    fn round_trips(pool: &AffinityPool<u32, Scripted>, rounds: usize) {
        let mut value = pool.acquire_or_else(|| 0);
        for _ in 0..rounds {
            pool.release(value);
            value = pool.acquire_or_else(|| 0);
        }
    }

    #[test]
    fn test_zero_capacity_is_an_error() {
        let err = AffinityPool::<u32>::new(0).unwrap_err();
        assert_eq!(err, PoolError::ZeroCapacity);
    }

    #[test]
    fn test_single_item_pool() {
        let (pool, who) = scripted_pool(PoolConfig::new(1).with_processor_count(1));
        who.act_as(1);

        assert!(pool.release(10));
        assert!(!pool.release(11));
        assert_eq!(pool.acquire(), Some(10));
        assert_eq!(pool.acquire(), None);
    }

    #[test]
    fn test_untracked_caller_bypasses_pool() {
        let pool: AffinityPool<u32, Untracked> =
            AffinityPool::with_identity(PoolConfig::new(4), Untracked).unwrap();

        assert!(!pool.release(1));
        assert_eq!(pool.try_release(2), Err(2));
        assert_eq!(pool.acquire(), None);
        assert_eq!(pool.stats().global_returns, 0);
    }

    #[test]
    fn test_untracked_caller_ignores_pooled_values() {
        let (pool, who) = scripted_pool(PoolConfig::new(4).with_processor_count(2));
        who.act_as(1);
        assert!(pool.release(10));
        assert!(pool.release(11));

        who.act_as(0);
        assert_eq!(pool.acquire(), None);
        assert_eq!(pool.acquire(), None);
        assert_eq!(pool.stats().global_len, 2);
    }

    #[test]
    fn test_promotion_after_threshold() {
        let (pool, who) = scripted_pool(PoolConfig::new(4).with_processor_count(2));
        who.act_as(7);

        round_trips(&pool, 63);
        assert!(!pool.is_promoted(id(7)));
        assert_eq!(pool.stats().global_capacity, 4);

        round_trips(&pool, 1);
        let stats = pool.stats();
        assert_eq!(pool.promoted_threads(), vec![id(7)]);
        assert_eq!(stats.global_capacity, 3);
        assert_eq!(stats.promotions, 1);
        assert!(stats.quota_balanced());
    }

    #[test]
    fn test_fast_path_skips_global_pool() {
        let mut config = PoolConfig::new(4).with_processor_count(2);
        config.max_returns_before_promotion = 2;
        let (pool, who) = scripted_pool(config);
        who.act_as(3);
        round_trips(&pool, 2);
        assert!(pool.is_promoted(id(3)));

        let before = pool.stats();
        assert!(pool.release(99));
        assert_eq!(pool.acquire(), Some(99));
        let after = pool.stats();

        assert_eq!(after.global_takes, before.global_takes);
        assert_eq!(after.global_returns, before.global_returns);
    }

    #[test]
    fn test_full_slot_falls_back_to_global() {
        let mut config = PoolConfig::new(4).with_processor_count(2);
        config.max_returns_before_promotion = 1;
        let (pool, who) = scripted_pool(config);
        who.act_as(3);
        round_trips(&pool, 1);
        assert!(pool.is_promoted(id(3)));
        let _ = pool.acquire();

        assert!(pool.release(1));
        assert!(pool.release(2));
        let stats = pool.stats();
        assert_eq!(stats.slot_values, 1);
        assert_eq!(stats.global_len, 1);

        assert_eq!(pool.acquire(), Some(1));
        assert_eq!(pool.acquire(), Some(2));
    }

    #[test]
    fn test_reset_after_repeated_failures() {
        let mut config = PoolConfig::new(2).with_processor_count(0);
        config.max_returns_before_promotion = 4;
        config.max_promotion_failures = 3;
        let (pool, who) = scripted_pool(config);

        for raw in [1, 2] {
            who.act_as(raw);
            round_trips(&pool, 4);
        }
        assert_eq!(pool.promoted_threads(), vec![id(1), id(2)]);
        assert_eq!(pool.stats().global_capacity, 0);

        // Two failures: degraded, not yet reset
        who.act_as(3);
        round_trips(&pool, 8);
        let stats = pool.stats();
        assert_eq!(stats.promotion_failures, 2);
        assert_eq!(stats.resets, 0);
        assert!(!pool.is_promoted(id(3)));

        // Third failure trips the reset and promotes the caller
        round_trips(&pool, 4);
        let stats = pool.stats();
        assert_eq!(stats.resets, 1);
        assert_eq!(pool.promoted_threads(), vec![id(3)]);
        assert_eq!(stats.global_capacity, 1);
        assert!(stats.quota_balanced());
        assert!(stats.within_quota());
    }

    #[test]
    fn test_failures_are_pool_wide() {
        let mut config = PoolConfig::new(1).with_processor_count(0);
        config.max_returns_before_promotion = 1;
        config.max_promotion_failures = 2;
        let (pool, who) = scripted_pool(config);

        who.act_as(1);
        round_trips(&pool, 1);
        assert!(pool.is_promoted(id(1)));

        who.act_as(2);
        round_trips(&pool, 1);
        who.act_as(3);
        round_trips(&pool, 1);

        assert_eq!(pool.stats().resets, 1);
        assert_eq!(pool.promoted_threads(), vec![id(3)]);
    }

    #[test]
    fn test_clear_drops_values_keeps_bindings() {
        let mut config = PoolConfig::new(4).with_processor_count(2);
        config.max_returns_before_promotion = 1;
        let (pool, who) = scripted_pool(config);
        who.act_as(5);
        round_trips(&pool, 1);
        assert!(pool.release(1));
        assert!(pool.release(2));

        pool.clear();

        let stats = pool.stats();
        assert_eq!(stats.quota_in_use(), 0);
        assert!(pool.is_promoted(id(5)));
        assert_eq!(pool.acquire(), None);
    }
}
