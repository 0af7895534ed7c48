//! # Pool Statistics
//!
//! Point-in-time view of an [`AffinityPool`](crate::AffinityPool). Every
//! counter here is maintained on the slow path only; the fast path updates
//! nothing shared.

/// Snapshot of pool state and slow-path counters.
///
/// Fields are read one component at a time, so a snapshot taken while other
/// threads are active is not atomic across components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Configured total quota.
    pub max_count: usize,
    /// Number of per-thread slots.
    pub slot_table_len: usize,
    /// Threads currently bound to a slot.
    pub promoted_threads: usize,
    /// Slots currently holding a value.
    pub slot_values: usize,
    /// Values in the shared stack.
    pub global_len: usize,
    /// Current quota of the shared stack.
    pub global_capacity: usize,
    /// Shared-stack take attempts.
    pub global_takes: u64,
    /// Shared-stack takes that produced a value.
    pub global_take_hits: u64,
    /// Shared-stack return attempts.
    pub global_returns: u64,
    /// Shared-stack returns rejected because it was full.
    pub global_return_rejects: u64,
    /// Values dropped from the shared stack to fund a promotion or reset.
    pub evictions: u64,
    /// Successful new promotions.
    pub promotions: u64,
    /// Promotions refused because every slot was taken.
    pub promotion_failures: u64,
    /// Full resets of the slot table.
    pub resets: u64,
}

impl PoolStats {
    /// Values held by the pool, in slots and in the shared stack.
    #[inline]
    #[must_use]
    pub const fn quota_in_use(&self) -> usize {
        self.slot_values + self.global_len
    }

    /// Whether the held values fit the configured quota.
    #[inline]
    #[must_use]
    pub const fn within_quota(&self) -> bool {
        self.quota_in_use() <= self.max_count
    }

    /// Whether the shared quota matches the promoted-thread count.
    #[inline]
    #[must_use]
    pub const fn quota_balanced(&self) -> bool {
        self.global_capacity + self.promoted_threads == self.max_count
    }
}
