//! # Pool Components
//!
//! The shared stack, the per-thread slot table, the promotion tracker, and
//! the [`AffinityPool`] that drives them.
//!
//! ## Quota
//!
//! The configured `max_count` is split between the shared stack and the
//! promoted slots. Each promotion moves one unit from the stack to a slot;
//! a reset moves everything back. At rest:
//!
//! ```text
//! values in slots + values in stack <= max_count
//! stack quota + promoted threads    == max_count
//! ```

mod affinity;
pub mod global;
pub mod pending;
pub mod slots;

pub use affinity::AffinityPool;
pub use global::{GlobalPool, GlobalSnapshot};
pub use pending::PendingTracker;
pub use slots::SlotTable;
