//! # TETHER Pool
//!
//! Bounded object pool for values that are expensive to build and cheap to
//! reuse, shared by many worker threads.
//!
//! Threads that keep returning values are promoted to a private slot they
//! reach without contention. Everyone else, and promoted threads whose
//! slot is already full, fall back to a small mutex-protected stack.
//!
//! ## Architecture Rules
//!
//! 1. **Fixed quota** - The pool never holds more than `max_count` values
//! 2. **Quiet fast path** - A promoted thread's round trip touches only its own slot
//! 3. **Misses are not errors** - `acquire` may return `None`, `release` may refuse
//!
//! ## Example
//!
//! ```rust,ignore
//! use tether_pool::AffinityPool;
//!
//! let pool: AffinityPool<Vec<u8>> = AffinityPool::new(64)?;
//!
//! let mut buf = pool.acquire_or_else(Vec::new);
//! buf.extend_from_slice(b"frame");
//! buf.clear();
//! pool.release(buf);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod identity;
pub mod pool;
pub mod stats;

pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use identity::{CurrentThread, IdentitySource, ThreadIdentity, Untracked};
pub use pool::AffinityPool;
pub use stats::PoolStats;
