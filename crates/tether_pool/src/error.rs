//! # Pool Error Types
//!
//! Construction and configuration errors. Steady-state pool traffic never
//! produces these: a miss is an `Option`, a rejected release is a `bool`.

use thiserror::Error;

/// Errors that can occur while building a pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool was configured with a total quota of zero.
    #[error("pool capacity must be greater than zero")]
    ZeroCapacity,

    /// A tunable is outside its accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file could not be read.
    #[error("failed to read config {path}: {reason}")]
    ConfigIo {
        /// Path that was being read.
        path: String,
        /// Underlying IO failure.
        reason: String,
    },

    /// Configuration text is not valid TOML for `PoolConfig`.
    #[error("failed to parse config: {0}")]
    ConfigParse(String),
}

/// Result type for pool construction.
pub type PoolResult<T> = Result<T, PoolError>;
