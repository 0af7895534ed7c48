//! # Pool Configuration
//!
//! Tunables are read once when the pool is built. Defaults match the
//! promotion heuristics the pool was tuned with; most callers only set
//! `max_count`.
//!
//! ```toml
//! max_count = 64
//! processor_count = 8
//! max_returns_before_promotion = 32
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};
use crate::identity;

/// Slots granted per processor on top of the processor count itself.
pub const MAX_THREAD_ITEMS_PER_PROCESSOR: usize = 16;

/// Hard cap on the pending-promotion table.
pub const MAX_PENDING_ENTRIES: usize = 128;

/// Returns a thread must make through the shared pool before promotion.
pub const MAX_RETURNS_BEFORE_PROMOTION: u32 = 64;

/// Cumulative promotion failures that trigger a full reset.
pub const MAX_PROMOTION_FAILURES: u32 = 64;

/// Size of a freshly allocated pending-promotion table.
pub const INITIAL_PENDING_ENTRIES: usize = 8;

/// Configuration for an [`AffinityPool`](crate::AffinityPool).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Total quota shared between the global stack and promoted slots.
    pub max_count: usize,
    /// Processor count override. `None` asks the OS once at construction.
    pub processor_count: Option<usize>,
    /// Extra slot-table entries on top of the processor count.
    pub max_thread_items_per_processor: usize,
    /// Upper bound on tracked promotion candidates.
    pub max_pending_entries: usize,
    /// Shared-pool returns that earn a thread its own slot.
    pub max_returns_before_promotion: u32,
    /// Pool-wide promotion failures before the slot table is reset.
    pub max_promotion_failures: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_count: 0,
            processor_count: None,
            max_thread_items_per_processor: MAX_THREAD_ITEMS_PER_PROCESSOR,
            max_pending_entries: MAX_PENDING_ENTRIES,
            max_returns_before_promotion: MAX_RETURNS_BEFORE_PROMOTION,
            max_promotion_failures: MAX_PROMOTION_FAILURES,
        }
    }
}

impl PoolConfig {
    /// Config with the given quota and default heuristics.
    #[must_use]
    pub fn new(max_count: usize) -> Self {
        Self {
            max_count,
            ..Self::default()
        }
    }

    /// Pins the processor count instead of querying the OS.
    #[must_use]
    pub fn with_processor_count(mut self, processors: usize) -> Self {
        self.processor_count = Some(processors);
        self
    }

    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigParse`] if the text is not valid TOML or
    /// a field has the wrong type.
    pub fn from_toml_str(text: &str) -> PoolResult<Self> {
        toml::from_str(text).map_err(|e| PoolError::ConfigParse(e.to_string()))
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigIo`] if the file cannot be read, or
    /// [`PoolError::ConfigParse`] if its contents do not parse.
    pub fn from_toml_file(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PoolError::ConfigIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every tunable.
    ///
    /// # Errors
    ///
    /// [`PoolError::ZeroCapacity`] when `max_count` is zero, otherwise
    /// [`PoolError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_count == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        if self.max_pending_entries == 0 {
            return Err(PoolError::InvalidConfig(
                "max_pending_entries must be greater than zero".into(),
            ));
        }
        if self.max_returns_before_promotion == 0 {
            return Err(PoolError::InvalidConfig(
                "max_returns_before_promotion must be greater than zero".into(),
            ));
        }
        if self.max_promotion_failures == 0 {
            return Err(PoolError::InvalidConfig(
                "max_promotion_failures must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Processor count used to size the slot table.
    #[must_use]
    pub fn resolved_processor_count(&self) -> usize {
        self.processor_count.unwrap_or_else(identity::processor_count)
    }

    /// Number of per-thread slots the pool will allocate.
    #[must_use]
    pub fn slot_table_len(&self) -> usize {
        self.max_count.min(
            self.max_thread_items_per_processor
                .saturating_add(self.resolved_processor_count()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::new(32);
        assert_eq!(config.max_count, 32);
        assert_eq!(config.max_thread_items_per_processor, 16);
        assert_eq!(config.max_pending_entries, 128);
        assert_eq!(config.max_returns_before_promotion, 64);
        assert_eq!(config.max_promotion_failures, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(PoolConfig::new(0).validate(), Err(PoolError::ZeroCapacity));
    }

    #[test]
    fn test_zero_thresholds_rejected() {
        let mut config = PoolConfig::new(4);
        config.max_returns_before_promotion = 0;
        assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));

        let mut config = PoolConfig::new(4);
        config.max_promotion_failures = 0;
        assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));

        let mut config = PoolConfig::new(4);
        config.max_pending_entries = 0;
        assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_slot_table_len() {
        // min(4, 16 + 2)
        assert_eq!(PoolConfig::new(4).with_processor_count(2).slot_table_len(), 4);
        // min(100, 16 + 8)
        assert_eq!(PoolConfig::new(100).with_processor_count(8).slot_table_len(), 24);
    }

    #[test]
    fn test_from_toml() {
        let config = PoolConfig::from_toml_str(
            "max_count = 10\nprocessor_count = 2\nmax_returns_before_promotion = 8\n",
        )
        .unwrap();
        assert_eq!(config.max_count, 10);
        assert_eq!(config.processor_count, Some(2));
        assert_eq!(config.max_returns_before_promotion, 8);
        // Unset fields keep their defaults
        assert_eq!(config.max_promotion_failures, 64);
    }

    #[test]
    fn test_from_toml_bad_type() {
        let err = PoolConfig::from_toml_str("max_count = \"lots\"").unwrap_err();
        assert!(matches!(err, PoolError::ConfigParse(_)));
    }

    #[test]
    fn test_from_toml_missing_file() {
        let path = std::env::temp_dir().join("tether_pool_no_such_config.toml");
        let err = PoolConfig::from_toml_file(&path).unwrap_err();
        assert!(matches!(err, PoolError::ConfigIo { .. }));
    }
}
