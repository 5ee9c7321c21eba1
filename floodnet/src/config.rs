//! Per-node protocol configuration.
//!
//! All values are fixed when a node is constructed and never change during a
//! run. Defaults follow the reference sensor deployment: a 10-entry history,
//! a hop ceiling of 3, and origination every 0.1 to 1.0 time units.
//!
//! # Example
//!
//! ```
//! use floodnet::{Duration, EngineConfig};
//!
//! let config = EngineConfig::default()
//!     .with_max_hop_count(5)
//!     .with_history_capacity(32)
//!     .with_origination_delay(Duration::from_millis(200), Duration::from_millis(400));
//!
//! assert!(config.validate().is_ok());
//! assert!(EngineConfig::default().with_history_capacity(0).validate().is_err());
//! ```

use crate::error::ConfigError;
use crate::time::Duration;
use crate::types::{
    DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_HOP_COUNT, ORIGINATION_DELAY_MAX, ORIGINATION_DELAY_MIN,
};

/// Protocol parameters for a sensor or sink node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Size of the duplicate-detection window.
    pub history_capacity: usize,
    /// Hard hop ceiling; arrivals at or above it are dropped.
    pub max_hop_count: u8,
    /// Shortest delay between originations.
    pub origination_delay_min: Duration,
    /// Longest delay between originations (inclusive).
    pub origination_delay_max: Duration,
    /// Record a node's own packets in its history when it originates them,
    /// so a copy that loops back is dropped as a duplicate.
    pub record_own_packets: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_hop_count: DEFAULT_MAX_HOP_COUNT,
            origination_delay_min: ORIGINATION_DELAY_MIN,
            origination_delay_max: ORIGINATION_DELAY_MAX,
            record_own_packets: true,
        }
    }
}

impl EngineConfig {
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_max_hop_count(mut self, max_hop_count: u8) -> Self {
        self.max_hop_count = max_hop_count;
        self
    }

    pub fn with_origination_delay(mut self, min: Duration, max: Duration) -> Self {
        self.origination_delay_min = min;
        self.origination_delay_max = max;
        self
    }

    pub fn with_record_own_packets(mut self, record: bool) -> Self {
        self.record_own_packets = record;
        self
    }

    /// Reject values the protocol cannot run with.
    ///
    /// A hop ceiling of zero is allowed: such a node drops everything it
    /// receives and only originates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidHistoryCapacity);
        }
        if self.origination_delay_min > self.origination_delay_max
            || self.origination_delay_max == Duration::ZERO
        {
            return Err(ConfigError::InvalidDelayWindow {
                min_ms: self.origination_delay_min.as_millis(),
                max_ms: self.origination_delay_max.as_millis(),
            });
        }
        Ok(())
    }
}
