//! Engine configuration.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Configuration for a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Number of parallel workers, and the upper bound on chunks.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
        }
    }
}

impl SyncConfig {
    /// Set the worker count.
    #[must_use]
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Connections a destination pool needs for this config: one per worker
    /// plus one spare.
    #[must_use]
    pub fn destination_pool_size(&self) -> u32 {
        u32::try_from(self.worker_count.saturating_add(1)).unwrap_or(u32::MAX)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.worker_count == 0 {
            return Err(SyncError::configuration("worker_count must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_default() {
        let config = SyncConfig::default();
        assert!(config.worker_count >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = SyncConfig::default().with_workers(0).validate().unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }));
    }

    #[test]
    fn test_destination_pool_size() {
        assert_eq!(SyncConfig::default().with_workers(8).destination_pool_size(), 9);
    }

    #[test]
    fn test_sync_config_deserialize_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SyncConfig::default());

        let config: SyncConfig = serde_json::from_str(r#"{"worker_count": 3}"#).unwrap();
        assert_eq!(config.worker_count, 3);
    }
}
