//! Configuration for the coordination primitives.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of consecutive mismatches before a build is flagged bad.
pub const DEFAULT_RETRY_CEILING: u32 = 3;

/// Default time to wait for a delete callback (10 minutes).
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 600;

/// Default number of log lines requested per checksum query.
pub const DEFAULT_CHECKSUM_BATCH_SIZE: u32 = 10_000;

/// Knobs shared by the verification and deletion workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Consecutive mismatches before escalation. 0 and 1 escalate at once.
    pub retry_ceiling: u32,
    /// How long a deletion waits for its callback.
    pub callback_timeout: Duration,
    /// Batch size passed to the log store when computing a digest.
    pub checksum_batch_size: u32,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            retry_ceiling: DEFAULT_RETRY_CEILING,
            callback_timeout: Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS),
            checksum_batch_size: DEFAULT_CHECKSUM_BATCH_SIZE,
        }
    }
}

impl CoordinationConfig {
    /// Reject values the workers cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.callback_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "callback_timeout".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.checksum_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "checksum_batch_size".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
