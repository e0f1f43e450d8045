use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the extract-and-publish pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Maximum number of records per published batch
    /// Default: 500
    #[serde(default = "default_write_threshold")]
    pub write_threshold: usize,

    /// Days subtracted from the start of the refresh range before querying,
    /// so rows updated late near the boundary are re-extracted.
    /// Default: 2
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u64,
}

fn default_write_threshold() -> usize {
    500
}

fn default_lookback_days() -> u64 {
    2
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            write_threshold: default_write_threshold(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_threshold(mut self, threshold: usize) -> Self {
        self.write_threshold = threshold;
        self
    }

    pub fn with_lookback_days(mut self, days: u64) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.write_threshold == 0 {
            return Err(BridgeError::Config(
                "write_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
