//! Configuration for the fetch engine

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds on waiting for the site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Page navigation bound (ms)
    pub navigation_ms: u64,

    /// Readiness selector bound (ms)
    pub selector_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            selector_ms: 15_000,
        }
    }
}

impl Timeouts {
    /// Navigation bound as a Duration
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    /// Selector bound as a Duration
    pub fn selector(&self) -> Duration {
        Duration::from_millis(self.selector_ms)
    }
}

/// Configuration for the [`FetchEngine`](crate::FetchEngine)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Per-item retry policy
    pub retry: RetryPolicy,

    /// Navigation and selector bounds
    pub timeouts: Timeouts,
}

impl ExtractorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.retry.validate()?;
        if self.timeouts.navigation_ms == 0 {
            return Err("navigation_ms must be greater than 0".to_string());
        }
        if self.timeouts.selector_ms == 0 {
            return Err("selector_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}
