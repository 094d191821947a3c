//! Retry policy for whole fetch attempts

use crate::throttle::DelayRange;
use serde::{Deserialize, Serialize};

/// How often, and how patiently, an item is retried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per item, first one included
    pub max_attempts: u32,

    /// Pause between attempts
    pub backoff: DelayRange,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: DelayRange::from_secs(2, 5),
        }
    }
}

impl RetryPolicy {
    /// Policy with no backoff delay
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: DelayRange::zero(),
        }
    }

    /// Whether another attempt follows a failed `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32, transient: bool) -> bool {
        transient && attempt < self.max_attempts
    }

    /// Check the policy
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        self.backoff.validate().map_err(|e| format!("backoff: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, DelayRange::new(2000, 5000));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::immediate(3);
        assert!(policy.should_retry(1, true));
        assert!(policy.should_retry(2, true));
        assert!(!policy.should_retry(3, true));
        assert!(!policy.should_retry(1, false));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(RetryPolicy::immediate(0).validate().is_err());
    }
}
