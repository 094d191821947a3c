//! Randomized pacing between browser actions
//!
//! Each worker owns its own [`RateLimiter`]; limiters are not synchronized
//! with each other.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Inclusive range of milliseconds a delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    /// Lower bound (ms)
    pub min_ms: u64,
    /// Upper bound (ms)
    pub max_ms: u64,
}

impl DelayRange {
    /// Range in milliseconds
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Range in whole seconds
    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self::new(min * 1000, max * 1000)
    }

    /// No delay at all
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Check `min_ms <= max_ms`
    pub fn validate(&self) -> Result<(), String> {
        if self.min_ms > self.max_ms {
            return Err(format!(
                "delay min_ms ({}) exceeds max_ms ({})",
                self.min_ms, self.max_ms
            ));
        }
        Ok(())
    }

    /// Draw a delay uniformly from the range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (low, high) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        Duration::from_millis(rng.gen_range(low..=high))
    }
}

/// Point in the fetch sequence a delay belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayStage {
    /// Before navigating to a page
    PreNavigation,
    /// After the page is ready, before reading it
    PostLoad,
    /// After an item, before the worker takes the next one
    BetweenItems,
}

/// Delay ranges per stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    /// Before each navigation
    pub pre_navigation: DelayRange,
    /// After each page load
    pub post_load: DelayRange,
    /// Between two items on the same worker
    pub between_items: DelayRange,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            pre_navigation: DelayRange::from_secs(3, 7),
            post_load: DelayRange::from_secs(4, 8),
            between_items: DelayRange::from_secs(3, 7),
        }
    }
}

impl DelayConfig {
    /// All delays zero (tests and dry runs)
    pub fn none() -> Self {
        Self {
            pre_navigation: DelayRange::zero(),
            post_load: DelayRange::zero(),
            between_items: DelayRange::zero(),
        }
    }

    /// Range configured for `stage`
    pub fn range(&self, stage: DelayStage) -> DelayRange {
        match stage {
            DelayStage::PreNavigation => self.pre_navigation,
            DelayStage::PostLoad => self.post_load,
            DelayStage::BetweenItems => self.between_items,
        }
    }

    /// Validate every range
    pub fn validate(&self) -> Result<(), String> {
        self.pre_navigation
            .validate()
            .map_err(|e| format!("pre_navigation: {}", e))?;
        self.post_load
            .validate()
            .map_err(|e| format!("post_load: {}", e))?;
        self.between_items
            .validate()
            .map_err(|e| format!("between_items: {}", e))?;
        Ok(())
    }
}

/// Per-worker pacing
pub struct RateLimiter {
    delays: DelayConfig,
    rng: StdRng,
}

impl RateLimiter {
    /// Limiter seeded from the OS
    pub fn new(delays: DelayConfig) -> Self {
        Self {
            delays,
            rng: StdRng::from_entropy(),
        }
    }

    /// Limiter with a fixed seed, for reproducible runs
    pub fn seeded(delays: DelayConfig, seed: u64) -> Self {
        Self {
            delays,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Configured delays
    pub fn delays(&self) -> &DelayConfig {
        &self.delays
    }

    /// Draw the next delay for `stage` without sleeping
    pub fn sample(&mut self, stage: DelayStage) -> Duration {
        self.delays.range(stage).sample(&mut self.rng)
    }

    /// Sleep a delay drawn for `stage` and return it
    pub async fn pause(&mut self, stage: DelayStage) -> Duration {
        let range = self.delays.range(stage);
        let delay = self.pause_within(range).await;
        debug!("{:?} pause of {} ms", stage, delay.as_millis());
        delay
    }

    /// Sleep a delay drawn from an arbitrary range and return it
    pub async fn pause_within(&mut self, range: DelayRange) -> Duration {
        let delay = range.sample(&mut self.rng);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }
}
