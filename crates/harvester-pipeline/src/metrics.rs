//! Metrics collected during a run

use std::collections::BTreeMap;
use std::time::Duration;

/// Counters for one run
///
/// Workers fold their counts in as items finish; the distributor merges
/// the per-worker copies at the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    /// Items committed to the output
    pub succeeded: usize,

    /// Items that exhausted their attempts
    pub failed: usize,

    /// Items skipped because the checkpoint already held them
    pub skipped: usize,

    /// Committed items that yielded no field at all
    pub empty: usize,

    /// Fetch attempts across all items
    pub attempts: u64,

    /// How often each field was extracted
    pub fields: BTreeMap<String, usize>,

    /// Wall-clock runtime
    pub runtime: Duration,
}

impl RunMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed item and the fields it carried
    pub fn record_success<'a>(&mut self, attempts: u32, fields: impl IntoIterator<Item = &'a str>) {
        self.succeeded += 1;
        self.attempts += u64::from(attempts);

        let mut any = false;
        for name in fields {
            any = true;
            *self.fields.entry(name.to_string()).or_insert(0) += 1;
        }
        if !any {
            self.empty += 1;
        }
    }

    /// Record an item that gave up
    pub fn record_failure(&mut self, attempts: u32) {
        self.failed += 1;
        self.attempts += u64::from(attempts);
    }

    /// Record keys skipped at load time
    pub fn record_skipped(&mut self, count: usize) {
        self.skipped += count;
    }

    /// Items that reached a terminal state this run
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Fold another worker's counters into these
    pub fn merge(&mut self, other: &RunMetrics) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.empty += other.empty;
        self.attempts += other.attempts;
        for (name, count) in &other.fields {
            *self.fields.entry(name.clone()).or_insert(0) += count;
        }
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Harvest Summary".to_string(),
            "===============".to_string(),
            format!("Succeeded: {}", self.succeeded),
            format!("Failed: {}", self.failed),
            format!("Skipped (already done): {}", self.skipped),
            format!("Empty pages: {}", self.empty),
            format!("Attempts: {}", self.attempts),
            format!("Runtime: {}s", self.runtime.as_secs()),
        ];

        if !self.fields.is_empty() {
            lines.push(String::new());
            lines.push("Fields extracted:".to_string());
            for (name, count) in &self.fields {
                lines.push(format!("  {}: {}", name, count));
            }
        }

        lines.join("\n")
    }
}
