//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the pipeline and its storage.
//! Implementations live in other crates.

use std::collections::HashSet;

/// Durable record of completed work item keys
///
/// Implemented by the infrastructure layer (harvester-store)
///
/// The store is write-ahead history: entries are only ever added. Presence of
/// a key means "do not reprocess". Appending a key that is already present is
/// tolerated; duplicates collapse on load.
pub trait CheckpointStore {
    /// Error type for store operations
    type Error;

    /// Whether the key has already been recorded
    fn contains(&self, key: &str) -> bool;

    /// Durably record a completed key
    fn append(&mut self, key: &str) -> Result<(), Self::Error>;

    /// Read every recorded key back from durable storage
    fn load_all(&self) -> Result<HashSet<String>, Self::Error>;

    /// Number of distinct keys recorded
    fn len(&self) -> usize;

    /// Whether no keys are recorded yet
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
