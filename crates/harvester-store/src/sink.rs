//! Result sink: the single writer of the output table and the checkpoint
//!
//! A commit publishes the row to the output table first and only then
//! appends the key to the checkpoint. A crash between the two leaves a
//! committed row without a checkpoint entry; the item is re-fetched on
//! resume and its row replaced, so the table never holds the same key twice.

use crate::error::SinkError;
use crate::table::{OutputTable, RowChange};
use harvester_domain::{CheckpointStore, ExtractionResult, WorkItem};
use std::fmt::Display;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Column that records when a row was extracted (Unix seconds)
pub const EXTRACTED_AT_COLUMN: &str = "extracted_at";

/// Flatten an item and its result into `(column, value)` cells
///
/// Order: the key, the item's pass-through metadata, the extracted fields
/// (lists expanded to `name1..nameN`), then [`EXTRACTED_AT_COLUMN`].
pub fn row_cells(key_column: &str, item: &WorkItem, result: &ExtractionResult) -> Vec<(String, String)> {
    let mut cells = vec![(key_column.to_string(), item.key().to_string())];

    for (column, value) in item.metadata() {
        if column != key_column {
            cells.push((column.clone(), value.clone()));
        }
    }
    for (name, value) in &result.fields {
        cells.extend(value.cells(name));
    }
    cells.push((EXTRACTED_AT_COLUMN.to_string(), result.extracted_at.to_string()));

    cells
}

/// Outcome of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Whether the row was new or replaced an existing one
    pub change: RowChange,
    /// Rows in the table after the commit
    pub rows: usize,
}

struct SinkState<C> {
    table: OutputTable,
    checkpoint: C,
}

/// Serializes commits from all workers
///
/// At most one commit is in progress at any time.
pub struct ResultSink<C> {
    state: Mutex<SinkState<C>>,
}

impl<C> ResultSink<C>
where
    C: CheckpointStore,
    C::Error: Display,
{
    /// Create a sink over an opened table and checkpoint
    pub fn new(table: OutputTable, checkpoint: C) -> Self {
        Self {
            state: Mutex::new(SinkState { table, checkpoint }),
        }
    }

    /// Durably record one successful extraction
    ///
    /// # Errors
    ///
    /// [`SinkError::Table`] means nothing changed on disk.
    /// [`SinkError::Checkpoint`] means the row is committed but the key is not
    /// checkpointed; the item will be processed again on the next run.
    #[instrument(skip(self, item, result), fields(key = %item.key()))]
    pub async fn commit(&self, item: &WorkItem, result: &ExtractionResult) -> Result<CommitOutcome, SinkError> {
        let mut state = self.state.lock().await;

        let cells = row_cells(state.table.key_column(), item, result);
        let change = state.table.commit_row(&cells)?;

        state
            .checkpoint
            .append(item.key())
            .map_err(|e| SinkError::Checkpoint {
                key: item.key().to_string(),
                reason: e.to_string(),
            })?;

        let rows = state.table.len();
        debug!("Committed {:?}, table now has {} rows", change, rows);
        Ok(CommitOutcome { change, rows })
    }

    /// Whether `key` is recorded in the checkpoint
    pub async fn is_checkpointed(&self, key: &str) -> bool {
        self.state.lock().await.checkpoint.contains(key)
    }

    /// Number of rows in the output table
    pub async fn row_count(&self) -> usize {
        self.state.lock().await.table.len()
    }

    /// Number of keys in the checkpoint
    pub async fn checkpoint_len(&self) -> usize {
        self.state.lock().await.checkpoint.len()
    }

    /// Take back the table and checkpoint
    pub fn into_parts(self) -> (OutputTable, C) {
        let state = self.state.into_inner();
        (state.table, state.checkpoint)
    }
}
