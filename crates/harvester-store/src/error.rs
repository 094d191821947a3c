//! Error types for the storage layer

use thiserror::Error;

/// Errors raised by checkpoint stores
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Filesystem error
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Checkpoint database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON checkpoint could not be parsed or written
    #[error("Checkpoint JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV checkpoint could not be parsed or written
    #[error("Checkpoint CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Existing checkpoint content is not in the expected shape
    #[error("Corrupt checkpoint: {0}")]
    Corrupt(String),

    /// Key cannot be represented in the checkpoint format
    #[error("Invalid checkpoint key: {0:?}")]
    InvalidKey(String),
}

/// Errors raised by the output table
#[derive(Error, Debug)]
pub enum TableError {
    /// Filesystem error
    #[error("Output table I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding error
    #[error("Output table CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Existing table has a header without the key column
    #[error("Output table is missing key column '{0}'")]
    MissingKeyColumn(String),

    /// Row to commit does not carry a key
    #[error("Row has no value for key column '{0}'")]
    MissingKey(String),
}

/// Errors raised while committing a result
#[derive(Error, Debug)]
pub enum SinkError {
    /// Output table commit failed; the checkpoint was not touched
    #[error("Table commit failed: {0}")]
    Table(#[from] TableError),

    /// Row is committed but the checkpoint append failed
    #[error("Checkpoint append failed for '{key}': {reason}")]
    Checkpoint {
        /// Key whose checkpoint entry is missing
        key: String,
        /// Underlying store error
        reason: String,
    },
}
