//! Error types for the harvesting pipeline

use harvester_extractor::ProfileError;
use harvester_session::PoolError;
use harvester_store::{CheckpointError, SinkError, TableError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading the work catalog
#[derive(Error, Debug)]
pub enum LoadError {
    /// The input file could not be read
    #[error("Cannot read input {path}: {source}")]
    Io {
        /// Input path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Malformed CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Unreadable workbook
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// The input lacks the expected shape (missing key column, empty sheet)
    #[error("Input format error: {0}")]
    InputFormat(String),
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("Cannot access config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// TOML could not be parsed
    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML could not be produced
    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The target profile is unusable
    #[error("Invalid target profile: {0}")]
    Profile(#[from] ProfileError),
}

/// Structural failures that abort a run
///
/// Per-item extraction failures are not errors at this level; they are
/// counted, logged and written to the failure log.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input catalog error
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Checkpoint could not be opened or read
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Output table could not be opened
    #[error("Output error: {0}")]
    Output(#[from] TableError),

    /// A commit failed; the run stops so the output stays consistent
    #[error("Commit failed: {0}")]
    Sink(#[from] SinkError),

    /// Session pool could not be built
    #[error("Session pool error: {0}")]
    Pool(#[from] PoolError),

    /// Failure log could not be written
    #[error("Failure log error: {0}")]
    FailureLog(String),

    /// A worker task panicked or was cancelled
    #[error("Worker error: {0}")]
    Worker(String),
}
