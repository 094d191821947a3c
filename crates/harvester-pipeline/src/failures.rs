//! JSON-lines log of items that exhausted their attempts
//!
//! The log is for operators. Resume never reads it: failed keys have no
//! checkpoint entry and are simply tried again on the next run.

use crate::error::PipelineError;
use harvester_domain::{current_timestamp, ExtractionFailure};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// One line of the failure log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Item key
    pub key: String,
    /// Attempts made
    pub attempts: u32,
    /// Last error
    pub reason: String,
    /// Unix seconds
    pub failed_at: u64,
}

impl From<&ExtractionFailure> for FailureRecord {
    fn from(failure: &ExtractionFailure) -> Self {
        Self {
            key: failure.key.clone(),
            attempts: failure.attempts,
            reason: failure.reason.clone(),
            failed_at: current_timestamp(),
        }
    }
}

/// Append-only failure log shared by the workers
pub struct FailureLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FailureLog {
    /// Open (or create) the log for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PipelineError::FailureLog(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Log location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line
    pub async fn record(&self, failure: &ExtractionFailure) -> Result<(), PipelineError> {
        let record = FailureRecord::from(failure);
        let mut line = serde_json::to_string(&record)
            .map_err(|e| PipelineError::FailureLog(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| PipelineError::FailureLog(format!("{}: {}", self.path.display(), e)))
    }

    /// Read every complete record back
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<FailureRecord>, PipelineError> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::FailureLog(format!("{}: {}", path.display(), e))),
        };

        Ok(contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
