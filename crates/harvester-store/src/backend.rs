//! Runtime choice of checkpoint backend

use crate::checkpoint::{CheckpointFormat, FileCheckpoint};
use crate::error::CheckpointError;
use crate::sqlite::SqliteCheckpoint;
use harvester_domain::CheckpointStore;
use std::collections::HashSet;
use std::path::Path;

/// Checkpoint backend selected from the checkpoint path
///
/// `.db`, `.sqlite` and `.sqlite3` open a [`SqliteCheckpoint`]; `.csv` and
/// `.json` open the matching [`FileCheckpoint`] layout; anything else is a
/// one-key-per-line file.
pub enum AnyCheckpoint {
    /// Plain file checkpoint
    File(FileCheckpoint),
    /// Embedded database checkpoint
    Sqlite(SqliteCheckpoint),
}

impl AnyCheckpoint {
    /// Open the backend implied by the extension of `path`
    ///
    /// `csv_column` names the key column of CSV checkpoints.
    pub fn open(path: impl AsRef<Path>, csv_column: &str) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("db") | Some("sqlite") | Some("sqlite3") => {
                Ok(AnyCheckpoint::Sqlite(SqliteCheckpoint::open(path)?))
            }
            _ => {
                let format = CheckpointFormat::from_path(path, csv_column);
                Ok(AnyCheckpoint::File(FileCheckpoint::open(path, format)?))
            }
        }
    }

    /// Short name of the backend, for logs and status output
    pub fn kind(&self) -> &'static str {
        match self {
            AnyCheckpoint::File(file) => match file.format() {
                CheckpointFormat::Lines => "lines",
                CheckpointFormat::Csv { .. } => "csv",
                CheckpointFormat::Json => "json",
            },
            AnyCheckpoint::Sqlite(_) => "sqlite",
        }
    }
}

impl CheckpointStore for AnyCheckpoint {
    type Error = CheckpointError;

    fn contains(&self, key: &str) -> bool {
        match self {
            AnyCheckpoint::File(store) => store.contains(key),
            AnyCheckpoint::Sqlite(store) => store.contains(key),
        }
    }

    fn append(&mut self, key: &str) -> Result<(), Self::Error> {
        match self {
            AnyCheckpoint::File(store) => store.append(key),
            AnyCheckpoint::Sqlite(store) => store.append(key),
        }
    }

    fn load_all(&self) -> Result<HashSet<String>, Self::Error> {
        match self {
            AnyCheckpoint::File(store) => store.load_all(),
            AnyCheckpoint::Sqlite(store) => store.load_all(),
        }
    }

    fn len(&self) -> usize {
        match self {
            AnyCheckpoint::File(store) => store.len(),
            AnyCheckpoint::Sqlite(store) => store.len(),
        }
    }
}
