//! File-backed checkpoint stores
//!
//! Three on-disk layouts are supported. `Lines` and `Csv` are append-only
//! logs: each key is one whole record written in a single call and synced
//! before `append` returns. A torn trailing record (no terminating newline)
//! is ignored on load and cut off before the next append. `Json` keeps a
//! JSON array, which cannot be appended to, so it is replaced atomically.

use crate::error::CheckpointError;
use crate::fsutil;
use harvester_domain::CheckpointStore;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk layout of a file checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// One key per line
    Lines,

    /// CSV with a header row; keys are read from `column`
    Csv {
        /// Header of the key column
        column: String,
    },

    /// JSON array of keys
    Json,
}

impl CheckpointFormat {
    /// Pick a format from the file extension (`.csv`, `.json`, anything else is lines)
    pub fn from_path(path: &Path, csv_column: &str) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => CheckpointFormat::Csv {
                column: csv_column.to_string(),
            },
            Some(ext) if ext.eq_ignore_ascii_case("json") => CheckpointFormat::Json,
            _ => CheckpointFormat::Lines,
        }
    }
}

/// Checkpoint stored in a plain file
///
/// Keeps an in-memory copy of the key set for `contains`; `load_all` always
/// re-reads the file.
pub struct FileCheckpoint {
    path: PathBuf,
    format: CheckpointFormat,
    keys: HashSet<String>,
    /// Length of the whole records when the file ends in a torn one
    torn_at: Option<u64>,
    /// Whether at least one whole record (or CSV header) is on disk
    has_records: bool,
}

impl FileCheckpoint {
    /// Open a checkpoint, creating nothing on disk if it does not exist yet
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>, format: CheckpointFormat) -> Result<Self, CheckpointError> {
        let path = path.as_ref().to_path_buf();
        let scan = read_keys(&path, &format)?;
        let keys = scan.keys;

        if keys.is_empty() {
            info!("No checkpoint entries at {:?}. Starting fresh.", path);
        } else {
            info!("Resuming from checkpoint {:?}: {} keys completed", path, keys.len());
        }

        Ok(Self {
            path,
            format,
            keys,
            torn_at: scan.torn_at,
            has_records: scan.has_records,
        })
    }

    /// Path of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Layout of the checkpoint file
    pub fn format(&self) -> &CheckpointFormat {
        &self.format
    }

    fn append_record(&mut self, key: &str) -> Result<(), CheckpointError> {
        if let Some(len) = self.torn_at {
            let file = OpenOptions::new().write(true).open(&self.path)?;
            file.set_len(len)?;
            file.sync_data()?;
            warn!("Truncated torn record from checkpoint {:?}", self.path);
            self.torn_at = None;
        }

        let mut record = Vec::new();

        match &self.format {
            CheckpointFormat::Csv { column } => {
                let mut writer = csv::WriterBuilder::new()
                    .terminator(csv::Terminator::Any(b'\n'))
                    .from_writer(Vec::new());
                if !self.has_records {
                    writer.write_record([column.as_str()])?;
                }
                writer.write_record([key])?;
                let bytes = writer
                    .into_inner()
                    .map_err(|e| CheckpointError::Io(e.into_error()))?;
                record.extend_from_slice(&bytes);
            }
            _ => {
                record.extend_from_slice(key.as_bytes());
                record.push(b'\n');
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&record)?;
        file.sync_data()?;

        self.has_records = true;
        Ok(())
    }

    fn rewrite_json(&self, keys: &HashSet<String>) -> Result<(), CheckpointError> {
        let mut sorted: Vec<&String> = keys.iter().collect();
        sorted.sort();
        let json = serde_json::to_vec(&sorted)?;
        fsutil::atomic_write(&self.path, &json)?;
        Ok(())
    }
}

impl CheckpointStore for FileCheckpoint {
    type Error = CheckpointError;

    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn append(&mut self, key: &str) -> Result<(), Self::Error> {
        if key.contains('\n') || key.contains('\r') || key.trim().is_empty() {
            return Err(CheckpointError::InvalidKey(key.to_string()));
        }
        if self.keys.contains(key) {
            debug!("Checkpoint already holds {}", key);
            return Ok(());
        }

        match self.format {
            CheckpointFormat::Json => {
                let mut next = self.keys.clone();
                next.insert(key.to_string());
                self.rewrite_json(&next)?;
                self.keys = next;
            }
            _ => {
                self.append_record(key)?;
                self.keys.insert(key.to_string());
            }
        }

        Ok(())
    }

    fn load_all(&self) -> Result<HashSet<String>, Self::Error> {
        read_keys(&self.path, &self.format).map(|scan| scan.keys)
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// What a scan of the checkpoint file found
struct Scan {
    keys: HashSet<String>,
    torn_at: Option<u64>,
    has_records: bool,
}

fn read_keys(path: &Path, format: &CheckpointFormat) -> Result<Scan, CheckpointError> {
    if !path.exists() {
        return Ok(Scan {
            keys: HashSet::new(),
            torn_at: None,
            has_records: false,
        });
    }

    let contents = fs::read(path)?;

    if *format == CheckpointFormat::Json {
        let keys: Vec<String> = if contents.iter().all(u8::is_ascii_whitespace) {
            Vec::new()
        } else {
            serde_json::from_slice(&contents)?
        };
        return Ok(Scan {
            has_records: !keys.is_empty(),
            keys: keys.into_iter().collect(),
            torn_at: None,
        });
    }

    let (complete, torn_at) = complete_records(&contents);
    if torn_at.is_some() {
        warn!("Ignoring torn trailing record in checkpoint {:?}", path);
    }
    let complete = std::str::from_utf8(complete)
        .map_err(|e| CheckpointError::Corrupt(format!("checkpoint is not UTF-8: {}", e)))?;

    let keys = match format {
        CheckpointFormat::Csv { column } => read_csv_keys(complete, column)?,
        _ => complete
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
    };

    Ok(Scan {
        keys,
        torn_at,
        has_records: !complete.trim().is_empty(),
    })
}

/// Split file contents into whole records and, if a fragment trails them,
/// the byte length the file must be cut back to
fn complete_records(contents: &[u8]) -> (&[u8], Option<u64>) {
    let end = contents
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |newline| newline + 1);
    let torn_at = (end < contents.len()).then_some(end as u64);
    (&contents[..end], torn_at)
}

fn read_csv_keys(contents: &str, column: &str) -> Result<HashSet<String>, CheckpointError> {
    if contents.trim().is_empty() {
        return Ok(HashSet::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let index = reader
        .headers()?
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| {
            CheckpointError::Corrupt(format!("CSV checkpoint has no '{}' column", column))
        })?;

    let mut keys = HashSet::new();
    for record in reader.records() {
        let record = record?;
        if let Some(key) = record.get(index).filter(|k| !k.is_empty()) {
            keys.insert(key.to_string());
        }
    }
    Ok(keys)
}
