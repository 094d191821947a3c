//! Output table of extracted rows
//!
//! The table is a CSV file keyed by one column. Every commit rewrites the
//! whole file through a temp sibling, fsync and rename, so a reader (or a
//! process restarted after a crash) sees either the previous table or the
//! new one, never a partial write.

use crate::error::TableError;
use crate::fsutil;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a commit did to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    /// The key was new and a row was added at the end
    Appended,
    /// A row for the key already existed and was replaced in place
    Replaced,
}

/// In-memory image of the output CSV
#[derive(Debug, Clone)]
pub struct OutputTable {
    path: PathBuf,
    key_column: String,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl OutputTable {
    /// Load the table at `path`, or start an empty one if it does not exist
    ///
    /// A leftover `<name>.tmp` from an interrupted commit is removed. If the
    /// existing file holds several rows for the same key, only the last one
    /// is kept.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be parsed or its header lacks `key_column`.
    pub fn open(path: impl AsRef<Path>, key_column: &str) -> Result<Self, TableError> {
        let path = path.as_ref().to_path_buf();

        let stale = fsutil::temp_path(&path);
        if stale.exists() {
            warn!("Removing unpublished table write {:?}", stale);
            fs::remove_file(&stale)?;
        }

        let mut table = Self {
            path,
            key_column: key_column.to_string(),
            header: Vec::new(),
            rows: Vec::new(),
            index: HashMap::new(),
        };

        let has_content = fs::metadata(&table.path).map(|m| m.len() > 0).unwrap_or(false);
        if has_content {
            table.load()?;
        }

        info!("Output table {:?} holds {} rows", table.path, table.rows.len());
        Ok(table)
    }

    fn load(&mut self) -> Result<(), TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_path(&self.path)?;

        self.header = reader.headers()?.iter().map(String::from).collect();
        let key_idx = self
            .header
            .iter()
            .position(|h| h == &self.key_column)
            .ok_or_else(|| TableError::MissingKeyColumn(self.key_column.clone()))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(String::from).collect();
            row.resize(self.header.len(), String::new());
            rows.push(row);
        }

        // Keep the last row per key at its own position
        let keep: Vec<bool> = {
            let mut last: HashMap<&str, usize> = HashMap::new();
            for (i, row) in rows.iter().enumerate() {
                last.insert(row[key_idx].as_str(), i);
            }
            rows.iter()
                .enumerate()
                .map(|(i, row)| row[key_idx].is_empty() || last.get(row[key_idx].as_str()) == Some(&i))
                .collect()
        };
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            warn!("Collapsed {} duplicate rows in {:?}", dropped, self.path);
        }

        self.rows = rows
            .into_iter()
            .zip(keep)
            .filter_map(|(row, keep)| keep.then_some(row))
            .collect();
        self.reindex(key_idx);
        Ok(())
    }

    fn reindex(&mut self, key_idx: usize) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row[key_idx].is_empty())
            .map(|(i, row)| (row[key_idx].clone(), i))
            .collect();
    }

    /// Path of the published CSV
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the key column
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a row exists for `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Column names in order
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// All rows, each padded to the header width
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Cell value for `key` in `column`
    pub fn value(&self, key: &str, column: &str) -> Option<&str> {
        let row = *self.index.get(key)?;
        let col = self.header.iter().position(|h| h == column)?;
        Some(self.rows[row][col].as_str())
    }

    /// The table with `cells` upserted, leaving `self` untouched
    ///
    /// Unknown columns are appended to the header and back-filled with empty
    /// cells in existing rows.
    pub fn with_row(&self, cells: &[(String, String)]) -> Result<(OutputTable, RowChange), TableError> {
        let key = cells
            .iter()
            .find(|(column, _)| column == &self.key_column)
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| TableError::MissingKey(self.key_column.clone()))?;

        let mut next = self.clone();
        if next.header.is_empty() {
            next.header.push(next.key_column.clone());
        }
        for (column, _) in cells {
            if !next.header.contains(column) {
                next.header.push(column.clone());
            }
        }
        let width = next.header.len();
        for row in &mut next.rows {
            row.resize(width, String::new());
        }

        let mut row = vec![String::new(); width];
        for (column, value) in cells {
            if let Some(col) = next.header.iter().position(|h| h == column) {
                row[col] = value.clone();
            }
        }

        let change = match next.index.get(&key) {
            Some(&existing) => {
                next.rows[existing] = row;
                RowChange::Replaced
            }
            None => {
                next.index.insert(key, next.rows.len());
                next.rows.push(row);
                RowChange::Appended
            }
        };

        Ok((next, change))
    }

    fn encode(&self) -> Result<Vec<u8>, TableError> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        if !self.header.is_empty() {
            writer.write_record(&self.header)?;
        }
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| TableError::Io(e.into_error()))
    }

    /// Write the full table to its temp sibling without publishing it
    pub fn stage(&self) -> Result<StagedTable, TableError> {
        let bytes = self.encode()?;
        let tmp = fsutil::write_temp(&self.path, &bytes)?;
        debug!("Staged {} rows at {:?}", self.rows.len(), tmp);
        Ok(StagedTable {
            tmp,
            target: self.path.clone(),
        })
    }

    /// Upsert one row and publish the new table atomically
    ///
    /// On error the in-memory table and the published file are unchanged.
    pub fn commit_row(&mut self, cells: &[(String, String)]) -> Result<RowChange, TableError> {
        let (next, change) = self.with_row(cells)?;
        next.stage()?.publish()?;
        *self = next;
        Ok(change)
    }
}

/// A fully written, fsynced table that has not replaced the target yet
#[derive(Debug)]
pub struct StagedTable {
    tmp: PathBuf,
    target: PathBuf,
}

impl StagedTable {
    /// Location of the staged file
    pub fn path(&self) -> &Path {
        &self.tmp
    }

    /// Rename the staged file over the target
    pub fn publish(self) -> Result<(), TableError> {
        fsutil::publish(&self.tmp, &self.target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cells(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let table = OutputTable::open(dir.path().join("out.csv"), "asin").unwrap();

        assert!(table.is_empty());
        assert!(table.header().is_empty());
        assert!(!table.path().exists());
    }

    #[test]
    fn test_commit_appends_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        let mut table = OutputTable::open(&path, "asin").unwrap();
        let change = table
            .commit_row(&cells(&[("asin", "B01"), ("price", "12.5")]))
            .unwrap();

        assert_eq!(change, RowChange::Appended);
        assert_eq!(fs::read_to_string(&path).unwrap(), "asin,price\nB01,12.5\n");
    }

    #[test]
    fn test_commit_replaces_existing_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        let mut table = OutputTable::open(&path, "asin").unwrap();
        table.commit_row(&cells(&[("asin", "B01"), ("price", "1")])).unwrap();
        table.commit_row(&cells(&[("asin", "B02"), ("price", "2")])).unwrap();
        let change = table.commit_row(&cells(&[("asin", "B01"), ("price", "3")])).unwrap();

        assert_eq!(change, RowChange::Replaced);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value("B01", "price"), Some("3"));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "asin,price\nB01,3\nB02,2\n"
        );
    }

    #[test]
    fn test_new_columns_back_filled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        let mut table = OutputTable::open(&path, "asin").unwrap();
        table.commit_row(&cells(&[("asin", "B01"), ("price", "1")])).unwrap();
        table
            .commit_row(&cells(&[("asin", "B02"), ("image1", "http://x/a.jpg")]))
            .unwrap();

        assert_eq!(table.header(), &["asin", "price", "image1"]);
        assert_eq!(table.value("B01", "image1"), Some(""));

        let reopened = OutputTable::open(&path, "asin").unwrap();
        assert_eq!(reopened.rows()[0], vec!["B01", "1", ""]);
    }

    #[test]
    fn test_missing_key_rejected() {
        let dir = TempDir::new().unwrap();
        let mut table = OutputTable::open(dir.path().join("out.csv"), "asin").unwrap();

        let err = table.commit_row(&cells(&[("price", "1")])).unwrap_err();
        assert!(matches!(err, TableError::MissingKey(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_existing_file_without_key_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "sku,price\nX,1\n").unwrap();

        let err = OutputTable::open(&path, "asin").unwrap_err();
        assert!(matches!(err, TableError::MissingKeyColumn(_)));
    }

    #[test]
    fn test_duplicate_rows_collapse_to_last() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "asin,price\nA,1\nB,2\nA,3\n").unwrap();

        let table = OutputTable::open(&path, "asin").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], vec!["B", "2"]);
        assert_eq!(table.value("A", "price"), Some("3"));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "asin,price,title\nA,1\n").unwrap();

        let table = OutputTable::open(&path, "asin").unwrap();
        assert_eq!(table.value("A", "title"), Some(""));
    }

    #[test]
    fn test_staged_but_unpublished_write_is_discarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        let mut table = OutputTable::open(&path, "asin").unwrap();
        table.commit_row(&cells(&[("asin", "A"), ("price", "1")])).unwrap();

        // Crash between fsync of the temp file and the rename
        let (next, _) = table.with_row(&cells(&[("asin", "B"), ("price", "2")])).unwrap();
        let staged = next.stage().unwrap();
        assert!(staged.path().exists());
        drop(staged);

        let reopened = OutputTable::open(&path, "asin").unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(!reopened.contains_key("B"));
        assert!(!fsutil::temp_path(&path).exists());
    }
}
