//! Work catalog loader
//!
//! Turns an input table into the ordered list of items still to process.
//! The loader only reads; it never touches the input, the output or the
//! checkpoint.

use crate::config::InputConfig;
use crate::error::LoadError;
use calamine::{open_workbook_auto, Reader};
use harvester_domain::WorkItem;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Header plus data rows as read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Trimmed column names
    pub header: Vec<String>,
    /// Data rows, padded or truncated to the header width
    pub rows: Vec<Vec<String>>,
}

/// Items left to process, with how many input items were already done
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    /// Items whose keys are not checkpointed, in processing order
    pub pending: Vec<WorkItem>,
    /// Distinct input items skipped because their key is checkpointed
    pub completed: usize,
}

impl Catalog {
    /// Distinct items in the input
    pub fn total(&self) -> usize {
        self.pending.len() + self.completed
    }
}

/// Reads CSV or spreadsheet catalogs
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    key_column: String,
    delimiter: u8,
    sheet: Option<String>,
}

impl CatalogLoader {
    /// Loader keyed on `key_column`, comma-delimited
    pub fn new(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            delimiter: b',',
            sheet: None,
        }
    }

    /// Loader for the `[input]` section of a configuration
    pub fn from_config(input: &InputConfig) -> Self {
        let mut loader = Self::new(input.key_column.clone());
        if input.delimiter.is_ascii() {
            loader.delimiter = input.delimiter as u8;
        }
        loader.sheet = input.sheet.clone();
        loader
    }

    /// Use another CSV delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read a named worksheet instead of the first
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Key column name as configured
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Items whose keys are not in `completed`, in input order
    ///
    /// Rows with a blank key, or a key spanning several lines, are dropped.
    /// A key listed more than once keeps its last row, at that row's position.
    ///
    /// # Errors
    ///
    /// [`LoadError::InputFormat`] when the key column is missing; I/O and
    /// parse errors otherwise.
    pub fn load(&self, path: impl AsRef<Path>, completed: &HashSet<String>) -> Result<Catalog, LoadError> {
        let path = path.as_ref();
        let items = self.load_all(path)?;
        let total = items.len();

        let pending: Vec<WorkItem> = items
            .into_iter()
            .filter(|item| !completed.contains(item.key()))
            .collect();
        let catalog = Catalog {
            completed: total - pending.len(),
            pending,
        };

        info!(
            "Loaded {} item(s) from {}: {} already done, {} pending",
            total,
            path.display(),
            catalog.completed,
            catalog.pending.len()
        );
        Ok(catalog)
    }

    /// Every distinct item in the input, completed or not
    pub fn load_all(&self, path: impl AsRef<Path>) -> Result<Vec<WorkItem>, LoadError> {
        let table = self.read_table(path.as_ref())?;
        self.items_from(table)
    }

    /// Read the raw table, picking the reader by file extension
    pub fn read_table(&self, path: &Path) -> Result<RawTable, LoadError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
            self.read_workbook(path)
        } else {
            let delimiter = if extension == "tsv" { b'\t' } else { self.delimiter };
            read_csv(path, delimiter)
        }
    }

    fn read_workbook(&self, path: &Path) -> Result<RawTable, LoadError> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| LoadError::Spreadsheet(e.to_string()))?;

        let mut sheets = workbook.worksheets();
        let position = match &self.sheet {
            Some(name) => sheets
                .iter()
                .position(|(sheet, _)| sheet == name)
                .ok_or_else(|| LoadError::InputFormat(format!("worksheet '{}' not found", name)))?,
            None => 0,
        };
        if sheets.is_empty() {
            return Err(LoadError::InputFormat(format!(
                "{} has no worksheets",
                path.display()
            )));
        }
        let (name, range) = sheets.swap_remove(position);
        debug!("Reading worksheet '{}' of {}", name, path.display());

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>());
        let header = rows
            .next()
            .ok_or_else(|| LoadError::InputFormat(format!("worksheet '{}' is empty", name)))?;

        Ok(shape(header, rows.collect()))
    }

    fn items_from(&self, table: RawTable) -> Result<Vec<WorkItem>, LoadError> {
        let key_index = find_column(&table.header, &self.key_column).ok_or_else(|| {
            LoadError::InputFormat(format!(
                "key column '{}' not found in header [{}]",
                self.key_column,
                table.header.join(", ")
            ))
        })?;
        let key_name = table.header[key_index].clone();

        let mut items: Vec<Option<WorkItem>> = Vec::with_capacity(table.rows.len());
        let mut last_position: HashMap<String, usize> = HashMap::new();
        let mut blank = 0usize;
        let mut multiline = 0usize;

        for row in table.rows {
            let key = row[key_index].trim().to_string();
            if key.is_empty() {
                blank += 1;
                continue;
            }
            if key.contains(['\n', '\r']) {
                warn!("Skipping key {:?}: keys must fit on one line", key);
                multiline += 1;
                continue;
            }

            let metadata = table
                .header
                .iter()
                .zip(row)
                .enumerate()
                .filter(|(index, _)| *index != key_index)
                .map(|(_, (column, value))| (column.clone(), value))
                .collect();

            if let Some(previous) = last_position.insert(key.clone(), items.len()) {
                debug!("Duplicate key {}; keeping the later row", key);
                items[previous] = None;
            }
            items.push(Some(WorkItem::with_metadata(key, metadata)));
        }

        if blank > 0 {
            warn!("Skipped {} row(s) with an empty '{}'", blank, key_name);
        }
        if multiline > 0 {
            warn!("Skipped {} row(s) whose '{}' spans several lines", multiline, key_name);
        }
        Ok(items.into_iter().flatten().collect())
    }
}

fn read_csv(path: &Path, delimiter: u8) -> Result<RawTable, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(file);

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Vec<String>>, csv::Error>>()?;

    Ok(shape(header, rows))
}

/// Trim header names and square every row to the header width
fn shape(header: Vec<String>, rows: Vec<Vec<String>>) -> RawTable {
    let header: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();
    let width = header.len();
    let rows = rows
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();
    RawTable { header, rows }
}

/// Exact match first, then case-insensitive
fn find_column(header: &[String], name: &str) -> Option<usize> {
    let name = name.trim();
    header
        .iter()
        .position(|h| h == name)
        .or_else(|| header.iter().position(|h| h.eq_ignore_ascii_case(name)))
}
