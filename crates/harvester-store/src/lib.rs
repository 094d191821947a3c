//! Harvester Storage Layer
//!
//! Durable state of the pipeline: the checkpoint of completed keys and the
//! output table of extracted rows.
//!
//! # Architecture
//!
//! - Checkpoints are write-ahead history. File checkpoints append whole records
//!   and fsync; the JSON variant and the output table are rewritten through
//!   write-temp, fsync, rename, never in place.
//! - SQLite is available as an embedded key-value checkpoint. [`AnyCheckpoint`]
//!   picks a backend from the checkpoint file extension.
//! - The [`ResultSink`] is the only writer of both, and commits the table row
//!   before it records the checkpoint entry.
//!
//! # Examples
//!
//! ```no_run
//! use harvester_store::{CheckpointFormat, FileCheckpoint, OutputTable, ResultSink};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let checkpoint = FileCheckpoint::open("checkpoint.txt", CheckpointFormat::Lines)?;
//! let table = OutputTable::open("results.csv", "asin")?;
//! let sink = ResultSink::new(table, checkpoint);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod backend;
mod checkpoint;
mod error;
mod fsutil;
mod sink;
mod sqlite;
mod table;

pub use backend::AnyCheckpoint;
pub use checkpoint::{CheckpointFormat, FileCheckpoint};
pub use error::{CheckpointError, SinkError, TableError};
pub use sink::{row_cells, CommitOutcome, ResultSink, EXTRACTED_AT_COLUMN};
pub use sqlite::SqliteCheckpoint;
pub use table::{OutputTable, RowChange, StagedTable};
