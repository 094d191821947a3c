//! Harvester Pipeline
//!
//! Resumable, concurrent harvesting runs over a catalog of work items.
//!
//! # Overview
//!
//! A run:
//! - **Loads** the catalog (CSV or spreadsheet), dropping keys the checkpoint
//!   already holds
//! - **Distributes** the pending items over one worker per session
//! - **Extracts** each item through the fetch engine, with retries and
//!   randomized pacing
//! - **Commits** every result to the output table, then checkpoints its key
//! - **Logs** items that exhausted their attempts to an optional failure log
//!
//! Interrupting a run is safe at any point. Keys without a checkpoint entry
//! are processed again next time and their rows replaced, never duplicated.
//!
//! # Usage
//!
//! ```no_run
//! use harvester_pipeline::{HarvestConfig, Harvester};
//! use harvester_session::HttpSessionFactory;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarvestConfig::from_file("harvester.toml")?;
//!     let harvester = Harvester::new(config)?;
//!
//!     let (stop, shutdown) = watch::channel(false);
//!     tokio::spawn(async move {
//!         if tokio::signal::ctrl_c().await.is_ok() {
//!             let _ = stop.send(true);
//!         }
//!     });
//!
//!     let report = harvester.run(&HttpSessionFactory, shutdown).await?;
//!     println!("{}", report.metrics.summary());
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! concurrency = 3
//!
//! [input]
//! path = "catalog.csv"
//! key_column = "asin"
//! delimiter = ","
//!
//! [output]
//! path = "results.csv"
//! checkpoint = "checkpoint.csv"
//! failure_log = "failures.jsonl"
//!
//! [delays.between_items]
//! min_ms = 3000
//! max_ms = 7000
//!
//! [retry]
//! max_attempts = 3
//! ```

#![warn(missing_docs)]

mod config;
mod distributor;
mod error;
mod failures;
mod loader;
mod metrics;
mod runner;

pub use config::{HarvestConfig, InputConfig, OutputConfig, MAX_CONCURRENCY};
pub use distributor::{Distribution, Distributor, WorkQueue};
pub use error::{ConfigError, LoadError, PipelineError};
pub use failures::{FailureLog, FailureRecord};
pub use loader::{Catalog, CatalogLoader, RawTable};
pub use metrics::RunMetrics;
pub use runner::{Harvester, RunPlan, RunReport};
