//! Harvester Domain Layer
//!
//! This crate contains the core vocabulary of the scraping pipeline.
//! It has ZERO external dependencies and defines the value objects and
//! trait interfaces that all other crates depend upon.
//!
//! ## Key Concepts
//!
//! - **WorkItem**: One catalog entry to scrape, identified by a business key
//! - **ExtractionResult**: Fields pulled from an item's page, possibly partial
//! - **ExtractionFailure**: An item that exhausted its retry budget
//! - **SessionIdentity**: User agent and locale headers bound to one session
//! - **CheckpointStore**: Durable set of completed keys used for resume
//!
//! ## Architecture
//!
//! - No external crate dependencies
//! - Pure data and contracts only
//! - Storage, browsing and scheduling live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod identity;
pub mod item;
pub mod result;
pub mod traits;

// Re-exports for convenience
pub use identity::SessionIdentity;
pub use item::WorkItem;
pub use result::{current_timestamp, ExtractionFailure, ExtractionResult, FieldValue};
pub use traits::CheckpointStore;
