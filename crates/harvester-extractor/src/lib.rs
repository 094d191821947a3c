//! Harvester Extractor
//!
//! Turns a catalog item into structured fields by driving a browsing session.
//!
//! # Overview
//!
//! For each item the [`FetchEngine`] expands the profile's URL template,
//! navigates, waits for the page to be ready, and reads every field through
//! its selector strategies in priority order. Raw text is normalized into a
//! [`FieldValue`](harvester_domain::FieldValue) according to the field kind.
//!
//! # Architecture
//!
//! ```text
//! WorkItem → FetchEngine → Session (navigate, wait, read) → normalize → ExtractionResult
//!                 ↑
//!           RateLimiter (per worker), RetryPolicy
//! ```
//!
//! # Key Features
//!
//! - **Selector fallbacks**: the first strategy yielding a value wins
//! - **Locale-aware numbers**: `1.299,99 €` and `$1,299.99` both parse
//! - **Image URL cleanup**: size suffixes stripped, thumbnails dropped, deduplicated
//! - **Marketplace fallback**: alternate URLs tried when a page yields nothing
//! - **Bounded retries** with randomized backoff on transient session errors
//!
//! # Example Usage
//!
//! ```no_run
//! use harvester_domain::{SessionIdentity, WorkItem};
//! use harvester_extractor::{DelayConfig, ExtractorConfig, FetchEngine, RateLimiter, TargetProfile};
//! use harvester_session::HttpSession;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FetchEngine::new(TargetProfile::default(), ExtractorConfig::default())?;
//! let mut session = HttpSession::new(SessionIdentity::new("Mozilla/5.0", "es-ES"))?;
//! let mut limiter = RateLimiter::new(DelayConfig::default());
//!
//! match engine.extract(&mut session, &mut limiter, &WorkItem::new("B000123")).await {
//!     Ok(result) => println!("{} fields", result.fields.len()),
//!     Err(failure) => eprintln!("{}", failure),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod engine;
mod error;
pub mod normalize;
mod profile;
mod retry;
mod throttle;

#[cfg(test)]
mod tests;

pub use config::{ExtractorConfig, Timeouts};
pub use engine::FetchEngine;
pub use error::ProfileError;
pub use profile::{DecimalStyle, FieldKind, FieldSpec, SelectorStrategy, TargetProfile};
pub use retry::RetryPolicy;
pub use throttle::{DelayConfig, DelayRange, DelayStage, RateLimiter};
