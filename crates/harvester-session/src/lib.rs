//! Harvester Session Layer
//!
//! Browsing sessions the fetch engine drives, and the fixed pool they live in.
//!
//! # Architecture
//!
//! [`Session`] is the capability the engine needs from a browser: navigate,
//! wait for an element, read matches. Concrete sessions:
//!
//! - [`HttpSession`]: plain HTTP client with a per-session cookie jar, parsing
//!   the returned document with CSS selectors
//! - [`ScriptedSession`]: deterministic in-memory pages for tests and dry runs
//!
//! Each session is bound to one [`SessionIdentity`] for its whole lifetime.
//!
//! # Examples
//!
//! ```
//! use harvester_session::{IdentityRotation, ScriptedSite, Session, SessionPool};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let site = ScriptedSite::new();
//! site.add_page("https://shop.test/dp/A1", "<h1 id='title'>Lamp</h1>");
//!
//! let mut pool = SessionPool::open(&site, 2, &IdentityRotation::default()).await.unwrap();
//! let mut session = pool.acquire(0).unwrap();
//!
//! session.navigate("https://shop.test/dp/A1", Duration::from_secs(5)).await.unwrap();
//! let titles = session.read("#title", None).await.unwrap();
//! assert_eq!(titles, vec!["Lamp"]);
//! # }
//! ```

#![warn(missing_docs)]

pub mod http;
pub mod identity;
mod page;
pub mod pool;
pub mod scripted;

use async_trait::async_trait;
use harvester_domain::SessionIdentity;
use std::time::Duration;
use thiserror::Error;

pub use http::{HttpSession, HttpSessionFactory};
pub use page::select_values;
pub use identity::IdentityRotation;
pub use pool::{PoolError, SessionFactory, SessionPool};
pub use scripted::{ScriptedSession, ScriptedSite};

/// Errors reported by a session
///
/// Sessions never panic on navigation problems; every failure is one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Page did not finish loading in time
    #[error("Navigation to {url} timed out after {timeout_ms} ms")]
    NavigationTimeout {
        /// Target URL
        url: String,
        /// Bound that was exceeded
        timeout_ms: u64,
    },

    /// Awaited element never appeared
    #[error("Selector '{selector}' not present after {timeout_ms} ms")]
    SelectorTimeout {
        /// Awaited selector
        selector: String,
        /// Bound that was exceeded
        timeout_ms: u64,
    },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Site refused the request (403, 429, 503)
    #[error("Blocked by site (HTTP {0})")]
    Blocked(u16),

    /// Any other unsuccessful HTTP status
    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// Selector could not be parsed
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Identity headers could not be encoded
    #[error("Invalid session identity: {0}")]
    InvalidIdentity(String),

    /// Read or wait before any page was loaded
    #[error("No page loaded")]
    NotLoaded,
}

impl SessionError {
    /// Whether retrying the same navigation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SessionError::NavigationTimeout { .. }
            | SessionError::SelectorTimeout { .. }
            | SessionError::Network(_)
            | SessionError::Blocked(_) => true,
            SessionError::HttpStatus(status) => *status >= 500,
            SessionError::InvalidSelector(_)
            | SessionError::InvalidUrl(_)
            | SessionError::InvalidIdentity(_)
            | SessionError::NotLoaded => false,
        }
    }
}

/// One isolated browsing context
///
/// A session is used by a single worker at a time and keeps its identity,
/// cookies and current page between calls.
#[async_trait]
pub trait Session: Send + Sync {
    /// Load `url`, bounded by `timeout`
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError>;

    /// Wait until `selector` matches in the current page, bounded by `timeout`
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), SessionError>;

    /// Every match of `selector`: the element text, or `attribute` when given
    ///
    /// No match is an empty list, not an error.
    async fn read(&self, selector: &str, attribute: Option<&str>) -> Result<Vec<String>, SessionError>;

    /// Identity bound to this session
    fn identity(&self) -> &SessionIdentity;

    /// URL of the loaded page, after redirects
    fn current_url(&self) -> Option<&str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SessionError::Network("reset".into()).is_transient());
        assert!(SessionError::Blocked(429).is_transient());
        assert!(SessionError::HttpStatus(502).is_transient());
        assert!(SessionError::SelectorTimeout {
            selector: "#x".into(),
            timeout_ms: 10
        }
        .is_transient());

        assert!(!SessionError::HttpStatus(404).is_transient());
        assert!(!SessionError::InvalidSelector("[[".into()).is_transient());
        assert!(!SessionError::NotLoaded.is_transient());
    }
}
