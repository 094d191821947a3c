//! Scripted in-memory sessions
//!
//! A [`ScriptedSite`] holds canned pages keyed by URL and can be told to fail
//! the first N navigations to a URL. All sessions created from the same site
//! share its state, so navigation counts can be inspected after a run.

use crate::page::Page;
use crate::pool::SessionFactory;
use crate::{Session, SessionError};
use async_trait::async_trait;
use harvester_domain::SessionIdentity;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct SiteState {
    pages: HashMap<String, String>,
    failures: HashMap<String, (u32, SessionError)>,
    navigations: HashMap<String, usize>,
    identities: Vec<SessionIdentity>,
    latency: Duration,
}

/// Deterministic site shared by scripted sessions
///
/// # Examples
///
/// ```
/// use harvester_session::{ScriptedSite, SessionError};
///
/// let site = ScriptedSite::new();
/// site.add_page("https://shop.test/dp/A1", "<span class='price'>9,99</span>");
/// site.fail_first("https://shop.test/dp/A1", 2, SessionError::Network("reset".into()));
/// assert_eq!(site.navigation_count("https://shop.test/dp/A1"), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedSite {
    state: Arc<Mutex<SiteState>>,
}

impl ScriptedSite {
    /// Create a site with no pages
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serve `html` at `url`
    pub fn add_page(&self, url: impl Into<String>, html: impl Into<String>) {
        self.lock().pages.insert(url.into(), html.into());
    }

    /// Fail the next `times` navigations to `url` with `error`
    pub fn fail_first(&self, url: impl Into<String>, times: u32, error: SessionError) {
        self.lock().failures.insert(url.into(), (times, error));
    }

    /// Delay every navigation by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Navigations attempted to `url`, failed ones included
    pub fn navigation_count(&self, url: &str) -> usize {
        self.lock().navigations.get(url).copied().unwrap_or(0)
    }

    /// Navigations attempted across all URLs
    pub fn total_navigations(&self) -> usize {
        self.lock().navigations.values().sum()
    }

    /// Identities of every session created from this site, in creation order
    pub fn identities(&self) -> Vec<SessionIdentity> {
        self.lock().identities.clone()
    }

    /// Record a navigation and decide its outcome
    fn visit(&self, url: &str) -> Result<String, SessionError> {
        let mut state = self.lock();
        *state.navigations.entry(url.to_string()).or_insert(0) += 1;

        if let Some((remaining, error)) = state.failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error.clone());
            }
        }

        state
            .pages
            .get(url)
            .cloned()
            .ok_or(SessionError::HttpStatus(404))
    }

    fn latency(&self) -> Duration {
        self.lock().latency
    }
}

#[async_trait]
impl SessionFactory for ScriptedSite {
    type Session = ScriptedSession;

    async fn create(&self, _index: usize, identity: SessionIdentity) -> Result<ScriptedSession, SessionError> {
        self.lock().identities.push(identity.clone());
        Ok(ScriptedSession {
            site: self.clone(),
            identity,
            page: None,
        })
    }
}

/// Session reading pages from a [`ScriptedSite`]
pub struct ScriptedSession {
    site: ScriptedSite,
    identity: SessionIdentity,
    page: Option<Page>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError> {
        self.page = None;

        let latency = self.site.latency();
        if latency > timeout {
            tokio::time::sleep(timeout).await;
            let _ = self.site.visit(url);
            return Err(SessionError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let html = self.site.visit(url)?;
        self.page = Some(Page::parse(url, &html));
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), SessionError> {
        let page = self.page.as_ref().ok_or(SessionError::NotLoaded)?;
        if !page.contains(selector)? {
            return Err(SessionError::SelectorTimeout {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn read(&self, selector: &str, attribute: Option<&str>) -> Result<Vec<String>, SessionError> {
        let page = self.page.as_ref().ok_or(SessionError::NotLoaded)?;
        page.select(selector, attribute)
    }

    fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    fn current_url(&self) -> Option<&str> {
        self.page.as_ref().map(Page::url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://shop.test/dp/B01";

    async fn session(site: &ScriptedSite) -> ScriptedSession {
        site.create(0, SessionIdentity::new("agent", "en-US")).await.unwrap()
    }

    #[tokio::test]
    async fn test_serves_registered_page() {
        let site = ScriptedSite::new();
        site.add_page(URL, "<p class='title'> Desk </p>");
        let mut session = session(&site).await;

        session.navigate(URL, Duration::from_secs(1)).await.unwrap();
        session.wait_for("p.title", Duration::from_secs(1)).await.unwrap();

        assert_eq!(session.read("p.title", None).await.unwrap(), vec!["Desk"]);
        assert_eq!(session.current_url(), Some(URL));
    }

    #[tokio::test]
    async fn test_fail_first_then_succeed() {
        let site = ScriptedSite::new();
        site.add_page(URL, "<p>ok</p>");
        site.fail_first(URL, 2, SessionError::Network("reset".into()));
        let mut session = session(&site).await;

        assert!(session.navigate(URL, Duration::from_secs(1)).await.is_err());
        assert!(session.navigate(URL, Duration::from_secs(1)).await.is_err());
        assert!(session.navigate(URL, Duration::from_secs(1)).await.is_ok());
        assert_eq!(site.navigation_count(URL), 3);
    }

    #[tokio::test]
    async fn test_unknown_url_is_404() {
        let site = ScriptedSite::new();
        let mut session = session(&site).await;

        let err = session
            .navigate("https://shop.test/missing", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::HttpStatus(404));
        assert!(session.current_url().is_none());
    }

    #[tokio::test]
    async fn test_missing_ready_selector() {
        let site = ScriptedSite::new();
        site.add_page(URL, "<p>captcha</p>");
        let mut session = session(&site).await;
        session.navigate(URL, Duration::from_secs(1)).await.unwrap();

        let err = session
            .wait_for("#productTitle", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_beyond_timeout() {
        let site = ScriptedSite::new();
        site.add_page(URL, "<p>slow</p>");
        site.set_latency(Duration::from_secs(30));
        let mut session = session(&site).await;

        let err = session
            .navigate(URL, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NavigationTimeout { timeout_ms: 5000, .. }));
    }
}
