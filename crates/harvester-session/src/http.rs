//! HTTP-backed session
//!
//! Navigation is a GET carrying the session's identity headers; cookies set
//! by the site are kept for the session's lifetime. The response body is
//! parsed once into the page every later `wait_for` and `read` looks at.

use crate::page::Page;
use crate::pool::SessionFactory;
use crate::{Session, SessionError};
use async_trait::async_trait;
use harvester_domain::SessionIdentity;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, warn};

/// Session that fetches pages over HTTP
pub struct HttpSession {
    client: Client,
    identity: SessionIdentity,
    page: Option<Page>,
}

impl HttpSession {
    /// Build a session whose every request carries `identity`
    pub fn new(identity: SessionIdentity) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        for (name, value) in identity.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SessionError::InvalidIdentity(format!("{}: {}", name, e)))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| SessionError::InvalidIdentity(format!("{}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .build()
            .map_err(|e| SessionError::Network(e.to_string()))?;

        Ok(Self {
            client,
            identity,
            page: None,
        })
    }

    async fn fetch(&self, url: Url) -> Result<(String, String), SessionError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        ) {
            return Err(SessionError::Blocked(status.as_u16()));
        }
        if !status.is_success() {
            return Err(SessionError::HttpStatus(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(classify)?;
        Ok((final_url, body))
    }
}

fn classify(err: reqwest::Error) -> SessionError {
    SessionError::Network(err.to_string())
}

#[async_trait]
impl Session for HttpSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError> {
        let parsed = Url::parse(url).map_err(|e| SessionError::InvalidUrl(format!("{}: {}", url, e)))?;

        // The previous page is gone once a new navigation starts
        self.page = None;

        let (final_url, body) = tokio::time::timeout(timeout, self.fetch(parsed))
            .await
            .map_err(|_| SessionError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })??;

        debug!("Loaded {} ({} bytes)", final_url, body.len());
        self.page = Some(Page::parse(final_url, &body));
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), SessionError> {
        let page = self.page.as_ref().ok_or(SessionError::NotLoaded)?;
        if page.contains(selector)? {
            return Ok(());
        }

        // A fetched document does not change; absence now is absence for good
        warn!("Ready selector '{}' missing on {}", selector, page.url());
        Err(SessionError::SelectorTimeout {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
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

/// Factory for [`HttpSession`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpSessionFactory;

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    type Session = HttpSession;

    async fn create(&self, _index: usize, identity: SessionIdentity) -> Result<HttpSession, SessionError> {
        HttpSession::new(identity)
    }
}
