//! A loaded document, parsed once per navigation

use crate::SessionError;
use scraper::{Html, Selector};
use std::sync::{Mutex, MutexGuard};

/// Every match of `selector` in `html`: trimmed text, or the raw `attribute` value
///
/// Elements lacking the attribute are skipped. Parses `html` on every call;
/// sessions go through [`Page`] instead.
pub fn select_values(html: &str, selector: &str, attribute: Option<&str>) -> Result<Vec<String>, SessionError> {
    select_in(&Html::parse_document(html), selector, attribute)
}

fn select_in(document: &Html, selector: &str, attribute: Option<&str>) -> Result<Vec<String>, SessionError> {
    let parsed = Selector::parse(selector)
        .map_err(|e| SessionError::InvalidSelector(format!("{}: {:?}", selector, e)))?;

    let values = document
        .select(&parsed)
        .filter_map(|element| match attribute {
            Some(attr) => element.value().attr(attr).map(String::from),
            None => Some(element.text().collect::<String>().trim().to_string()),
        })
        .collect();

    Ok(values)
}

/// The document a session is looking at
///
/// The DOM is built when the page is loaded and shared by every later
/// `wait_for` and `read` until the next navigation.
pub(crate) struct Page {
    url: String,
    document: Mutex<Html>,
}

impl Page {
    pub(crate) fn parse(url: impl Into<String>, body: &str) -> Self {
        Self {
            url: url.into(),
            document: Mutex::new(Html::parse_document(body)),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn select(&self, selector: &str, attribute: Option<&str>) -> Result<Vec<String>, SessionError> {
        select_in(&self.document(), selector, attribute)
    }

    pub(crate) fn contains(&self, selector: &str) -> Result<bool, SessionError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| SessionError::InvalidSelector(format!("{}: {:?}", selector, e)))?;
        Ok(self.document().select(&parsed).next().is_some())
    }

    fn document(&self) -> MutexGuard<'_, Html> {
        self.document.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
