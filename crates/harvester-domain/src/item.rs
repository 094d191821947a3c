//! Work item module - the unit of scraping work

/// One catalog entry to be scraped
///
/// A work item is identified by its business key (for example an ASIN) and
/// carries the remaining input columns as ordered metadata. The metadata is
/// used to expand URL templates and is re-attached to the output row.
/// Work items are immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    key: String,
    metadata: Vec<(String, String)>,
}

impl WorkItem {
    /// Create a work item with no metadata
    ///
    /// # Examples
    ///
    /// ```
    /// use harvester_domain::WorkItem;
    ///
    /// let item = WorkItem::new("B000123");
    /// assert_eq!(item.key(), "B000123");
    /// assert!(item.metadata().is_empty());
    /// ```
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            metadata: Vec::new(),
        }
    }

    /// Create a work item with ordered metadata columns
    pub fn with_metadata(key: impl Into<String>, metadata: Vec<(String, String)>) -> Self {
        Self {
            key: key.into(),
            metadata,
        }
    }

    /// The business key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Metadata columns in input order
    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// Look up a metadata value by column name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Expand a URL template for this item
    ///
    /// `{key}` is replaced by the business key and `{column}` by the value of
    /// the metadata column with that name. Unknown placeholders are left as-is.
    ///
    /// # Examples
    ///
    /// ```
    /// use harvester_domain::WorkItem;
    ///
    /// let item = WorkItem::with_metadata(
    ///     "B000123",
    ///     vec![("sku".to_string(), "SKU-9".to_string())],
    /// );
    /// assert_eq!(
    ///     item.expand("https://shop.example/dp/{key}?ref={sku}"),
    ///     "https://shop.example/dp/B000123?ref=SKU-9"
    /// );
    /// ```
    pub fn expand(&self, template: &str) -> String {
        let mut url = template.replace("{key}", &self.key);
        for (name, value) in &self.metadata {
            let placeholder = format!("{{{}}}", name);
            if url.contains(&placeholder) {
                url = url.replace(&placeholder, value);
            }
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_lookup() {
        let item = WorkItem::with_metadata(
            "K1",
            vec![
                ("sku".to_string(), "A".to_string()),
                ("price".to_string(), "10".to_string()),
            ],
        );

        assert_eq!(item.get("sku"), Some("A"));
        assert_eq!(item.get("price"), Some("10"));
        assert_eq!(item.get("missing"), None);
    }

    #[test]
    fn test_expand_leaves_unknown_placeholders() {
        let item = WorkItem::new("K1");
        assert_eq!(item.expand("https://x/{key}/{other}"), "https://x/K1/{other}");
    }

    #[test]
    fn test_expand_repeated_key() {
        let item = WorkItem::new("K1");
        assert_eq!(item.expand("{key}-{key}"), "K1-K1");
    }
}
