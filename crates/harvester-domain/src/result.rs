//! Extraction outcomes - what a fetch produces for one work item

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in seconds
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A normalized value extracted for one field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Trimmed free text
    Text(String),

    /// Numeric value with locale separators already resolved
    Number(f64),

    /// Ordered list of values (image URLs, for instance)
    List(Vec<String>),

    /// Boolean condition (availability, for instance)
    Flag(bool),
}

impl FieldValue {
    /// Render the value as table cells
    ///
    /// Scalars produce a single `(name, value)` cell. Lists are flattened
    /// into `name1`, `name2`, ... columns, one per element.
    ///
    /// # Examples
    ///
    /// ```
    /// use harvester_domain::FieldValue;
    ///
    /// let cells = FieldValue::Number(19.99).cells("price");
    /// assert_eq!(cells, vec![("price".to_string(), "19.99".to_string())]);
    ///
    /// let cells = FieldValue::List(vec!["a".into(), "b".into()]).cells("image");
    /// assert_eq!(cells[1], ("image2".to_string(), "b".to_string()));
    /// ```
    pub fn cells(&self, name: &str) -> Vec<(String, String)> {
        match self {
            FieldValue::List(values) => values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("{}{}", name, i + 1), v.clone()))
                .collect(),
            scalar => vec![(name.to_string(), scalar.to_string())],
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::List(values) => write!(f, "{}", values.join("; ")),
            FieldValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

/// Fields extracted from one work item's page
///
/// Produced on a successful or partially-successful fetch. Optional fields
/// whose selectors found nothing are simply absent from `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Business key of the work item
    pub key: String,

    /// Extracted fields in profile order
    pub fields: Vec<(String, FieldValue)>,

    /// When the extraction finished (unix seconds)
    pub extracted_at: u64,

    /// Number of attempts it took (1 on first-try success)
    pub attempts: u32,

    /// URL the fields were read from
    pub source_url: String,
}

impl ExtractionResult {
    /// Create an empty result for a key
    pub fn new(key: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: Vec::new(),
            extracted_at: current_timestamp(),
            attempts: 1,
            source_url: source_url.into(),
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Whether no field could be extracted
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A work item that exhausted its attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    /// Business key of the work item
    pub key: String,

    /// Attempts made before giving up
    pub attempts: u32,

    /// Last error observed
    pub reason: String,
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after {} attempt(s): {}",
            self.key, self.attempts, self.reason
        )
    }
}
