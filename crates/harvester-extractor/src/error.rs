//! Error types for the Extractor

use thiserror::Error;

/// Errors raised while loading or validating a target profile
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Profile content violates a constraint
    #[error("Invalid profile: {0}")]
    Invalid(String),

    /// A field's regex does not compile
    #[error("Field '{field}' has an invalid pattern: {source}")]
    Pattern {
        /// Field name
        field: String,
        /// Regex compile error
        source: regex::Error,
    },

    /// A strategy's CSS selector does not parse
    #[error("Field '{field}' has an invalid selector '{selector}'")]
    Selector {
        /// Field name
        field: String,
        /// Offending selector
        selector: String,
    },

    /// TOML could not be parsed or produced
    #[error("Profile TOML error: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ProfileError {
    fn from(e: toml::de::Error) -> Self {
        ProfileError::Toml(e.to_string())
    }
}

impl From<toml::ser::Error> for ProfileError {
    fn from(e: toml::ser::Error) -> Self {
        ProfileError::Toml(e.to_string())
    }
}
