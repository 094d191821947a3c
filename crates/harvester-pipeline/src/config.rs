//! Configuration for a harvesting run
//!
//! One TOML file describes where the catalog comes from, where results and
//! checkpoints go, how many sessions run and how the target site is read.

use crate::error::ConfigError;
use harvester_extractor::{DelayConfig, DelayRange, ExtractorConfig, RetryPolicy, TargetProfile, Timeouts};
use harvester_session::IdentityRotation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Upper bound on concurrent sessions
pub const MAX_CONCURRENCY: usize = 16;

/// Where the work catalog is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// CSV, TSV or spreadsheet path
    pub path: PathBuf,

    /// Column holding the business key
    pub key_column: String,

    /// Field delimiter for CSV input
    pub delimiter: char,

    /// Worksheet to read from a workbook (first sheet when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("catalog.csv"),
            key_column: "asin".to_string(),
            delimiter: ',',
            sheet: None,
        }
    }
}

/// Where results, checkpoints and failures are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output CSV table
    pub path: PathBuf,

    /// Checkpoint file; the extension picks the format
    /// (`.txt` lines, `.csv`, `.json`, `.db`/`.sqlite`)
    pub checkpoint: PathBuf,

    /// Header of a CSV checkpoint (defaults to the key column)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_column: Option<String>,

    /// JSON-lines log of items that exhausted their attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_log: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("results.csv"),
            checkpoint: PathBuf::from("checkpoint.csv"),
            checkpoint_column: None,
            failure_log: Some(PathBuf::from("failures.jsonl")),
        }
    }
}

/// Complete configuration for a run
///
/// # Examples
///
/// ```
/// use harvester_pipeline::HarvestConfig;
///
/// let config = HarvestConfig::default();
/// assert_eq!(config.concurrency, 3);
/// assert!(config.validate().is_ok());
///
/// let config = HarvestConfig::cautious();
/// assert!(config.concurrency < HarvestConfig::default().concurrency);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Sessions (and worker tasks) running at once
    pub concurrency: usize,

    /// Work catalog
    pub input: InputConfig,

    /// Result table, checkpoint and failure log
    pub output: OutputConfig,

    /// User agents and locales assigned to sessions
    pub identities: IdentityRotation,

    /// Randomized pauses
    pub delays: DelayConfig,

    /// Per-item retries
    pub retry: RetryPolicy,

    /// Navigation and selector bounds
    pub timeouts: Timeouts,

    /// What to fetch and how to read it
    pub target: TargetProfile,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            input: InputConfig::default(),
            output: OutputConfig::default(),
            identities: IdentityRotation::default(),
            delays: DelayConfig::default(),
            retry: RetryPolicy::default(),
            timeouts: Timeouts::default(),
            target: TargetProfile::default(),
        }
    }
}

impl HarvestConfig {
    /// Slow and patient: fewer sessions, longer pauses, more attempts
    ///
    /// For sites that start blocking at the default pace.
    pub fn cautious() -> Self {
        Self {
            concurrency: 2,
            delays: DelayConfig {
                pre_navigation: DelayRange::from_secs(5, 10),
                post_load: DelayRange::from_secs(6, 12),
                between_items: DelayRange::from_secs(5, 10),
            },
            retry: RetryPolicy {
                max_attempts: 4,
                backoff: DelayRange::from_secs(5, 15),
            },
            timeouts: Timeouts {
                navigation_ms: 60_000,
                selector_ms: 30_000,
            },
            ..Self::default()
        }
    }

    /// Faster pace for tolerant sites and small catalogs
    pub fn brisk() -> Self {
        Self {
            concurrency: 5,
            delays: DelayConfig {
                pre_navigation: DelayRange::from_secs(1, 3),
                post_load: DelayRange::from_secs(2, 4),
                between_items: DelayRange::from_secs(1, 3),
            },
            retry: RetryPolicy {
                max_attempts: 2,
                backoff: DelayRange::from_secs(1, 2),
            },
            ..Self::default()
        }
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate TOML; absent sections take their defaults
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write as TOML, refusing to overwrite unless `force`
    pub fn save(&self, path: impl AsRef<Path>, force: bool) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if path.exists() && !force {
            return Err(ConfigError::Invalid(format!(
                "{} already exists",
                path.display()
            )));
        }
        let contents = self.to_toml()?;
        fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Invalid(format!(
                "concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY, self.concurrency
            )));
        }
        if self.input.key_column.trim().is_empty() {
            return Err(ConfigError::Invalid("input.key_column is empty".into()));
        }
        if self.input.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("input.path is empty".into()));
        }
        if !self.input.delimiter.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "input.delimiter must be a single ASCII character, got '{}'",
                self.input.delimiter
            )));
        }
        if self.output.path.as_os_str().is_empty() || self.output.checkpoint.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "output.path and output.checkpoint are required".into(),
            ));
        }
        if self.output.path == self.output.checkpoint {
            return Err(ConfigError::Invalid(
                "output.path and output.checkpoint must differ".into(),
            ));
        }
        if self.identities.is_empty() {
            return Err(ConfigError::Invalid(
                "identities need at least one user agent and one locale".into(),
            ));
        }
        self.delays.validate().map_err(ConfigError::Invalid)?;
        self.extractor_config().validate().map_err(ConfigError::Invalid)?;
        self.target.validate()?;
        Ok(())
    }

    /// Engine settings carved out of this configuration
    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            retry: self.retry.clone(),
            timeouts: self.timeouts.clone(),
        }
    }

    /// Header used by a CSV checkpoint
    pub fn checkpoint_column(&self) -> &str {
        self.output
            .checkpoint_column
            .as_deref()
            .unwrap_or(&self.input.key_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarvestConfig::default();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.input.key_column, "asin");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.delays.between_items, DelayRange::from_secs(3, 7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let cautious = HarvestConfig::cautious();
        let brisk = HarvestConfig::brisk();

        assert!(cautious.validate().is_ok());
        assert!(brisk.validate().is_ok());
        assert!(cautious.delays.pre_navigation.min_ms > brisk.delays.pre_navigation.min_ms);
        assert!(cautious.retry.max_attempts > brisk.retry.max_attempts);
        assert!(brisk.concurrency > HarvestConfig::default().concurrency);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = HarvestConfig::cautious();
        let rendered = config.to_toml().unwrap();
        let parsed = HarvestConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = HarvestConfig::from_toml(
            r#"
            concurrency = 2

            [input]
            path = "supplier.csv"
            key_column = "EAN"
            delimiter = ";"
            "#,
        )
        .unwrap();

        assert_eq!(config.concurrency, 2);
        assert_eq!(config.input.delimiter, ';');
        assert_eq!(config.checkpoint_column(), "EAN");
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.target, TargetProfile::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = HarvestConfig::default();
        config.concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = HarvestConfig::default();
        config.delays.post_load = DelayRange::new(5_000, 1_000);
        assert!(config.validate().is_err());

        let mut config = HarvestConfig::default();
        config.identities.locales.clear();
        assert!(config.validate().is_err());

        let mut config = HarvestConfig::default();
        config.output.checkpoint = config.output.path.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let err = HarvestConfig::from_toml(
            r#"
            [target]
            url_template = "https://shop.test/{key}"

            [[target.fields]]
            name = "title"
            kind = "text"

            [[target.fields.strategies]]
            selector = "h1[["
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Profile(_)));
    }

    #[test]
    fn test_save_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvester.toml");

        HarvestConfig::default().save(&path, false).unwrap();
        assert!(HarvestConfig::default().save(&path, false).is_err());
        HarvestConfig::brisk().save(&path, true).unwrap();
        assert_eq!(HarvestConfig::from_file(&path).unwrap().concurrency, 5);
    }
}
