//! Configuration loading for the CLI.

use crate::cli::Overrides;
use crate::error::{CliError, Result};
use harvester_pipeline::HarvestConfig;
use std::path::Path;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

/// Load the configuration file and apply command-line overrides.
///
/// A missing file is an error; `harvester init` creates one.
pub fn load(path: &Path, overrides: &Overrides, concurrency: Option<usize>) -> Result<HarvestConfig> {
    if !path.exists() {
        return Err(CliError::Config(format!(
            "{} not found. Run 'harvester init' to create it.",
            path.display()
        )));
    }

    let mut config = HarvestConfig::from_file(path)?;
    apply(&mut config, overrides, concurrency);
    config.validate()?;
    Ok(config)
}

/// Apply overrides in place.
pub fn apply(config: &mut HarvestConfig, overrides: &Overrides, concurrency: Option<usize>) {
    if let Some(input) = &overrides.input {
        config.input.path = input.clone();
    }
    if let Some(output) = &overrides.output {
        config.output.path = output.clone();
    }
    if let Some(checkpoint) = &overrides.checkpoint {
        config.output.checkpoint = checkpoint.clone();
    }
    if let Some(key_column) = &overrides.key_column {
        config.input.key_column = key_column.clone();
    }
    if let Some(concurrency) = concurrency {
        config.concurrency = concurrency;
    }
}
