//! Status command implementation.

use crate::cli::Overrides;
use crate::config;
use crate::error::Result;
use crate::output::Formatter;
use harvester_pipeline::Harvester;
use std::path::Path;

/// Execute the status command.
pub fn execute_status(overrides: Overrides, path: &Path, formatter: &Formatter) -> Result<()> {
    let config = config::load(path, &overrides, None)?;
    let harvester = Harvester::new(config)?;
    let plan = harvester.plan()?;

    println!("{}", formatter.format_plan(&plan, harvester.config())?);
    Ok(())
}
