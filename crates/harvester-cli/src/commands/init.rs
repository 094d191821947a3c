//! Init command implementation.

use crate::cli::InitArgs;
use crate::error::Result;
use crate::output::Formatter;
use harvester_pipeline::HarvestConfig;
use std::path::Path;

/// Execute the init command.
pub fn execute_init(args: InitArgs, path: &Path, formatter: &Formatter) -> Result<()> {
    let config: HarvestConfig = args.preset.into();
    config.save(path, args.force)?;

    if !formatter.is_quiet() {
        println!(
            "{}",
            formatter.success(&format!("Wrote {:?} configuration to {}", args.preset, path.display()))
        );
        println!(
            "{}",
            formatter.info("Edit [input] and [target] before the first run")
        );
    }
    Ok(())
}
