//! CLI command definitions and argument parsing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Harvester - resumable catalog scraping.
#[derive(Debug, Parser)]
#[command(name = "harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    pub format: CliFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "HARVESTER_CONFIG", default_value = "harvester.toml")]
    pub config: PathBuf,

    /// Log per-step detail (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (counts only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process every pending catalog item
    Run(RunArgs),

    /// Show checkpoint, output and pending counts
    Status(Overrides),

    /// Write a starter configuration file
    Init(InitArgs),
}

/// Settings that override the configuration file.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Input catalog (CSV, TSV or spreadsheet)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output CSV table
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Checkpoint file (.txt, .csv, .json or .db)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Key column of the input
    #[arg(short, long)]
    pub key_column: Option<String>,
}

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub overrides: Overrides,

    /// Number of concurrent sessions
    #[arg(short = 'n', long)]
    pub concurrency: Option<usize>,

    /// Validate and report the pending count without fetching
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the init command.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Starting point for the generated file
    #[arg(short, long, value_enum, default_value = "default")]
    pub preset: PresetArg,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetArg {
    /// Balanced pacing, three sessions
    Default,
    /// Longer pauses, two sessions, more retries
    Cautious,
    /// Shorter pauses, five sessions
    Brisk,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<PresetArg> for harvester_pipeline::HarvestConfig {
    fn from(preset: PresetArg) -> Self {
        match preset {
            PresetArg::Default => harvester_pipeline::HarvestConfig::default(),
            PresetArg::Cautious => harvester_pipeline::HarvestConfig::cautious(),
            PresetArg::Brisk => harvester_pipeline::HarvestConfig::brisk(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from([
            "harvester",
            "run",
            "--input",
            "catalog.csv",
            "-n",
            "2",
            "--dry-run",
        ]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.overrides.input, Some(PathBuf::from("catalog.csv")));
                assert_eq!(args.concurrency, Some(2));
                assert!(args.dry_run);
            }
            _ => panic!("Expected Run command"),
        }
        assert_eq!(cli.format, CliFormat::Table);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["harvester", "status", "-f", "json", "-c", "other.toml", "-v"]);
        assert_eq!(cli.format, CliFormat::Json);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Status(_)));
    }

    #[test]
    fn test_init_preset() {
        let cli = Cli::parse_from(["harvester", "init", "--preset", "cautious", "--force"]);
        match cli.command {
            Command::Init(args) => {
                assert_eq!(args.preset, PresetArg::Cautious);
                assert!(args.force);
            }
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_preset_conversion() {
        let config: harvester_pipeline::HarvestConfig = PresetArg::Brisk.into();
        assert_eq!(config.concurrency, 5);
    }
}
