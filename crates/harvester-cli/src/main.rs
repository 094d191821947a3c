//! Harvester CLI - resumable catalog scraping from the command line.

use clap::Parser;
use harvester_cli::commands;
use harvester_cli::{Cli, Command, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable in json and quiet modes
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let formatter = Formatter::new(cli.format.into(), !cli.no_color);

    if let Err(e) = run(cli, &formatter).await {
        eprintln!("{}", formatter.error(&e.to_string()));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, formatter: &Formatter) -> harvester_cli::Result<()> {
    match cli.command {
        Command::Run(args) => commands::execute_run(args, &cli.config, formatter).await,
        Command::Status(overrides) => commands::execute_status(overrides, &cli.config, formatter),
        Command::Init(args) => commands::execute_init(args, &cli.config, formatter),
    }
}
