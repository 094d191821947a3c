//! Run command implementation.

use crate::cli::RunArgs;
use crate::config;
use crate::error::Result;
use crate::output::Formatter;
use harvester_pipeline::Harvester;
use harvester_session::HttpSessionFactory;
use std::path::Path;
use tokio::sync::watch;
use tracing::{info, warn};

/// Execute the run command.
///
/// The first Ctrl+C asks the workers to stop taking new items. A second one
/// exits at once; unrecorded items are fetched again on the next run.
pub async fn execute_run(args: RunArgs, path: &Path, formatter: &Formatter) -> Result<()> {
    let config = config::load(path, &args.overrides, args.concurrency)?;
    let harvester = Harvester::new(config)?;

    if args.dry_run {
        let plan = harvester.plan()?;
        println!("{}", formatter.format_plan(&plan, harvester.config())?);
        if !formatter.is_quiet() {
            println!("{}", formatter.info("Dry run: nothing was fetched"));
        }
        return Ok(());
    }

    let (stop, shutdown) = watch::channel(false);
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Shutdown signal received; finishing in-flight items");
        let _ = stop.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second signal received; exiting without waiting");
            std::process::exit(130);
        }
    });

    let report = harvester.run(&HttpSessionFactory, shutdown).await;
    signal.abort();
    let report = report?;

    info!("Run {} done", report.run_id);
    println!("{}", formatter.format_report(&report)?);
    Ok(())
}
