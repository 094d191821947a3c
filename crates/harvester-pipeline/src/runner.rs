//! Harvester: wires loader, checkpoint, pool, engine and sink into a run

use crate::config::HarvestConfig;
use crate::distributor::Distributor;
use crate::error::{ConfigError, PipelineError};
use crate::failures::FailureLog;
use crate::loader::CatalogLoader;
use crate::metrics::RunMetrics;
use harvester_domain::{CheckpointStore, WorkItem};
use harvester_extractor::FetchEngine;
use harvester_session::{SessionFactory, SessionPool};
use harvester_store::{AnyCheckpoint, OutputTable, ResultSink};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// What a run would do, computed without fetching anything
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Distinct items in the input
    pub total: usize,
    /// Items already checkpointed
    pub completed: usize,
    /// Items still to fetch, in processing order
    pub pending: Vec<WorkItem>,
    /// Rows already in the output table
    pub output_rows: usize,
    /// Keys in the checkpoint (may include keys no longer in the input)
    pub checkpointed: usize,
    /// Checkpoint backend in use
    pub checkpoint_kind: &'static str,
}

/// Outcome of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// UUIDv7 identifying the run in logs
    pub run_id: String,
    /// Items pending when the run started
    pub pending: usize,
    /// Counters
    pub metrics: RunMetrics,
    /// Rows in the output table afterwards
    pub output_rows: usize,
    /// Keys in the checkpoint afterwards
    pub checkpointed: usize,
    /// Items left untouched because shutdown was requested
    pub unclaimed: usize,
    /// Whether shutdown was requested during the run
    pub interrupted: bool,
}

impl RunReport {
    /// Whether every pending item was either committed or logged as failed
    pub fn is_complete(&self) -> bool {
        self.unclaimed == 0 && self.metrics.processed() == self.pending
    }
}

/// Entry point for harvesting runs
pub struct Harvester {
    config: HarvestConfig,
}

impl Harvester {
    /// Harvester over a validated configuration
    pub fn new(config: HarvestConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    fn open_checkpoint(&self) -> Result<AnyCheckpoint, PipelineError> {
        Ok(AnyCheckpoint::open(
            &self.config.output.checkpoint,
            self.config.checkpoint_column(),
        )?)
    }

    fn open_table(&self) -> Result<OutputTable, PipelineError> {
        Ok(OutputTable::open(
            &self.config.output.path,
            &self.config.input.key_column,
        )?)
    }

    /// Load the input and checkpoint and report what is left to do
    ///
    /// Nothing is fetched and nothing is written.
    pub fn plan(&self) -> Result<RunPlan, PipelineError> {
        let checkpoint = self.open_checkpoint()?;
        let completed = checkpoint.load_all()?;

        let catalog = CatalogLoader::from_config(&self.config.input).load(&self.config.input.path, &completed)?;

        let output_rows = if Path::new(&self.config.output.path).exists() {
            self.open_table()?.len()
        } else {
            0
        };

        Ok(RunPlan {
            total: catalog.total(),
            completed: catalog.completed,
            pending: catalog.pending,
            output_rows,
            checkpointed: completed.len(),
            checkpoint_kind: checkpoint.kind(),
        })
    }

    /// Process every pending item with sessions from `factory`
    ///
    /// Returns once the queue is drained or, after `shutdown` turns `true`,
    /// once in-flight items have committed.
    ///
    /// # Errors
    ///
    /// Structural failures only: unreadable input or checkpoint, unwritable
    /// output, a session pool that cannot be built. Items that fail to
    /// extract are counted in the report instead.
    pub async fn run<F>(&self, factory: &F, shutdown: watch::Receiver<bool>) -> Result<RunReport, PipelineError>
    where
        F: SessionFactory,
        F::Session: 'static,
    {
        let run_id = Uuid::now_v7().to_string();
        let span = info_span!("run", run_id = %run_id);
        self.run_inner(run_id, factory, shutdown).instrument(span).await
    }

    async fn run_inner<F>(
        &self,
        run_id: String,
        factory: &F,
        shutdown: watch::Receiver<bool>,
    ) -> Result<RunReport, PipelineError>
    where
        F: SessionFactory,
        F::Session: 'static,
    {
        let started = Instant::now();
        let config = &self.config;

        let checkpoint = self.open_checkpoint()?;
        let completed = checkpoint.load_all()?;
        info!(
            "Checkpoint {} ({}) holds {} key(s)",
            config.output.checkpoint.display(),
            checkpoint.kind(),
            completed.len()
        );

        let catalog = CatalogLoader::from_config(&config.input).load(&config.input.path, &completed)?;
        let total = catalog.total();
        let pending = catalog.pending;

        let mut metrics = RunMetrics::new();
        metrics.record_skipped(catalog.completed);
        let pending_count = pending.len();

        let table = self.open_table()?;
        let sink = Arc::new(ResultSink::new(table, checkpoint));

        if pending.is_empty() {
            info!("Nothing to do: all {} item(s) are checkpointed", total);
            metrics.runtime = started.elapsed();
            let interrupted = *shutdown.borrow();
            return Ok(RunReport {
                run_id,
                pending: 0,
                metrics,
                output_rows: sink.row_count().await,
                checkpointed: sink.checkpoint_len().await,
                unclaimed: 0,
                interrupted,
            });
        }

        let engine = FetchEngine::new(config.target.clone(), config.extractor_config())
            .map_err(ConfigError::from)?;

        let size = config.concurrency.min(pending_count);
        let mut pool = SessionPool::open(factory, size, &config.identities).await?;

        let mut distributor = Distributor::new(Arc::new(engine), Arc::clone(&sink), config.delays.clone());
        if let Some(path) = &config.output.failure_log {
            distributor = distributor.with_failure_log(Arc::new(FailureLog::open(path)?));
        }

        info!("Starting run over {} pending item(s)", pending_count);
        let distribution = distributor
            .run(pool.acquire_all(), pending, shutdown.clone())
            .await?;

        metrics.merge(&distribution.metrics);
        metrics.runtime = started.elapsed();
        let interrupted = *shutdown.borrow();

        let report = RunReport {
            run_id,
            pending: pending_count,
            metrics,
            output_rows: sink.row_count().await,
            checkpointed: sink.checkpoint_len().await,
            unclaimed: distribution.unclaimed,
            interrupted,
        };

        info!("Run finished:\n{}", report.metrics.summary());
        Ok(report)
    }
}
