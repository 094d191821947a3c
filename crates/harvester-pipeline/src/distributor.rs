//! Work distributor: one worker task per session over a shared queue

use crate::error::PipelineError;
use crate::failures::FailureLog;
use crate::metrics::RunMetrics;
use harvester_domain::{CheckpointStore, WorkItem};
use harvester_extractor::{DelayConfig, DelayStage, FetchEngine, RateLimiter};
use harvester_session::Session;
use harvester_store::ResultSink;
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// FIFO of pending items; each pop hands an item to exactly one worker
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
}

impl WorkQueue {
    /// Queue holding `items` in order
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }

    /// Take the next item
    pub fn pop(&self) -> Option<WorkItem> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    /// Items not yet taken
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether every item has been taken
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the workers did
#[derive(Debug, Clone, Default)]
pub struct Distribution {
    /// Merged counters of every worker
    pub metrics: RunMetrics,
    /// Items never taken because the run stopped early
    pub unclaimed: usize,
}

struct Shared<C> {
    engine: Arc<FetchEngine>,
    sink: Arc<ResultSink<C>>,
    failures: Option<Arc<FailureLog>>,
    queue: WorkQueue,
    halted: AtomicBool,
}

/// Runs the workers until the queue drains or shutdown is requested
pub struct Distributor<C> {
    engine: Arc<FetchEngine>,
    sink: Arc<ResultSink<C>>,
    failures: Option<Arc<FailureLog>>,
    delays: DelayConfig,
}

impl<C> Distributor<C>
where
    C: CheckpointStore + Send + 'static,
    C::Error: Display,
{
    /// Distributor committing through `sink`
    pub fn new(engine: Arc<FetchEngine>, sink: Arc<ResultSink<C>>, delays: DelayConfig) -> Self {
        Self {
            engine,
            sink,
            failures: None,
            delays,
        }
    }

    /// Also append exhausted items to `log`
    pub fn with_failure_log(mut self, log: Arc<FailureLog>) -> Self {
        self.failures = Some(log);
        self
    }

    /// Process `items` with one worker per session
    ///
    /// Once `shutdown` turns `true` workers stop taking items; an item
    /// already in flight still finishes and commits. A commit failure stops
    /// every worker and is returned after they have all exited.
    pub async fn run<S>(
        &self,
        sessions: Vec<(usize, S)>,
        items: Vec<WorkItem>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Distribution, PipelineError>
    where
        S: Session + 'static,
    {
        let shared = Arc::new(Shared {
            engine: Arc::clone(&self.engine),
            sink: Arc::clone(&self.sink),
            failures: self.failures.clone(),
            queue: WorkQueue::new(items),
            halted: AtomicBool::new(false),
        });

        info!(
            "Distributing {} item(s) across {} worker(s)",
            shared.queue.len(),
            sessions.len()
        );

        let mut workers = JoinSet::new();
        for (index, session) in sessions {
            let shared = Arc::clone(&shared);
            let limiter = RateLimiter::new(self.delays.clone());
            let shutdown = shutdown.clone();
            workers.spawn(
                work(session, limiter, shared, shutdown).instrument(info_span!("worker", index)),
            );
        }

        let mut metrics = RunMetrics::new();
        let mut first_error: Option<PipelineError> = None;

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(worker_metrics)) => metrics.merge(&worker_metrics),
                Ok(Err(err)) => {
                    error!("Worker stopped: {}", err);
                    first_error.get_or_insert(err);
                }
                Err(join_error) => {
                    shared.halted.store(true, Ordering::SeqCst);
                    first_error.get_or_insert(PipelineError::Worker(join_error.to_string()));
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        Ok(Distribution {
            metrics,
            unclaimed: shared.queue.len(),
        })
    }
}

async fn work<S, C>(
    mut session: S,
    mut limiter: RateLimiter,
    shared: Arc<Shared<C>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<RunMetrics, PipelineError>
where
    S: Session,
    C: CheckpointStore + Send,
    C::Error: Display,
{
    let mut metrics = RunMetrics::new();
    debug!("Worker started as {}", session.identity().user_agent);

    loop {
        if *shutdown.borrow() {
            info!("Shutdown requested; worker stopping");
            break;
        }
        if shared.halted.load(Ordering::SeqCst) {
            break;
        }
        let Some(item) = shared.queue.pop() else {
            break;
        };

        match shared.engine.extract(&mut session, &mut limiter, &item).await {
            Ok(result) => {
                let outcome = match shared.sink.commit(&item, &result).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        shared.halted.store(true, Ordering::SeqCst);
                        return Err(err.into());
                    }
                };
                info!(
                    key = %item.key(),
                    "Committed {} field(s) after {} attempt(s) ({:?}, {} rows)",
                    result.fields.len(),
                    result.attempts,
                    outcome.change,
                    outcome.rows
                );
                metrics.record_success(result.attempts, result.fields.iter().map(|(name, _)| name.as_str()));
            }
            Err(failure) => {
                warn!(key = %failure.key, "{}", failure);
                if let Some(log) = &shared.failures {
                    if let Err(err) = log.record(&failure).await {
                        shared.halted.store(true, Ordering::SeqCst);
                        return Err(err);
                    }
                }
                metrics.record_failure(failure.attempts);
            }
        }

        if shared.queue.is_empty() {
            break;
        }

        tokio::select! {
            _ = limiter.pause(DelayStage::BetweenItems) => {}
            Ok(()) = shutdown.changed() => {}
        }
    }

    debug!("Worker finished: {} ok, {} failed", metrics.succeeded, metrics.failed);
    Ok(metrics)
}
