// ── Load engine ──
//
// Runs a fixed number of independent transfers over a bounded pool of
// worker tasks and aggregates the outcomes. Workers pull request indices
// from a shared counter in submission order; each transfer runs in its own
// spawned task so a panic stays contained and becomes an `error` result.
// Completions flow through one mpsc channel that the engine drains exactly
// `total_requests` times.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use routerbench_api::{
    Pattern, RouterClient, Transfer, TransferOptions, TransferResult, TransportConfig,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, warn};
use url::Url;

use crate::config::LoadTestConfig;
use crate::error::CoreError;
use crate::stats::{LoadTestSummary, summarize};

// ── Client factory ───────────────────────────────────────────────────

/// Produces one client per transfer. Clients are never shared between
/// operations so no measurement rides on another's warm connection.
pub trait TransferFactory: Send + Sync + 'static {
    type Client: Transfer + 'static;

    fn create(&self) -> Result<Self::Client, routerbench_api::Error>;
}

/// Builds a fresh [`RouterClient`] for every operation.
#[derive(Debug, Clone)]
pub struct RouterTransferFactory {
    base_url: Url,
    transport: TransportConfig,
    options: TransferOptions,
}

impl RouterTransferFactory {
    pub fn new(base_url: Url, transport: TransportConfig, options: TransferOptions) -> Self {
        Self {
            base_url,
            transport,
            options,
        }
    }
}

impl TransferFactory for RouterTransferFactory {
    type Client = RouterClient;

    fn create(&self) -> Result<RouterClient, routerbench_api::Error> {
        RouterClient::new(self.base_url.clone(), &self.transport, self.options.clone())
    }
}

// ── Run state ────────────────────────────────────────────────────────

/// Lifecycle of a run, observable through [`LoadEngine::phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Configured,
    Running,
    Aggregating,
    Done,
}

/// Snapshot handed to the progress observer after every completion.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub completed: usize,
    pub total: usize,
    pub last: &'a TransferResult,
}

type ProgressObserver = Arc<dyn Fn(Progress<'_>) + Send + Sync>;

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub summary: LoadTestSummary,
    /// Results in completion order.
    pub results: Vec<TransferResult>,
}

// ── LoadEngine ───────────────────────────────────────────────────────

pub struct LoadEngine<F: TransferFactory> {
    config: Arc<LoadTestConfig>,
    factory: Arc<F>,
    phase: watch::Sender<LoadPhase>,
    cancel: CancellationToken,
    span: Span,
    observer: Option<ProgressObserver>,
}

impl<F: TransferFactory> LoadEngine<F> {
    /// Validate `config` and prepare a run. Nothing is sent until
    /// [`run`](Self::run).
    pub fn new(config: LoadTestConfig, factory: F) -> Result<Self, CoreError> {
        config.validate()?;
        let (phase, _) = watch::channel(LoadPhase::Configured);
        Ok(Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
            phase,
            cancel: CancellationToken::new(),
            span: Span::none(),
            observer: None,
        })
    }

    /// Log progress inside `span` instead of the current one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Stop the run when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Call `observer` after every completion.
    pub fn on_progress(mut self, observer: impl Fn(Progress<'_>) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &LoadTestConfig {
        &self.config
    }

    /// Subscribe to phase changes.
    pub fn phase(&self) -> watch::Receiver<LoadPhase> {
        self.phase.subscribe()
    }

    /// Execute the run and aggregate it.
    ///
    /// Returns [`CoreError::Interrupted`] if the cancellation token fires
    /// first. Workers then stop taking new indices; transfers already in
    /// flight are left to finish on their own.
    pub async fn run(&self) -> Result<LoadReport, CoreError> {
        let total = self.config.total_requests;
        let workers = self.config.worker_count();
        let step = (total / 10).max(1);

        info!(
            parent: &self.span,
            total,
            concurrency = self.config.concurrency,
            pattern = %self.config.pattern,
            dataset = %self.config.dataset_name,
            "starting load test"
        );

        let (tx, mut rx) = mpsc::channel::<TransferResult>(total);
        let next = Arc::new(AtomicUsize::new(0));
        self.phase.send_replace(LoadPhase::Running);
        let started = Instant::now();

        for worker in 0..workers {
            let task = worker_loop(
                Arc::clone(&self.config),
                Arc::clone(&self.factory),
                Arc::clone(&next),
                tx.clone(),
                self.cancel.clone(),
            );
            tokio::spawn(task.instrument(self.span.clone()));
            debug!(parent: &self.span, worker, "worker started");
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while results.len() < total {
            let received = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    warn!(parent: &self.span, completed = results.len(), total, "load test interrupted");
                    return Err(CoreError::Interrupted { completed: results.len(), total });
                }
                received = rx.recv() => received,
            };
            let Some(result) = received else {
                break;
            };
            results.push(result);

            let completed = results.len();
            if let (Some(observer), Some(last)) = (&self.observer, results.last()) {
                observer(Progress {
                    completed,
                    total,
                    last,
                });
            }
            if completed % step == 0 {
                info!(parent: &self.span, completed, total, "progress");
            }
        }
        let wall_clock = started.elapsed();

        self.phase.send_replace(LoadPhase::Aggregating);
        let summary = summarize(&results, wall_clock);
        self.phase.send_replace(LoadPhase::Done);

        info!(
            parent: &self.span,
            successful = summary.successful_requests,
            failed = summary.failed_requests,
            duration_secs = summary.duration_secs,
            "load test finished"
        );
        Ok(LoadReport { summary, results })
    }
}

/// Pull indices until the run is exhausted, cancelled, or nobody listens.
async fn worker_loop<F: TransferFactory>(
    config: Arc<LoadTestConfig>,
    factory: Arc<F>,
    next: Arc<AtomicUsize>,
    tx: mpsc::Sender<TransferResult>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        let index = next.fetch_add(1, Ordering::Relaxed);
        if index >= config.total_requests {
            break;
        }
        let pattern = config.pattern.pattern_for(index);
        let request = config.transfer_request();

        let op = tokio::spawn(
            run_one(Arc::clone(&factory), pattern, request).instrument(Span::current()),
        );
        let result = match op.await {
            Ok(result) => result,
            Err(e) => {
                warn!(index, error = %e, "transfer task failed");
                let mut failed = TransferResult::failed(format!("transfer task failed: {e}"));
                failed.pattern = Some(pattern);
                failed
            }
        };

        if tx.send(result).await.is_err() {
            break;
        }
    }
}

async fn run_one<F: TransferFactory>(
    factory: Arc<F>,
    pattern: Pattern,
    request: routerbench_api::TransferRequest,
) -> TransferResult {
    match factory.create() {
        Ok(client) => client.transfer(pattern, &request).await,
        Err(e) => {
            let mut failed = TransferResult::failed(e.to_string());
            failed.pattern = Some(pattern);
            failed
        }
    }
}
