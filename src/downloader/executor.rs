//! Run orchestration: catalog resolution, task execution and summary

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::job::{expand_tasks, DatasetTask, DownloadOutcome, ServerDatasets, TaskStatus};
use super::limiter::ServerLimiter;
use super::retry::{Delay, FetchFailure, RetryExecutor, TokioDelay};
use super::{DownloadError, RunConfig};
use crate::fetcher::request::build_catalog_url;
use crate::fetcher::{CatalogEntry, DatasetCatalog, FetcherError, Transport};
use crate::metrics;
use crate::output::{artifact_exists, write_payload, FailureLedger, FailureRecord};
use crate::server::ServerEndpoint;
use crate::shutdown::{SharedShutdown, ShutdownCoordinator};

/// Dataset id used for ledger rows of failed catalog fetches
const CATALOG_DATASET_ID: &str = "allDatasets";

/// Outcome counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Payloads written
    pub succeeded: u64,
    /// Targets already present
    pub skipped: u64,
    /// Tasks that ended FAILED (catalog failures included)
    pub failed: u64,
    /// Tasks never started because the run was cancelled
    pub not_started: u64,
}

impl RunSummary {
    /// Whether any task failed
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Total number of outcomes
    pub fn total(&self) -> u64 {
        self.succeeded + self.skipped + self.failed + self.not_started
    }
}

/// Everything a caller gets back from a run
#[derive(Debug)]
pub struct RunReport {
    /// Aggregate counts
    pub summary: RunSummary,
    /// One outcome per task, in completion order
    pub outcomes: Vec<DownloadOutcome>,
    /// Where failures were recorded
    pub ledger_path: PathBuf,
    /// Whether cancellation was requested during the run
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct SummaryCounters {
    succeeded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    not_started: AtomicU64,
}

impl SummaryCounters {
    fn record(&self, status: TaskStatus) {
        let counter = match status {
            TaskStatus::Success => &self.succeeded,
            TaskStatus::Skipped => &self.skipped,
            TaskStatus::Failed => &self.failed,
            TaskStatus::NotStarted => &self.not_started,
            TaskStatus::Pending | TaskStatus::InProgress => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RunSummary {
        RunSummary {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            not_started: self.not_started.load(Ordering::Relaxed),
        }
    }
}

/// Per-run state shared by every task
struct RunContext {
    downloads_folder: PathBuf,
    skip_existing: bool,
    run_started: DateTime<Utc>,
    ledger: Arc<FailureLedger>,
    executor: RetryExecutor,
    limiter: ServerLimiter,
    counters: SummaryCounters,
    shutdown: SharedShutdown,
    progress: Option<ProgressBar>,
}

impl RunContext {
    /// Count, log and (for failures) record an outcome
    async fn finish(&self, outcome: DownloadOutcome) -> DownloadOutcome {
        self.counters.record(outcome.status);
        metrics::record_task(outcome.status);

        match outcome.status {
            TaskStatus::Success => info!(
                bytes = outcome.bytes.unwrap_or(0),
                attempts = outcome.attempts,
                "Downloaded {}",
                outcome.task
            ),
            TaskStatus::Skipped => debug!("Skipped {}, target already exists", outcome.task),
            TaskStatus::NotStarted => debug!("Not started {}, run cancelled", outcome.task),
            TaskStatus::Failed => {
                let cause = outcome.cause.clone().unwrap_or_default();
                warn!(
                    attempts = outcome.attempts,
                    cause = %cause,
                    "Failed {}",
                    outcome.task
                );
                self.record_failure(&outcome.task, cause).await;
            }
            TaskStatus::Pending | TaskStatus::InProgress => {}
        }

        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
        outcome
    }

    /// Append a ledger row off the async workers; a ledger error is only logged
    async fn record_failure(&self, task: &DatasetTask, cause: String) {
        let record = FailureRecord {
            time: self.run_started,
            erddap_url: task.server.root_url().to_string(),
            dataset_id: task.dataset_id.clone(),
            dataset_type: task.dataset_type,
            format: task.format.clone(),
            error: cause,
        };
        let ledger = self.ledger.clone();
        let written = tokio::task::spawn_blocking(move || ledger.record(&record)).await;
        let err = match written {
            Ok(Ok(())) => return,
            Ok(Err(e)) => DownloadError::LedgerWriteError(e.to_string()),
            Err(e) => DownloadError::LedgerWriteError(format!("ledger task failed: {e}")),
        };
        error!(ledger = %self.ledger.path().display(), "{}", err);
    }

    async fn sync_ledger(&self) {
        let ledger = self.ledger.clone();
        let synced = tokio::task::spawn_blocking(move || ledger.sync()).await;
        let err = match synced {
            Ok(Ok(())) => return,
            Ok(Err(e)) => DownloadError::LedgerWriteError(e.to_string()),
            Err(e) => DownloadError::LedgerWriteError(format!("ledger task failed: {e}")),
        };
        error!(ledger = %self.ledger.path().display(), "{}", err);
    }
}

/// Top-level driver for one download run
pub struct DownloadOrchestrator {
    config: RunConfig,
    transport: Arc<dyn Transport>,
    delay: Arc<dyn Delay>,
    shutdown: SharedShutdown,
    progress: Option<ProgressBar>,
}

impl DownloadOrchestrator {
    /// Orchestrator over `transport` with real delays and a private shutdown handle
    pub fn new(config: RunConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            delay: Arc::new(TokioDelay),
            shutdown: ShutdownCoordinator::shared(),
            progress: None,
        }
    }

    /// Replace the delay used between attempts
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Share a cancellation handle with the caller
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Advance `progress` once per finished task
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Configuration of this run
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute the run to completion
    ///
    /// # Errors
    ///
    /// Only [`DownloadError::ConfigurationError`] is returned; every per-task
    /// failure is reported through [`RunReport`] and the ledger instead.
    pub async fn run(&self) -> Result<RunReport, DownloadError> {
        let servers = self.config.validate()?;

        let ctx = RunContext {
            downloads_folder: self.config.downloads_folder.clone(),
            skip_existing: self.config.skip_existing,
            run_started: Utc::now(),
            ledger: Arc::new(FailureLedger::in_folder(&self.config.downloads_folder)),
            executor: RetryExecutor::new(self.transport.clone())
                .with_policy(self.config.retry.clone())
                .with_attempt_timeout(self.config.attempt_timeout)
                .with_delay(self.delay.clone())
                .with_shutdown(self.shutdown.clone()),
            limiter: ServerLimiter::new(self.config.per_server_concurrency),
            counters: SummaryCounters::default(),
            shutdown: self.shutdown.clone(),
            progress: self.progress.clone(),
        };

        info!(
            servers = servers.len(),
            formats = ?self.config.formats,
            downloads_folder = %ctx.downloads_folder.display(),
            "Starting download run"
        );

        let (sets, mut outcomes) = self.resolve_datasets(&ctx, &servers).await;
        let tasks = expand_tasks(&sets, &self.config.formats);
        info!(
            tasks = tasks.len(),
            concurrency = self.config.concurrency,
            per_server = ctx.limiter.per_server(),
            "Expanded task matrix"
        );

        // Catalog failures were already counted against the bar.
        if let Some(pb) = &ctx.progress {
            pb.set_length((tasks.len() + outcomes.len()) as u64);
        }

        let ctx_ref = &ctx;
        let task_outcomes: Vec<DownloadOutcome> = stream::iter(tasks)
            .map(|task| execute_task(ctx_ref, task))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        outcomes.extend(task_outcomes);

        ctx.sync_ledger().await;

        let summary = ctx.counters.snapshot();
        let cancelled = self.shutdown.is_shutdown_requested();
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            not_started = summary.not_started,
            cancelled,
            "Run complete"
        );

        Ok(RunReport {
            summary,
            outcomes,
            ledger_path: ctx.ledger.path().to_path_buf(),
            cancelled,
        })
    }

    /// Datasets per server, plus FAILED outcomes for unreachable catalogs
    ///
    /// A server whose catalog lookup was cancelled before its first request
    /// contributes neither datasets nor outcomes.
    async fn resolve_datasets(
        &self,
        ctx: &RunContext,
        servers: &[ServerEndpoint],
    ) -> (Vec<ServerDatasets>, Vec<DownloadOutcome>) {
        let types = &self.config.dataset_types;

        let lookups = servers.iter().map(|server| async move {
            if let (Some(ids), [dataset_type]) = (&self.config.dataset_ids, types.as_slice()) {
                let entries = ids
                    .iter()
                    .map(|id| CatalogEntry {
                        dataset_id: id.trim().to_string(),
                        dataset_type: *dataset_type,
                        files_url: None,
                        iso19115_url: None,
                    })
                    .collect();
                return Ok(DatasetCatalog::from_entries(entries));
            }

            let semaphore = ctx.limiter.semaphore_for(server.short_id());
            let mut catalog = fetch_catalog(&ctx.executor, server, Some(&semaphore)).await?;
            if let Some(ids) = &self.config.dataset_ids {
                catalog.retain_ids(ids);
            }
            catalog.retain_types(types);
            Ok::<_, FetcherError>(catalog)
        });

        let mut sets = Vec::new();
        let mut failures = Vec::new();
        for (server, result) in servers.iter().zip(join_all(lookups).await) {
            match result {
                Ok(catalog) => {
                    info!(
                        server = %server.short_id(),
                        datasets = catalog.len(),
                        "Resolved datasets"
                    );
                    sets.push(ServerDatasets {
                        server: server.clone(),
                        catalog,
                    });
                }
                Err(FetcherError::Cancelled) => {
                    debug!(server = %server.short_id(), "Catalog lookup not started, run cancelled");
                }
                Err(e) => {
                    let task = DatasetTask::new(
                        server.clone(),
                        CATALOG_DATASET_ID,
                        crate::DatasetType::Table,
                        "csv",
                    );
                    failures.push(ctx.finish(DownloadOutcome::failed(task, e.to_string(), 0)).await);
                }
            }
        }
        (sets, failures)
    }
}

/// Fetch and parse the dataset catalog of `server`
///
/// # Errors
///
/// [`FetcherError::Cancelled`] when the run was cancelled before the first
/// request. [`FetcherError::CatalogUnavailable`] when retries are exhausted or
/// cancellation lands later. [`FetcherError::ParseError`] for an unreadable body.
pub async fn fetch_catalog(
    executor: &RetryExecutor,
    server: &ServerEndpoint,
    permits: Option<&Semaphore>,
) -> Result<DatasetCatalog, FetcherError> {
    let url = build_catalog_url(server.root_url());
    debug!(url = %url, "Fetching dataset catalog");

    let outcome = executor.fetch(&url, permits).await;
    match outcome.result {
        Ok(body) => DatasetCatalog::parse_csv(&body),
        Err(FetchFailure::Cancelled) if outcome.attempts == 0 => Err(FetcherError::Cancelled),
        Err(failure) => Err(FetcherError::CatalogUnavailable(format!(
            "{}: {failure}",
            server.root_url()
        ))),
    }
}

async fn execute_task(ctx: &RunContext, task: DatasetTask) -> DownloadOutcome {
    let span = info_span!(
        "dataset_task",
        server = %task.server.short_id(),
        dataset_id = %task.dataset_id,
        format = %task.format
    );

    async move {
        let outcome = run_task(ctx, task).await;
        ctx.finish(outcome).await
    }
    .instrument(span)
    .await
}

async fn run_task(ctx: &RunContext, task: DatasetTask) -> DownloadOutcome {
    if ctx.shutdown.is_shutdown_requested() {
        return DownloadOutcome::not_started(task);
    }

    let target = task.target_path(&ctx.downloads_folder);
    if ctx.skip_existing && artifact_exists(&target) {
        return DownloadOutcome::skipped(task);
    }

    let url = match task.url() {
        Ok(url) => url,
        Err(e) => return DownloadOutcome::failed(task, e.to_string(), 0),
    };

    debug!(url = %url, status = ?TaskStatus::InProgress, "Fetching");
    let semaphore = ctx.limiter.semaphore_for(task.server.short_id());
    let fetched = ctx.executor.fetch(&url, Some(&semaphore)).await;

    let body = match fetched.result {
        Ok(body) => body,
        Err(FetchFailure::Cancelled) if fetched.attempts == 0 => {
            return DownloadOutcome::not_started(task)
        }
        Err(failure) => return DownloadOutcome::failed(task, failure.to_string(), fetched.attempts),
    };

    let builder = task.path_builder(&ctx.downloads_folder);
    let bytes = body.len() as u64;
    let written = tokio::task::spawn_blocking(move || {
        builder.ensure_directories()?;
        write_payload(&builder.build(), &body)
    })
    .await;

    match written {
        Ok(Ok(())) => {
            metrics::record_bytes(bytes);
            DownloadOutcome::success(task, bytes, fetched.attempts)
        }
        Ok(Err(e)) => {
            let err = DownloadError::FilesystemError(e.to_string());
            DownloadOutcome::failed(task, err.to_string(), fetched.attempts)
        }
        Err(e) => {
            let err = DownloadError::FilesystemError(format!("write task failed: {e}"));
            DownloadOutcome::failed(task, err.to_string(), fetched.attempts)
        }
    }
}
