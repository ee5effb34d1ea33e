//! Download orchestration, retry handling and run configuration
//!
//! # Overview
//!
//! One run goes through these steps:
//!
//! 1. **Validation**: [`RunConfig::validate`] rejects bad input before any request
//! 2. **Discovery**: each server's catalog is fetched unless explicit ids make it unnecessary
//! 3. **Expansion**: [`expand_tasks`] builds the server × dataset × format matrix
//! 4. **Execution**: [`DownloadOrchestrator`] drives every task through [`RetryExecutor`]
//! 5. **Bookkeeping**: failures go to the [`crate::output::FailureLedger`]; counts to [`RunSummary`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use erddap_downloader::downloader::{DownloadOrchestrator, RunConfig};
//! use erddap_downloader::fetcher::HttpTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = RunConfig::new(vec!["https://a.example/erddap".to_string()]);
//! config.dataset_ids = Some(vec!["temp01".to_string()]);
//! config.formats = vec!["das".to_string(), "nc".to_string()];
//!
//! let report = DownloadOrchestrator::new(config, Arc::new(HttpTransport::new()))
//!     .run()
//!     .await?;
//! println!("{} failed", report.summary.failed);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Only [`DownloadError::ConfigurationError`] aborts a run. Transport and
//! filesystem failures stay inside their task and end up as FAILED outcomes
//! with a ledger row; ledger write failures are logged and swallowed.

pub mod config;
pub mod executor;
pub mod job;
pub mod limiter;
pub mod retry;

pub use config::RunConfig;
pub use executor::{fetch_catalog, DownloadOrchestrator, RunReport, RunSummary};
pub use job::{expand_tasks, DatasetTask, DownloadOutcome, ServerDatasets, TaskStatus};
pub use limiter::ServerLimiter;
pub use retry::{
    Delay, FetchFailure, FetchOutcome, RetryDecision, RetryExecutor, RetryPolicy, RetryState,
    TokioDelay,
};

use crate::fetcher::FetcherError;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Invalid input combination; aborts the run before any task
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Directory creation or payload write failed
    #[error("filesystem error: {0}")]
    FilesystemError(String),

    /// A failure record could not be appended or the ledger not synced
    #[error("ledger write error: {0}")]
    LedgerWriteError(String),

    /// Request construction or catalog failure
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),
}
