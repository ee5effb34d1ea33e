//! # ERDDAP Downloader Library
//!
//! Bulk retrieval of scientific datasets from one or more ERDDAP servers.
//! Every combination of {server, dataset, format} becomes one task; each task
//! is saved to a predictable path and every failure is appended to a durable
//! CSV ledger that accumulates across runs.
//!
//! ## Features
//!
//! - **Task matrix**: servers × datasets × selected dataset types × formats
//! - **Table/grid routing**: `tabledap` and `griddap` endpoints chosen from a routing table
//! - **Retry with backoff**: transient failures (timeouts, 5xx, 429) are retried with
//!   exponential backoff and jitter, fatal ones (other 4xx) fail immediately
//! - **Skip-existing**: idempotent re-runs skip files that are already on disk
//! - **Failure ledger**: `missed_formats.csv`, append-only, safe under concurrent writers
//! - **Bounded concurrency**: a global worker limit plus a per-server in-flight cap
//!
//! ## Quick Start
//!
//! ```no_run
//! use erddap_downloader::downloader::{DownloadOrchestrator, RunConfig};
//! use erddap_downloader::fetcher::HttpTransport;
//! use erddap_downloader::DatasetType;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = RunConfig::new(vec!["https://coastwatch.pfeg.noaa.gov/erddap".to_string()]);
//! config.dataset_ids = Some(vec!["cwwcNDBCMet".to_string()]);
//! config.dataset_types = vec![DatasetType::Table];
//!
//! let orchestrator = DownloadOrchestrator::new(config, Arc::new(HttpTransport::new()));
//! let report = orchestrator.run().await?;
//! println!("{} succeeded, {} failed", report.summary.succeeded, report.summary.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`server`] - Server endpoint normalisation and short identifiers
//! - [`fetcher`] - Transport capability, request construction, failure classification, catalog
//! - [`downloader`] - Retry state machine, per-server limits and the orchestrator
//! - [`output`] - Target path construction, payload persistence and the failure ledger
//! - [`shutdown`] - Run-level cancellation

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Download orchestration
pub mod downloader;

/// Transport, request construction and catalog discovery
pub mod fetcher;

/// Run metrics
pub mod metrics;

/// Output paths, payload writes and the failure ledger
pub mod output;

/// Server endpoint parsing
pub mod server;

/// Cancellation coordination shared across tasks
pub mod shutdown;

pub use server::ServerEndpoint;

/// Routing table from dataset type to the ERDDAP protocol path segment.
///
/// Adding a dataset type means adding a variant and a row here.
pub const DATASET_ROUTES: &[(DatasetType, &str)] = &[
    (DatasetType::Table, "tabledap"),
    (DatasetType::Grid, "griddap"),
];

/// Structure of an ERDDAP dataset, which decides the endpoint it is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    /// Row/column dataset served by `tabledap`
    Table,
    /// Multi-dimensional array dataset served by `griddap`
    Grid,
}

impl DatasetType {
    /// Every dataset type, in selection order
    pub const ALL: [DatasetType; 2] = [DatasetType::Table, DatasetType::Grid];

    /// Path segment for this type, looked up in [`DATASET_ROUTES`]
    pub fn route_segment(&self) -> Option<&'static str> {
        DATASET_ROUTES
            .iter()
            .find(|(dataset_type, _)| dataset_type == self)
            .map(|(_, segment)| *segment)
    }

    /// Lowercase name as used by ERDDAP's `dataStructure` column
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Table => "table",
            DatasetType::Grid => "grid",
        }
    }
}

impl std::fmt::Display for DatasetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DatasetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "table" => Ok(DatasetType::Table),
            "grid" => Ok(DatasetType::Grid),
            _ => Err(format!("Invalid dataset type: {s}")),
        }
    }
}
