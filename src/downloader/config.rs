//! Run configuration, defaults and backoff calculation

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use super::retry::RetryPolicy;
use super::DownloadError;
use crate::server::ServerEndpoint;
use crate::DatasetType;

/// Maximum attempts per task, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Backoff cap in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Upper bound of the random jitter added to each backoff.
pub const DEFAULT_JITTER_MS: u64 = 250;

/// Per-attempt transport timeout. Large NetCDF exports can take a while to render.
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;

/// Tasks in flight across all servers.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Upper limit accepted for the global concurrency.
pub const MAX_CONCURRENCY: usize = 32;

/// Requests in flight against any single server.
pub const DEFAULT_PER_SERVER_CONCURRENCY: usize = 2;

/// Formats fetched when none are given: NetCDF data, attribute metadata, ISO 19115 metadata.
pub const DEFAULT_FORMATS: &[&str] = &["nc", "das", "iso19115"];

/// Downloads folder when none is given.
pub const DEFAULT_DOWNLOADS_FOLDER: &str = "downloads";

/// Calculate exponential backoff delay
///
/// `retry_index` is zero for the first retry. The result doubles per retry
/// and is capped at `max`.
pub fn calculate_backoff(base: Duration, max: Duration, retry_index: u32) -> Duration {
    let factor = 2u32.checked_pow(retry_index).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

/// Everything one run needs, as handed over by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Server root URLs
    pub servers: Vec<String>,
    /// File types to fetch for every dataset
    pub formats: Vec<String>,
    /// Explicit dataset ids; only valid with exactly one server
    pub dataset_ids: Option<Vec<String>>,
    /// Root of the on-disk layout and home of the failure ledger
    pub downloads_folder: PathBuf,
    /// Skip tasks whose target already exists with non-zero size
    pub skip_existing: bool,
    /// Dataset types to include
    pub dataset_types: Vec<DatasetType>,
    /// Retry and backoff parameters
    pub retry: RetryPolicy,
    /// Timeout applied to every transport call
    pub attempt_timeout: Duration,
    /// Tasks in flight across all servers
    pub concurrency: usize,
    /// Requests in flight per server
    pub per_server_concurrency: usize,
}

impl RunConfig {
    /// Configuration with defaults for the given servers
    ///
    /// Dataset types default to table only.
    pub fn new(servers: Vec<String>) -> Self {
        Self {
            servers,
            formats: DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect(),
            dataset_ids: None,
            downloads_folder: PathBuf::from(DEFAULT_DOWNLOADS_FOLDER),
            skip_existing: false,
            dataset_types: vec![DatasetType::Table],
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            per_server_concurrency: DEFAULT_PER_SERVER_CONCURRENCY,
        }
    }

    /// Validate every invariant and resolve the server list
    ///
    /// Runs before any task is expanded or any request is made.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ConfigurationError`] describing the first violation.
    pub fn validate(&self) -> Result<Vec<ServerEndpoint>, DownloadError> {
        if self.servers.is_empty() {
            return Err(config_error("at least one server URL is required"));
        }

        let servers = self
            .servers
            .iter()
            .map(|s| ServerEndpoint::parse(s).map_err(|e| config_error(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut short_ids = HashSet::new();
        for server in &servers {
            if !short_ids.insert(server.short_id()) {
                return Err(config_error(format!(
                    "two servers share the download directory '{}'",
                    server.short_id()
                )));
            }
        }

        if let Some(ids) = &self.dataset_ids {
            if servers.len() != 1 {
                return Err(config_error(
                    "dataset ids can only be specified with exactly one server URL",
                ));
            }
            if ids.is_empty() || ids.iter().any(|id| id.trim().is_empty()) {
                return Err(config_error("dataset ids cannot be empty"));
            }
        }

        if self.formats.is_empty() {
            return Err(config_error("at least one format is required"));
        }
        let mut seen = HashSet::new();
        for format in &self.formats {
            let format = format.trim();
            if format.is_empty() {
                return Err(config_error("formats cannot be empty"));
            }
            if !seen.insert(format) {
                return Err(config_error(format!("format '{format}' listed twice")));
            }
        }

        if self.dataset_types.is_empty() {
            return Err(config_error(
                "at least one of table or grid datasets must be selected",
            ));
        }

        if self.retry.max_attempts() == 0 {
            return Err(config_error("max attempts must be at least 1"));
        }
        if self.attempt_timeout.is_zero() {
            return Err(config_error("attempt timeout must be greater than zero"));
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(config_error(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}"
            )));
        }
        if self.per_server_concurrency == 0 {
            return Err(config_error("per-server concurrency must be at least 1"));
        }

        Ok(servers)
    }
}

fn config_error(message: impl Into<String>) -> DownloadError {
    DownloadError::ConfigurationError(message.into())
}
