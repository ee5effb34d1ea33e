//! Dataset tasks, outcomes and task-matrix expansion

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::fetcher::{build_dataset_url, DatasetCatalog, FetcherResult};
use crate::output::OutputPathBuilder;
use crate::server::ServerEndpoint;
use crate::DatasetType;

/// One unit of work: a dataset in one format from one server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetTask {
    /// Server the dataset lives on
    pub server: ServerEndpoint,
    /// ERDDAP dataset id
    pub dataset_id: String,
    /// Table or grid; picks the endpoint
    pub dataset_type: DatasetType,
    /// File type to request
    pub format: String,
}

impl DatasetTask {
    /// Create a task
    pub fn new(
        server: ServerEndpoint,
        dataset_id: impl Into<String>,
        dataset_type: DatasetType,
        format: impl Into<String>,
    ) -> Self {
        Self {
            server,
            dataset_id: dataset_id.into(),
            dataset_type,
            format: format.into(),
        }
    }

    /// Path builder rooted at `downloads_folder`
    pub fn path_builder(&self, downloads_folder: &Path) -> OutputPathBuilder {
        OutputPathBuilder::new(
            downloads_folder.to_path_buf(),
            self.server.short_id(),
            &self.dataset_id,
            &self.format,
        )
    }

    /// Target file for this task
    pub fn target_path(&self, downloads_folder: &Path) -> PathBuf {
        self.path_builder(downloads_folder).build()
    }

    /// Download URL for this task
    pub fn url(&self) -> FetcherResult<String> {
        build_dataset_url(
            self.server.root_url(),
            &self.dataset_id,
            self.dataset_type,
            &self.format,
        )
    }
}

impl fmt::Display for DatasetTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}.{}",
            self.server.short_id(),
            self.dataset_type,
            self.dataset_id,
            self.format
        )
    }
}

/// Task lifecycle
///
/// `Pending → Skipped`, or `Pending → InProgress → Success | Failed`.
/// Tasks never picked up because the run was cancelled end as `NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    /// Not yet looked at
    #[default]
    Pending,
    /// Transport calls under way
    InProgress,
    /// Payload written to the target path
    Success,
    /// Target already present; nothing fetched
    Skipped,
    /// Retries exhausted, fatal failure, or write failure
    Failed,
    /// Cancelled before the first attempt
    NotStarted,
}

/// Result of executing one task
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// The task this outcome belongs to
    pub task: DatasetTask,
    /// Final status
    pub status: TaskStatus,
    /// Payload size on success
    pub bytes: Option<u64>,
    /// Failure cause on failure
    pub cause: Option<String>,
    /// Transport calls made
    pub attempts: u32,
}

impl DownloadOutcome {
    /// Successful download of `bytes` bytes
    pub fn success(task: DatasetTask, bytes: u64, attempts: u32) -> Self {
        Self {
            task,
            status: TaskStatus::Success,
            bytes: Some(bytes),
            cause: None,
            attempts,
        }
    }

    /// Task skipped because its target exists
    pub fn skipped(task: DatasetTask) -> Self {
        Self {
            task,
            status: TaskStatus::Skipped,
            bytes: None,
            cause: None,
            attempts: 0,
        }
    }

    /// Task failed with `cause`
    pub fn failed(task: DatasetTask, cause: impl Into<String>, attempts: u32) -> Self {
        Self {
            task,
            status: TaskStatus::Failed,
            bytes: None,
            cause: Some(cause.into()),
            attempts,
        }
    }

    /// Task never started because the run was cancelled
    pub fn not_started(task: DatasetTask) -> Self {
        Self {
            task,
            status: TaskStatus::NotStarted,
            bytes: None,
            cause: Some("cancelled".to_string()),
            attempts: 0,
        }
    }
}

/// Datasets resolved for one server
#[derive(Debug, Clone)]
pub struct ServerDatasets {
    /// The server
    pub server: ServerEndpoint,
    /// Datasets to fetch from it
    pub catalog: DatasetCatalog,
}

/// Expand servers × datasets × formats into tasks
///
/// Order follows the input: server, then dataset, then format. Duplicate
/// (server, dataset, format) triples are dropped so every task owns a
/// distinct target path.
pub fn expand_tasks(sets: &[ServerDatasets], formats: &[String]) -> Vec<DatasetTask> {
    let mut seen = HashSet::new();
    let mut tasks = Vec::new();

    for set in sets {
        for entry in set.catalog.entries() {
            for format in formats {
                let format = format.trim();
                let key = (
                    set.server.short_id().to_string(),
                    entry.dataset_id.clone(),
                    format.to_string(),
                );
                if !seen.insert(key) {
                    continue;
                }
                tasks.push(DatasetTask::new(
                    set.server.clone(),
                    entry.dataset_id.clone(),
                    entry.dataset_type,
                    format,
                ));
            }
        }
    }

    tasks
}
