//! Append-only CSV ledger of failed downloads
//!
//! The ledger lives at `{downloads_folder}/missed_formats.csv` and is never
//! truncated: each run appends its failures after the rows of earlier runs.
//! Appends are serialized twice over: an in-process mutex keeps concurrent
//! tasks from interleaving, and an exclusive `fd-lock` on the file keeps two
//! processes sharing a downloads folder from doing the same. Each row is
//! rendered to memory first and written with a single `write_all`.

use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::{OutputError, OutputResult};
use crate::DatasetType;

/// File name of the ledger inside the downloads folder
pub const LEDGER_FILE_NAME: &str = "missed_formats.csv";

/// One failed (server, dataset, format) combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Start time of the run that produced the failure
    pub time: DateTime<Utc>,
    /// Server root URL
    pub erddap_url: String,
    /// ERDDAP dataset id
    pub dataset_id: String,
    /// Table or grid
    pub dataset_type: DatasetType,
    /// Requested format
    pub format: String,
    /// Human-readable failure cause
    pub error: String,
}

/// Durable, append-only failure ledger
#[derive(Debug)]
pub struct FailureLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FailureLedger {
    /// Ledger at an explicit path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Ledger at `{downloads_folder}/missed_formats.csv`
    pub fn in_folder(downloads_folder: &Path) -> Self {
        Self::new(downloads_folder.join(LEDGER_FILE_NAME))
    }

    /// Ledger file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first if the file is new or empty
    pub fn record(&self, record: &FailureRecord) -> OutputResult<()> {
        // A poisoned mutex only means another append panicked; the file is still consistent.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::IoError(format!(
                    "Failed to create ledger directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                OutputError::IoError(format!(
                    "Failed to open ledger {}: {e}",
                    self.path.display()
                ))
            })?;

        let mut lock = RwLock::new(file);
        let mut file = lock
            .write()
            .map_err(|e| OutputError::LockError(format!("Failed to lock ledger: {e}")))?;

        let needs_header = file
            .metadata()
            .map_err(|e| OutputError::IoError(format!("Failed to stat ledger: {e}")))?
            .len()
            == 0;

        let row = render_row(record, needs_header)?;

        file.write_all(&row)
            .map_err(|e| OutputError::IoError(format!("Failed to append ledger row: {e}")))?;
        file.flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush ledger: {e}")))?;

        debug!(
            path = %self.path.display(),
            dataset_id = %record.dataset_id,
            format = %record.format,
            "Failure recorded"
        );
        Ok(())
    }

    /// Flush the ledger to durable storage
    ///
    /// A ledger that was never written to is left absent.
    pub fn sync(&self) -> OutputResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !self.path.exists() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| OutputError::IoError(format!("Failed to open ledger: {e}")))?;
        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync ledger: {e}")))
    }

    /// Read every row accumulated so far
    pub fn read_all(&self) -> OutputResult<Vec<FailureRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| OutputError::CsvError(format!("Failed to open ledger: {e}")))?;

        reader
            .deserialize()
            .map(|row| row.map_err(|e| OutputError::CsvError(format!("Bad ledger row: {e}"))))
            .collect()
    }
}

fn render_row(record: &FailureRecord, with_header: bool) -> OutputResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());

    writer
        .serialize(record)
        .map_err(|e| OutputError::CsvError(format!("Failed to serialize ledger row: {e}")))?;

    writer
        .into_inner()
        .map_err(|e| OutputError::CsvError(format!("Failed to render ledger row: {e}")))
}
