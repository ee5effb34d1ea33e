//! Output paths, payload persistence and the failure ledger

use std::io::Write;
use std::path::Path;

pub mod ledger;
pub mod path;

pub use ledger::{FailureLedger, FailureRecord, LEDGER_FILE_NAME};
pub use path::{artifact_exists, OutputPathBuilder};

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write or read error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// File lock could not be taken
    #[error("lock error: {0}")]
    LockError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Write a payload to `path`, replacing any previous content atomically
///
/// Bytes go to a temp file in the same directory, are fsynced, then renamed
/// over the target. A crash mid-write never leaves a truncated target.
pub fn write_payload(path: &Path, payload: &[u8]) -> OutputResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| {
        OutputError::IoError(format!(
            "Failed to create directory {}: {e}",
            parent.display()
        ))
    })?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;

    temp_file
        .write_all(payload)
        .map_err(|e| OutputError::IoError(format!("Failed to write payload: {e}")))?;

    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync payload: {e}")))?;

    temp_file.persist(path).map_err(|e| {
        OutputError::IoError(format!("Failed to persist {}: {}", path.display(), e.error))
    })?;

    Ok(())
}
