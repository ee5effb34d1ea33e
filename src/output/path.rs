//! Target path generation for downloaded datasets
//!
//! Every artifact lands at
//! `{downloads_folder}/{server_short_id}/{dataset_id}/{dataset_id}.{format}`.
//! The mapping is pure, so the skip-existing check is a plain existence test.
//!
//! # Usage Example
//!
//! ```rust
//! use erddap_downloader::output::OutputPathBuilder;
//! use std::path::PathBuf;
//!
//! let builder = OutputPathBuilder::new(PathBuf::from("downloads"), "a.example", "temp01", "das");
//! assert_eq!(builder.build(), PathBuf::from("downloads/a.example/temp01/temp01.das"));
//! ```

use super::OutputError;
use std::path::{Path, PathBuf};

/// Path builder for one (server, dataset, format) triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPathBuilder {
    root_dir: PathBuf,
    server_short_id: String,
    dataset_id: String,
    format: String,
}

impl OutputPathBuilder {
    /// Create a new path builder
    ///
    /// # Arguments
    ///
    /// * `root_dir` - Downloads folder (e.g., "downloads")
    /// * `server_short_id` - Server host identifier (e.g., "coastwatch.pfeg.noaa.gov")
    /// * `dataset_id` - ERDDAP dataset id
    /// * `format` - ERDDAP file type extension without the dot
    ///
    /// # Security
    ///
    /// Components are sanitized so a hostile catalog entry cannot escape the
    /// downloads folder: `/`, `\`, `:` become `_` and `..` becomes `__`.
    pub fn new(root_dir: PathBuf, server_short_id: &str, dataset_id: &str, format: &str) -> Self {
        Self {
            root_dir,
            server_short_id: sanitize_component(server_short_id),
            dataset_id: sanitize_component(dataset_id),
            format: sanitize_component(format),
        }
    }

    /// Directory holding every format of this dataset
    pub fn dataset_dir(&self) -> PathBuf {
        self.root_dir
            .join(&self.server_short_id)
            .join(&self.dataset_id)
    }

    /// Build the complete file path
    pub fn build(&self) -> PathBuf {
        self.dataset_dir()
            .join(format!("{}.{}", self.dataset_id, self.format))
    }

    /// Ensure server and dataset directories exist
    pub fn ensure_directories(&self) -> Result<(), OutputError> {
        let dir_path = self.dataset_dir();
        std::fs::create_dir_all(&dir_path).map_err(|e| {
            OutputError::IoError(format!(
                "Failed to create directory {}: {}",
                dir_path.display(),
                e
            ))
        })
    }
}

/// Whether a previously downloaded artifact is present and non-empty
pub fn artifact_exists(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Sanitize a path component for filesystem safety
///
/// - `..` → `__` (parent directory reference)
/// - `/`, `\`, `:` → `_` (directory and drive separators)
///
/// Preserves case; ERDDAP dataset ids are case-sensitive.
fn sanitize_component(name: &str) -> String {
    name.trim().replace("..", "__").replace(['/', '\\', ':'], "_")
}
