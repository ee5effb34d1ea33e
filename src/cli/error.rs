//! CLI error types and conversions

use crate::downloader::DownloadError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Download error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Run completed but some tasks failed
    #[error("{0} download(s) failed")]
    TasksFailed(u64),

    /// Run interrupted before all tasks finished
    #[error("download cancelled")]
    Cancelled,
}
