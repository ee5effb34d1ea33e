//! Transport capability, request construction and catalog discovery
//!
//! The download engine never touches sockets directly. It needs exactly one
//! capability, [`Transport::get`], which performs a single GET with a timeout
//! and returns the status code and body bytes, or a [`TransportError`].
//! [`HttpTransport`] is the reqwest-backed implementation used by the CLI;
//! tests substitute scripted transports.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

pub mod catalog;
pub mod classify;
pub mod http;
pub mod request;
pub mod shared_resources;

pub use catalog::{CatalogEntry, DatasetCatalog};
pub use classify::FailureKind;
pub use http::HttpTransport;
pub use request::build_dataset_url;

/// Errors raised by a transport before an HTTP status is available
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The per-attempt timeout elapsed
    #[error("timeout: {0}")]
    Timeout(String),

    /// Connection refused, reset, or DNS failure
    #[error("connection error: {0}")]
    Connection(String),

    /// The URL could not be turned into a request
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body could not be read to completion
    #[error("incomplete body: {0}")]
    Body(String),

    /// Any other transport failure
    #[error("transport error: {0}")]
    Other(String),
}

/// Status code and body of a completed GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Full response body
    pub body: Bytes,
}

impl TransportResponse {
    /// Build a response from a status and body
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Single-GET capability consumed by the retry executor
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one GET against `url`, giving up after `timeout`
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError>;
}

/// Fetcher errors for request construction and catalog handling
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Dataset type has no route or the URL is malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Catalog could not be retrieved
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Catalog body could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Cancelled before the first request was sent
    #[error("cancelled")]
    Cancelled,
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;
