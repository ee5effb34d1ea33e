//! reqwest-backed [`Transport`]

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::shared_resources::global_http_client;
use super::{Transport, TransportError, TransportResponse};

/// HTTP transport over the shared reqwest client
#[derive(Clone)]
pub struct HttpTransport {
    client: Arc<Client>,
}

impl HttpTransport {
    /// Create a transport using the process-wide client
    pub fn new() -> Self {
        Self {
            client: global_http_client(),
        }
    }

    /// Create a transport over a caller-supplied client
    pub fn with_client(client: Arc<Client>) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError> {
        debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "GET");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        // Error bodies are still read so the connection can be reused.
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        debug!(url = %url, status, bytes = body.len(), "GET complete");
        Ok(TransportResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connection(e.to_string())
    } else if e.is_builder() {
        TransportError::InvalidUrl(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
