//! Shared HTTP client for every transport instance
//!
//! One reqwest [`Client`] per process keeps connection pooling effective
//! across all servers and tasks. Per-attempt timeouts are applied on each
//! request; only the connect timeout is fixed here.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// HTTP connect timeout (seconds) - time to establish TCP connection
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 15;

/// User agent sent to ERDDAP servers
const USER_AGENT: &str = concat!("erddap-downloader/", env!("CARGO_PKG_VERSION"));

/// Global HTTP client shared by all transports
///
/// Falls back to a default client if the configured builder fails, so the
/// process never panics on TLS setup.
pub static GLOBAL_HTTP_CLIENT: Lazy<Arc<Client>> = Lazy::new(|| {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build configured HTTP client, using defaults");
            Client::new()
        });
    Arc::new(client)
});

/// Get the global HTTP client
pub fn global_http_client() -> Arc<Client> {
    GLOBAL_HTTP_CLIENT.clone()
}
