//! Server endpoint parsing and normalisation
//!
//! An ERDDAP server is addressed by its root URL (e.g.
//! `https://coastwatch.pfeg.noaa.gov/erddap`). Downloads are grouped on disk
//! by the server's short identifier: the URL's host (and port, if any) with
//! protocol and path stripped.

use std::fmt;
use url::Url;

/// A resolved ERDDAP server root
///
/// # Examples
///
/// ```
/// use erddap_downloader::ServerEndpoint;
///
/// let server = ServerEndpoint::parse("https://a.example/erddap/").unwrap();
/// assert_eq!(server.root_url(), "https://a.example/erddap");
/// assert_eq!(server.short_id(), "a.example");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
    root_url: String,
    short_id: String,
}

impl ServerEndpoint {
    /// Parse a server root URL
    ///
    /// Surrounding whitespace and trailing slashes are removed from the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty, unparseable, not http(s), or has no host.
    pub fn parse(s: &str) -> Result<Self, ServerError> {
        let trimmed = s.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ServerError::InvalidUrl(
                "server URL cannot be empty".to_string(),
            ));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| ServerError::InvalidUrl(format!("{trimmed}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ServerError::UnsupportedScheme(other.to_string()));
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| ServerError::InvalidUrl(format!("{trimmed}: missing host")))?;

        let short_id = match url.port() {
            Some(port) => format!("{host}_{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            root_url: trimmed.to_string(),
            short_id,
        })
    }

    /// Canonical root URL without trailing slash
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Directory-safe identifier derived from host and port
    pub fn short_id(&self) -> &str {
        &self.short_id
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root_url)
    }
}

/// Server endpoint errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    /// URL could not be parsed or lacks a host
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    /// Only http and https are supported
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}
