//! Failure classification for retry decisions and ledger causes.
//!
//! Every failed attempt is reduced to a [`FailureKind`]. The kind decides
//! whether the retry executor may try again and supplies the human-readable
//! cause written to the failure ledger.

use super::TransportError;

/// Classification of a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Per-attempt timeout elapsed
    Timeout,
    /// Connection refused, reset, or DNS failure
    Connection,
    /// Body ended early
    IncompleteBody,
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 4xx other than 429
    ClientError(u16),
    /// Status outside 2xx/4xx/5xx after redirects were followed
    UnexpectedStatus(u16),
    /// URL could not be requested
    InvalidRequest,
    /// Unclassified transport failure
    Other,
}

impl FailureKind {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            500..=599 => Self::ServerError(status),
            400..=499 => Self::ClientError(status),
            _ => Self::UnexpectedStatus(status),
        }
    }

    /// Classify a transport error
    pub fn from_transport_error(err: &TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => Self::Timeout,
            TransportError::Connection(_) => Self::Connection,
            TransportError::Body(_) => Self::IncompleteBody,
            TransportError::InvalidUrl(_) => Self::InvalidRequest,
            TransportError::Other(_) => Self::Other,
        }
    }

    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::Connection
                | Self::IncompleteBody
                | Self::RateLimited
                | Self::ServerError(_)
                | Self::Other
        )
    }

    /// Short description used in log lines and ledger causes
    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "network timeout",
            Self::Connection => "connection failed",
            Self::IncompleteBody => "incomplete response body",
            Self::RateLimited => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::ClientError(code) => match code {
                400 => "bad request",
                401 | 403 => "access denied",
                404 => "not found",
                410 => "gone",
                _ => "client error",
            },
            Self::UnexpectedStatus(_) => "unexpected status",
            Self::InvalidRequest => "invalid request",
            Self::Other => "network error",
        }
    }

    /// HTTP status carried by this kind, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited => Some(429),
            Self::ServerError(code) | Self::ClientError(code) | Self::UnexpectedStatus(code) => {
                Some(*code)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status() {
            Some(code) => write!(f, "HTTP {code} {}", self.description()),
            None => write!(f, "{}", self.description()),
        }
    }
}
