//! Retry with exponential backoff around single transport calls
//!
//! The control flow is split in two so it can be tested without real time:
//!
//! - [`RetryState`] is a plain state machine. It counts attempts and, given
//!   the [`FailureKind`] of a failed attempt, returns a [`RetryDecision`].
//! - [`RetryExecutor`] drives a [`Transport`] with that state machine and
//!   waits between attempts through an injected [`Delay`].
//!
//! Backoff doubles from `base_delay`, is capped at `max_delay`, and gets a
//! random jitter in `[0, jitter]` added on top.

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use super::config::{
    calculate_backoff, DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_BASE_DELAY_MS, DEFAULT_JITTER_MS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
};
use crate::fetcher::{FailureKind, Transport};
use crate::metrics;
use crate::shutdown::SharedShutdown;

/// Retry and backoff parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            jitter: Duration::from_millis(DEFAULT_JITTER_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy with explicit parameters
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter,
        }
    }

    /// Set maximum attempts, including the first
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the jitter bound; zero makes delays deterministic
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Maximum attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after `failed_attempt` (1-based) before the next one
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let backoff = calculate_backoff(
            self.base_delay,
            self.max_delay,
            failed_attempt.saturating_sub(1),
        );
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return backoff;
        }
        backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then try again
    RetryAfter(Duration),
    /// Fatal failure: no further attempts
    Fatal,
    /// Transient failure, but the attempt budget is spent
    Exhausted,
}

/// Attempt counter and retry decisions for one task
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    /// Fresh state with no attempts made
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Record the start of an attempt; returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Decide what follows a failure of the current attempt
    pub fn on_failure(&self, kind: &FailureKind) -> RetryDecision {
        if !kind.is_transient() {
            RetryDecision::Fatal
        } else if self.attempts >= self.policy.max_attempts {
            RetryDecision::Exhausted
        } else {
            RetryDecision::RetryAfter(self.policy.delay_after(self.attempts))
        }
    }
}

/// Waits between attempts
#[async_trait]
pub trait Delay: Send + Sync {
    /// Wait for `duration`
    async fn wait(&self, duration: Duration);
}

/// [`Delay`] backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Why a fetch produced no payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Final attempt failed, or a fatal failure stopped retries
    Failed {
        /// Classification of the last failure
        kind: FailureKind,
        /// Transport error text, when there was one
        detail: Option<String>,
    },
    /// Cancellation was observed before the next attempt
    Cancelled,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Failed {
                kind,
                detail: Some(detail),
            } => write!(f, "{kind} ({detail})"),
            FetchFailure::Failed { kind, detail: None } => write!(f, "{kind}"),
            FetchFailure::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of driving one URL to completion
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Transport calls made
    pub attempts: u32,
    /// Payload of the successful attempt, or the final failure
    pub result: Result<Bytes, FetchFailure>,
}

/// Drives a [`Transport`] with bounded retries
#[derive(Clone)]
pub struct RetryExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    delay: Arc<dyn Delay>,
    shutdown: Option<SharedShutdown>,
}

impl RetryExecutor {
    /// Executor with default policy, default timeout and real delays
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            delay: Arc::new(TokioDelay),
            shutdown: None,
        }
    }

    /// Set the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Replace the delay source
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Attach a cancellation handle
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Retry policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    /// Fetch `url`, retrying transient failures
    ///
    /// When `permits` is given, one permit is held for the duration of each
    /// transport call (not during backoff waits).
    pub async fn fetch(&self, url: &str, permits: Option<&Semaphore>) -> FetchOutcome {
        let mut state = RetryState::new(self.policy.clone());
        let max_attempts = self.policy.max_attempts();

        loop {
            if self.shutdown_requested() {
                return FetchOutcome {
                    attempts: state.attempts(),
                    result: Err(FetchFailure::Cancelled),
                };
            }

            let attempt = state.begin_attempt();
            metrics::record_attempt();

            let response = {
                // The semaphore is never closed; a failed acquire just runs unthrottled.
                let _permit = match permits {
                    Some(semaphore) => semaphore.acquire().await.ok(),
                    None => None,
                };
                self.transport.get(url, self.attempt_timeout).await
            };

            let (kind, detail) = match response {
                Ok(response) if response.is_success() => {
                    if attempt > 1 {
                        debug!(
                            url = %url,
                            "Retry attempt {}/{} succeeded", attempt, max_attempts
                        );
                    }
                    return FetchOutcome {
                        attempts: attempt,
                        result: Ok(response.body),
                    };
                }
                Ok(response) => (FailureKind::from_status(response.status), None),
                Err(e) => (FailureKind::from_transport_error(&e), Some(e.to_string())),
            };

            match state.on_failure(&kind) {
                RetryDecision::RetryAfter(backoff) => {
                    metrics::record_retry();
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds...",
                        attempt + 1,
                        max_attempts,
                        kind.description(),
                        backoff.as_secs_f64()
                    );

                    if let Some(shutdown) = &self.shutdown {
                        tokio::select! {
                            _ = self.delay.wait(backoff) => {},
                            _ = shutdown.wait_for_shutdown() => {
                                return FetchOutcome {
                                    attempts: state.attempts(),
                                    result: Err(FetchFailure::Cancelled),
                                };
                            }
                        }
                    } else {
                        self.delay.wait(backoff).await;
                    }
                }
                decision => {
                    error!(
                        url = %url,
                        attempts = attempt,
                        fatal = decision == RetryDecision::Fatal,
                        "Download failed after {} attempt(s): {}", attempt, kind
                    );
                    return FetchOutcome {
                        attempts: attempt,
                        result: Err(FetchFailure::Failed { kind, detail }),
                    };
                }
            }
        }
    }
}
