use std::sync::Arc;
use std::time::Duration;

use erddap_downloader::downloader::{FetchFailure, RetryExecutor, RetryPolicy};
use erddap_downloader::fetcher::{FailureKind, TransportError};
use tokio::sync::Semaphore;

use crate::support::{body, status, RecordingDelay, ScriptedTransport};

const URL: &str = "https://a.example/erddap/griddap/sst.nc";

fn executor(transport: Arc<ScriptedTransport>, delay: Arc<RecordingDelay>, attempts: u32) -> RetryExecutor {
    RetryExecutor::new(transport)
        .with_policy(RetryPolicy::new(
            attempts,
            Duration::from_secs(1),
            Duration::from_secs(30),
            Duration::ZERO,
        ))
        .with_delay(delay)
}

#[tokio::test]
async fn test_fatal_status_is_single_attempt() {
    for code in [400u16, 403, 404, 410] {
        let transport = Arc::new(ScriptedTransport::new().with_fallback(status(code)));
        let delay = Arc::new(RecordingDelay::default());

        let outcome = executor(transport.clone(), delay.clone(), 5).fetch(URL, None).await;

        assert_eq!(outcome.attempts, 1, "status {code}");
        assert_eq!(transport.calls().len(), 1);
        assert!(delay.waits().is_empty());
        assert!(matches!(
            outcome.result,
            Err(FetchFailure::Failed { kind: FailureKind::ClientError(c), .. }) if c == code
        ));
    }
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let transport = Arc::new(
        ScriptedTransport::new().script(URL, vec![status(429), body("CDF")]),
    );
    let delay = Arc::new(RecordingDelay::default());

    let outcome = executor(transport, delay.clone(), 3).fetch(URL, None).await;

    assert_eq!(outcome.attempts, 2);
    assert_eq!(&outcome.result.unwrap()[..], b"CDF");
    assert_eq!(delay.waits(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn test_timeouts_exhaust_with_doubling_backoff() {
    let transport = Arc::new(ScriptedTransport::new().with_fallback(Err(
        TransportError::Timeout("operation timed out".to_string()),
    )));
    let delay = Arc::new(RecordingDelay::default());

    let outcome = executor(transport.clone(), delay.clone(), 4).fetch(URL, None).await;

    assert_eq!(outcome.attempts, 4);
    assert_eq!(transport.calls().len(), 4);
    assert_eq!(
        delay.waits(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    let failure = outcome.result.unwrap_err();
    assert!(failure.to_string().contains("timeout"), "got: {failure}");
}

#[tokio::test]
async fn test_invalid_url_is_fatal() {
    let transport = Arc::new(ScriptedTransport::new().with_fallback(Err(
        TransportError::InvalidUrl("relative URL without a base".to_string()),
    )));
    let delay = Arc::new(RecordingDelay::default());

    let outcome = executor(transport, delay, 3).fetch(URL, None).await;

    assert_eq!(outcome.attempts, 1);
    assert!(matches!(
        outcome.result,
        Err(FetchFailure::Failed { kind: FailureKind::InvalidRequest, .. })
    ));
}

#[tokio::test]
async fn test_permit_released_between_attempts() {
    let transport = Arc::new(
        ScriptedTransport::new().script(URL, vec![status(503), body("CDF")]),
    );
    let delay = Arc::new(RecordingDelay::default());
    let semaphore = Semaphore::new(1);

    let outcome = executor(transport, delay, 3)
        .fetch(URL, Some(&semaphore))
        .await;

    assert!(outcome.result.is_ok());
    assert_eq!(semaphore.available_permits(), 1);
}
