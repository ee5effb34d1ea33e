//! Cancellation of download runs in progress or before start

use std::sync::Arc;
use std::time::Duration;

use erddap_downloader::downloader::{DownloadOrchestrator, RetryPolicy, RunConfig, TaskStatus};
use erddap_downloader::shutdown::ShutdownCoordinator;
use tempfile::TempDir;

use crate::support::{RecordingDelay, ScriptedTransport};

fn config(temp_dir: &TempDir, ids: Option<&[&str]>) -> RunConfig {
    let mut config = RunConfig::new(vec!["https://a.example/erddap".to_string()]);
    config.dataset_ids = ids.map(|ids| ids.iter().map(|s| s.to_string()).collect());
    config.formats = vec!["nc".to_string(), "das".to_string(), "iso19115".to_string()];
    config.downloads_folder = temp_dir.path().join("downloads");
    config.retry = RetryPolicy::new(
        3,
        Duration::from_millis(100),
        Duration::from_millis(1000),
        Duration::ZERO,
    );
    config.concurrency = 1;
    config.per_server_concurrency = 1;
    config
}

/// The request in flight completes; queued tasks are never started
#[tokio::test]
async fn test_cancel_mid_run_finishes_in_flight_task() {
    let temp_dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new().with_latency(Duration::from_millis(200)));
    let shutdown = ShutdownCoordinator::shared();

    let config = config(&temp_dir, Some(&["temp01"]));
    let orchestrator = DownloadOrchestrator::new(config, transport.clone())
        .with_delay(Arc::new(RecordingDelay::default()))
        .with_shutdown(shutdown.clone());

    let cancel_after_first_call = async {
        while transport.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.request_shutdown();
    };
    let (report, ()) = tokio::join!(orchestrator.run(), cancel_after_first_call);
    let report = report.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.summary.not_started, 2);
    assert_eq!(report.summary.failed, 0);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let finished = report
        .outcomes
        .iter()
        .find(|o| o.status == TaskStatus::Success)
        .unwrap();
    assert_eq!(finished.task.url().unwrap(), calls[0]);
    assert!(finished
        .task
        .target_path(&temp_dir.path().join("downloads"))
        .exists());

    assert!(!report.ledger_path.exists(), "not-started tasks leave no ledger rows");
}

/// A catalog lookup cancelled before its first request is not a failure
#[tokio::test]
async fn test_cancelled_catalog_lookup_records_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let report = DownloadOrchestrator::new(config(&temp_dir, None), transport.clone())
        .with_delay(Arc::new(RecordingDelay::default()))
        .with_shutdown(shutdown)
        .run()
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(transport.calls().is_empty());
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.total(), 0);
    assert!(report.outcomes.is_empty());
    assert!(!report.ledger_path.exists());
}
