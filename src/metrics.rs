//! Run metrics for download monitoring
//!
//! Counters are emitted through the `metrics` facade. Without an installed
//! recorder they cost next to nothing; `--metrics-addr` installs the
//! Prometheus exporter so long bulk runs can be scraped.
//!
//! - `erddap_tasks_total{status}` - finished tasks by status
//! - `erddap_attempts_total` - transport calls
//! - `erddap_retries_total` - backoff waits scheduled
//! - `erddap_bytes_downloaded_total` - payload bytes written

use ::metrics::{counter, describe_counter, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::downloader::TaskStatus;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the Prometheus exporter on `addr`
///
/// Idempotent: later calls are no-ops. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics exporter on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "erddap_tasks_total",
        Unit::Count,
        "Dataset tasks finished, labelled by status"
    );
    describe_counter!(
        "erddap_attempts_total",
        Unit::Count,
        "Transport calls made against ERDDAP servers"
    );
    describe_counter!(
        "erddap_retries_total",
        Unit::Count,
        "Retries scheduled after transient failures"
    );
    describe_counter!(
        "erddap_bytes_downloaded_total",
        Unit::Bytes,
        "Payload bytes written to disk"
    );

    Ok(())
}

/// Count a finished task
pub fn record_task(status: TaskStatus) {
    let label = match status {
        TaskStatus::Success => "success",
        TaskStatus::Skipped => "skipped",
        TaskStatus::Failed => "failed",
        TaskStatus::NotStarted => "not_started",
        TaskStatus::Pending | TaskStatus::InProgress => return,
    };
    counter!("erddap_tasks_total", "status" => label).increment(1);
}

/// Count one transport call
pub fn record_attempt() {
    counter!("erddap_attempts_total").increment(1);
}

/// Count one scheduled retry
pub fn record_retry() {
    counter!("erddap_retries_total").increment(1);
}

/// Count written payload bytes
pub fn record_bytes(bytes: u64) {
    counter!("erddap_bytes_downloaded_total").increment(bytes);
}
