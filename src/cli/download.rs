//! Download command implementation

use crate::downloader::config::{
    DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_BASE_DELAY_MS, DEFAULT_CONCURRENCY,
    DEFAULT_DOWNLOADS_FOLDER, DEFAULT_JITTER_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
    DEFAULT_PER_SERVER_CONCURRENCY, MAX_CONCURRENCY,
};
use crate::downloader::{DownloadOrchestrator, RetryPolicy, RunConfig, RunReport};
use crate::fetcher::HttpTransport;
use crate::shutdown::SharedShutdown;
use crate::DatasetType;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{CliError, DatasetsCommand};

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// ERDDAP bulk downloader CLI
#[derive(Parser, Debug)]
#[command(name = "erddap-downloader")]
#[command(about = "Bulk-download datasets from ERDDAP servers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Log filter used when RUST_LOG is unset (e.g. info, debug, erddap_downloader=trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address while the command runs
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download datasets from one or more servers
    Download(DownloadArgs),

    /// List the datasets a server publishes
    Datasets(DatasetsCommand),
}

/// Download command arguments
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// Comma-separated ERDDAP server root URLs
    #[arg(long, required = true, value_delimiter = ',')]
    pub erddap_urls: Vec<String>,

    /// Comma-separated file types to fetch for every dataset
    #[arg(long, value_delimiter = ',', default_values = ["nc", "das", "iso19115"])]
    pub formats: Vec<String>,

    /// Comma-separated dataset ids; only valid with exactly one server
    #[arg(long, alias = "datasetIDs", value_delimiter = ',')]
    pub dataset_ids: Option<Vec<String>>,

    /// Root folder for downloads and the failure ledger
    #[arg(long, default_value = DEFAULT_DOWNLOADS_FOLDER)]
    pub downloads_folder: PathBuf,

    /// Skip files that already exist with non-zero size
    #[arg(long, default_value_t = false)]
    pub skip_existing: bool,

    /// Include table datasets (the default when neither -t nor -g is given)
    #[arg(short = 't', long, default_value_t = false)]
    pub table_datasets: bool,

    /// Include grid datasets
    #[arg(short = 'g', long, default_value_t = false)]
    pub grid_datasets: bool,

    /// Maximum attempts per file, including the first (range: 1-20)
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds; doubles on every retry
    #[arg(long, default_value_t = DEFAULT_BASE_DELAY_MS)]
    pub base_delay_ms: u64,

    /// Backoff cap in milliseconds
    #[arg(long, default_value_t = DEFAULT_MAX_DELAY_MS)]
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff, in milliseconds
    #[arg(long, default_value_t = DEFAULT_JITTER_MS)]
    pub jitter_ms: u64,

    /// Per-attempt timeout in seconds
    #[arg(long, default_value_t = DEFAULT_ATTEMPT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Number of files downloaded concurrently (default: 4, max: 32)
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Maximum in-flight requests against any single server
    #[arg(long, default_value_t = DEFAULT_PER_SERVER_CONCURRENCY, value_parser = parse_concurrency)]
    pub per_server_concurrency: usize,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl DownloadArgs {
    /// Selected dataset types; table only when no flag is given
    pub fn dataset_types(&self) -> Vec<DatasetType> {
        let mut types = Vec::new();
        if self.table_datasets {
            types.push(DatasetType::Table);
        }
        if self.grid_datasets {
            types.push(DatasetType::Grid);
        }
        if types.is_empty() {
            types.push(DatasetType::Table);
        }
        types
    }

    /// Build the run configuration from the parsed arguments
    pub fn to_config(&self) -> RunConfig {
        let servers = self
            .erddap_urls
            .iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();

        let mut config = RunConfig::new(servers);
        config.formats = self.formats.iter().map(|f| f.trim().to_string()).collect();
        config.dataset_ids = self
            .dataset_ids
            .as_ref()
            .map(|ids| ids.iter().map(|id| id.trim().to_string()).collect());
        config.downloads_folder = self.downloads_folder.clone();
        config.skip_existing = self.skip_existing;
        config.dataset_types = self.dataset_types();
        config.retry = RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            Duration::from_millis(self.jitter_ms),
        );
        config.attempt_timeout = Duration::from_secs(self.timeout_secs);
        config.concurrency = self.concurrency;
        config.per_server_concurrency = self.per_server_concurrency;
        config
    }

    /// Run the download and print the summary
    ///
    /// # Errors
    ///
    /// Configuration errors abort before any request. A completed run with
    /// failed tasks returns [`CliError::TasksFailed`]; a cancelled one
    /// returns [`CliError::Cancelled`].
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let config = self.to_config();
        info!(
            servers = config.servers.len(),
            types = ?config.dataset_types,
            "Starting ERDDAP download"
        );

        let mut orchestrator = DownloadOrchestrator::new(config, Arc::new(HttpTransport::new()))
            .with_shutdown(shutdown);

        let progress = match cli.output_format {
            OutputFormat::Human => {
                let pb = create_progress_bar();
                orchestrator = orchestrator.with_progress(pb.clone());
                Some(pb)
            }
            OutputFormat::Json => None,
        };

        let result = orchestrator.run().await;
        if let Some(pb) = &progress {
            pb.finish_and_clear();
        }
        let report = result?;

        match cli.output_format {
            OutputFormat::Json => output_json(&report)?,
            OutputFormat::Human => output_human(&report),
        }

        if report.cancelled {
            return Err(CliError::Cancelled);
        }
        if report.summary.has_failures() {
            return Err(CliError::TasksFailed(report.summary.failed));
        }
        Ok(())
    }
}

/// Output the run summary as JSON
fn output_json(report: &RunReport) -> Result<(), CliError> {
    let failures: Vec<_> = report
        .outcomes
        .iter()
        .filter(|o| o.cause.is_some() && o.status == crate::downloader::TaskStatus::Failed)
        .map(|o| {
            serde_json::json!({
                "erddap_url": o.task.server.root_url(),
                "dataset_id": o.task.dataset_id,
                "dataset_type": o.task.dataset_type,
                "format": o.task.format,
                "attempts": o.attempts,
                "error": o.cause,
            })
        })
        .collect();

    let output = serde_json::json!({
        "success": !report.summary.has_failures() && !report.cancelled,
        "summary": report.summary,
        "cancelled": report.cancelled,
        "ledger": report.ledger_path.display().to_string(),
        "failures": failures,
    });

    let rendered = serde_json::to_string(&output)
        .map_err(|e| CliError::InvalidArgument(format!("Failed to serialize summary: {e}")))?;
    println!("{rendered}");
    Ok(())
}

/// Output the run summary in human-readable format
fn output_human(report: &RunReport) {
    let summary = &report.summary;
    if report.cancelled {
        println!("\nDownload cancelled.");
    } else if summary.has_failures() {
        println!("\nDownload finished with failures.");
    } else {
        println!("\nDownload completed successfully!");
    }
    println!("Succeeded: {}", summary.succeeded);
    println!("Skipped: {}", summary.skipped);
    println!("Failed: {}", summary.failed);
    if summary.not_started > 0 {
        println!("Not started: {}", summary.not_started);
    }
    if summary.has_failures() {
        println!("Failures recorded in {}", report.ledger_path.display());
    }
}

/// Create the task progress bar; its length is set once tasks are expanded
fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message("Downloading datasets");
    pb
}
