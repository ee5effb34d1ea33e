//! Main entry point for the erddap-downloader CLI

use clap::Parser;
use erddap_downloader::cli::{Cli, Commands};
use erddap_downloader::metrics::init_metrics;
use erddap_downloader::shutdown::ShutdownCoordinator;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
///
/// `RUST_LOG` wins; otherwise `--log-level`; otherwise `erddap_downloader=info`.
fn init_tracing(log_level: Option<&str>) {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let default_filter = log_level.unwrap_or("erddap_downloader=info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("erddap_downloader=info"));

    // Logs go to stderr so JSON summaries on stdout stay machine-readable.
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = init_metrics(addr) {
            warn!("Metrics exporter not started: {}", e);
        }
    }

    let shutdown = ShutdownCoordinator::shared();
    shutdown.install_ctrl_c_handler();

    let result = match cli.command {
        Commands::Download(ref args) => args
            .execute(&cli, shutdown.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Datasets(ref datasets_cmd) => datasets_cmd.execute().await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
