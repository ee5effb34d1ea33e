//! Unit tests for CLI argument parsing

use clap::Parser;
use erddap_downloader::cli::{Cli, Commands, OutputFormat};
use std::time::Duration;

fn download_config(args: &[&str]) -> erddap_downloader::downloader::RunConfig {
    let mut full = vec!["erddap-downloader"];
    full.extend_from_slice(args);
    match Cli::parse_from(full).command {
        Commands::Download(args) => args.to_config(),
        _ => panic!("expected download command"),
    }
}

#[test]
fn test_cli_retry_flags_reach_policy() {
    let config = download_config(&[
        "download",
        "--erddap-urls",
        "https://a.example/erddap",
        "--max-attempts",
        "7",
        "--timeout-secs",
        "15",
    ]);
    assert_eq!(config.retry.max_attempts(), 7);
    assert_eq!(config.attempt_timeout, Duration::from_secs(15));
}

#[test]
fn test_cli_global_flags() {
    let cli = Cli::parse_from([
        "erddap-downloader",
        "--output-format",
        "json",
        "--log-level",
        "debug",
        "download",
        "--erddap-urls",
        "https://a.example/erddap",
    ]);
    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    assert!(cli.metrics_addr.is_none());
}

#[test]
fn test_cli_legacy_dataset_ids_alias() {
    let config = download_config(&[
        "download",
        "--erddap-urls",
        "https://a.example/erddap",
        "--datasetIDs",
        "temp01",
    ]);
    assert_eq!(config.dataset_ids, Some(vec!["temp01".to_string()]));
}

#[test]
fn test_cli_rejects_excessive_concurrency() {
    let result = Cli::try_parse_from([
        "erddap-downloader",
        "download",
        "--erddap-urls",
        "https://a.example/erddap",
        "--concurrency",
        "64",
    ]);
    assert!(result.is_err());
}
