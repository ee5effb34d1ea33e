//! CLI command for listing a server's datasets

use crate::downloader::{fetch_catalog, RetryExecutor};
use crate::fetcher::HttpTransport;
use crate::server::ServerEndpoint;
use crate::DatasetType;
use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;

/// Datasets subcommand
#[derive(Debug, Args)]
pub struct DatasetsCommand {
    #[command(subcommand)]
    action: DatasetsAction,
}

/// Datasets actions
#[derive(Debug, clap::Subcommand)]
enum DatasetsAction {
    /// List the datasets published by one server
    List {
        /// ERDDAP server root URL
        #[arg(long)]
        erddap_url: String,

        /// Only show datasets of this type (table or grid)
        #[arg(long)]
        dataset_type: Option<DatasetType>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Output format for datasets command
#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

impl DatasetsCommand {
    /// Execute the datasets command
    pub async fn execute(&self) -> Result<()> {
        match &self.action {
            DatasetsAction::List {
                erddap_url,
                dataset_type,
                format,
            } => self.execute_list(erddap_url, *dataset_type, format).await,
        }
    }

    async fn execute_list(
        &self,
        erddap_url: &str,
        dataset_type: Option<DatasetType>,
        format: &OutputFormat,
    ) -> Result<()> {
        let server = ServerEndpoint::parse(erddap_url)?;
        let executor = RetryExecutor::new(Arc::new(HttpTransport::new()));

        let mut catalog = fetch_catalog(&executor, &server, None)
            .await
            .with_context(|| format!("Failed to list datasets on {server}"))?;
        if let Some(dataset_type) = dataset_type {
            catalog.retain_types(&[dataset_type]);
        }

        match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(catalog.entries())
                        .context("Failed to serialize datasets to JSON")?
                );
            }
            OutputFormat::Human => {
                println!("Found {} datasets on {}:\n", catalog.len(), server);
                for entry in catalog.entries() {
                    println!("{} | {}", entry.dataset_type, entry.dataset_id);
                }
            }
        }

        Ok(())
    }
}
