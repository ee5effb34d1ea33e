//! Dataset catalog discovery from ERDDAP's `allDatasets` table
//!
//! Every ERDDAP server publishes its dataset list as a table dataset named
//! `allDatasets`. The CSV rendition has a header row, a units row (empty
//! `dataStructure`), and one row per dataset. Only the columns needed to
//! build tasks are read, located by header name.

use serde::Serialize;
use tracing::{debug, warn};

use super::{FetcherError, FetcherResult};
use crate::DatasetType;

/// Catalog row id that describes the catalog itself
const CATALOG_SELF_ID: &str = "allDatasets";

/// One dataset advertised by a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// ERDDAP dataset id
    pub dataset_id: String,
    /// Table or grid
    pub dataset_type: DatasetType,
    /// Source-files listing URL, when the server exposes one
    pub files_url: Option<String>,
    /// ISO 19115 metadata URL, when the server exposes one
    pub iso19115_url: Option<String>,
}

/// Parsed catalog for a single server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetCatalog {
    entries: Vec<CatalogEntry>,
}

impl DatasetCatalog {
    /// Build a catalog from already-known entries
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Parse the `allDatasets.csv` body
    ///
    /// # Errors
    ///
    /// Returns [`FetcherError::ParseError`] if the CSV is malformed or the
    /// `datasetID` / `dataStructure` columns are missing.
    pub fn parse_csv(body: &[u8]) -> FetcherResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(body);

        let headers = reader
            .headers()
            .map_err(|e| FetcherError::ParseError(format!("catalog header: {e}")))?
            .clone();

        let column = |name: &str| headers.iter().position(|h| h.trim() == name);
        let id_index = column("datasetID")
            .ok_or_else(|| FetcherError::ParseError("missing datasetID column".to_string()))?;
        let structure_index = column("dataStructure").ok_or_else(|| {
            FetcherError::ParseError("missing dataStructure column".to_string())
        })?;
        let files_index = column("files");
        let iso_index = column("iso19115");

        let mut entries = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| FetcherError::ParseError(format!("catalog row: {e}")))?;

            let dataset_id = record.get(id_index).unwrap_or("").trim();
            let structure = record.get(structure_index).unwrap_or("").trim();

            if dataset_id.is_empty() || dataset_id == CATALOG_SELF_ID || structure.is_empty() {
                continue;
            }

            let dataset_type = match structure.parse::<DatasetType>() {
                Ok(t) => t,
                Err(_) => {
                    warn!(dataset_id, structure, "Skipping dataset with unknown structure");
                    continue;
                }
            };

            let optional = |index: Option<usize>| {
                index
                    .and_then(|i| record.get(i))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };

            entries.push(CatalogEntry {
                dataset_id: dataset_id.to_string(),
                dataset_type,
                files_url: optional(files_index),
                iso19115_url: optional(iso_index),
            });
        }

        debug!(datasets = entries.len(), "Parsed dataset catalog");
        Ok(Self { entries })
    }

    /// All entries in server order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of datasets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog lists no datasets
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the listed dataset ids; ids not on the server are logged
    ///
    /// Requested ids are compared with surrounding whitespace removed.
    pub fn retain_ids(&mut self, ids: &[String]) {
        let wanted: Vec<&str> = ids.iter().map(|id| id.trim()).collect();
        for id in &wanted {
            if !self.entries.iter().any(|e| e.dataset_id == *id) {
                warn!(dataset_id = %id, "Requested dataset not found in server catalog");
            }
        }
        self.entries
            .retain(|e| wanted.contains(&e.dataset_id.as_str()));
    }

    /// Keep only datasets of the selected types
    pub fn retain_types(&mut self, types: &[DatasetType]) {
        self.entries.retain(|e| types.contains(&e.dataset_type));
    }
}
