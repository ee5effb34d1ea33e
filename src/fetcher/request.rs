//! Resource URL construction for dataset downloads
//!
//! ERDDAP serves each dataset at `{server}/{protocol}/{datasetID}.{fileType}`
//! where the protocol segment depends on the dataset structure. The segment
//! comes from [`crate::DATASET_ROUTES`].

use url::Url;

use super::{FetcherError, FetcherResult};
use crate::DatasetType;

/// Build the download URL for one dataset in one format
///
/// Pure: performs no I/O.
///
/// # Errors
///
/// Returns [`FetcherError::InvalidRequest`] if the dataset type has no route,
/// the dataset id or format is empty, or the result is not a valid absolute URL.
///
/// # Examples
///
/// ```
/// use erddap_downloader::fetcher::build_dataset_url;
/// use erddap_downloader::DatasetType;
///
/// let url = build_dataset_url("https://a.example/erddap", "temp01", DatasetType::Table, "nc").unwrap();
/// assert_eq!(url, "https://a.example/erddap/tabledap/temp01.nc");
/// ```
pub fn build_dataset_url(
    server_root: &str,
    dataset_id: &str,
    dataset_type: DatasetType,
    format: &str,
) -> FetcherResult<String> {
    let segment = dataset_type.route_segment().ok_or_else(|| {
        FetcherError::InvalidRequest(format!("no route for dataset type {dataset_type}"))
    })?;

    if dataset_id.trim().is_empty() {
        return Err(FetcherError::InvalidRequest(
            "dataset id cannot be empty".to_string(),
        ));
    }
    if format.trim().is_empty() {
        return Err(FetcherError::InvalidRequest(
            "format cannot be empty".to_string(),
        ));
    }

    let url = format!(
        "{}/{}/{}.{}",
        server_root.trim_end_matches('/'),
        segment,
        dataset_id,
        format
    );

    Url::parse(&url).map_err(|e| FetcherError::InvalidRequest(format!("{url}: {e}")))?;
    Ok(url)
}

/// Build the catalog URL listing every dataset on a server
pub fn build_catalog_url(server_root: &str) -> String {
    format!(
        "{}/tabledap/allDatasets.csv?datasetID%2CdataStructure%2Cfiles%2Ciso19115",
        server_root.trim_end_matches('/')
    )
}
