use std::collections::HashSet;
use std::path::PathBuf;

use erddap_downloader::downloader::DatasetTask;
use erddap_downloader::output::{artifact_exists, OutputPathBuilder};
use erddap_downloader::{DatasetType, ServerEndpoint};
use tempfile::TempDir;

#[test]
fn test_path_is_deterministic() {
    let a = OutputPathBuilder::new(PathBuf::from("downloads"), "a.example", "temp01", "nc");
    let b = OutputPathBuilder::new(PathBuf::from("downloads"), "a.example", "temp01", "nc");
    assert_eq!(a.build(), b.build());
    assert_eq!(
        a.build(),
        PathBuf::from("downloads/a.example/temp01/temp01.nc")
    );
}

#[test]
fn test_distinct_triples_never_collide() {
    let servers = ["a.example", "b.example", "a.example_8080"];
    let datasets = ["temp01", "temp02", "cwwcNDBCMet"];
    let formats = ["nc", "das", "iso19115", "csv"];

    let mut seen = HashSet::new();
    for server in servers {
        for dataset in datasets {
            for format in formats {
                let path =
                    OutputPathBuilder::new(PathBuf::from("downloads"), server, dataset, format)
                        .build();
                assert!(seen.insert(path.clone()), "collision on {}", path.display());
            }
        }
    }
    assert_eq!(seen.len(), 36);
}

#[test]
fn test_traversal_components_are_neutralised() {
    let path = OutputPathBuilder::new(PathBuf::from("downloads"), "a.example", "../etc", "nc")
        .build();
    assert!(path.starts_with("downloads/a.example"));
    assert!(!path.components().any(|c| c.as_os_str() == ".."));
}

#[test]
fn test_task_target_uses_server_short_id() {
    let server = ServerEndpoint::parse("http://localhost:8080/erddap/").unwrap();
    let task = DatasetTask::new(server, "temp01", DatasetType::Table, "das");
    assert_eq!(
        task.target_path(&PathBuf::from("downloads")),
        PathBuf::from("downloads/localhost_8080/temp01/temp01.das")
    );
}

#[test]
fn test_ensure_directories_and_existence_check() {
    let temp_dir = TempDir::new().unwrap();
    let builder = OutputPathBuilder::new(temp_dir.path().to_path_buf(), "a.example", "temp01", "nc");

    builder.ensure_directories().unwrap();
    assert!(builder.dataset_dir().is_dir());

    let target = builder.build();
    assert!(!artifact_exists(&target));
    std::fs::write(&target, "").unwrap();
    assert!(!artifact_exists(&target), "empty file does not count");
    std::fs::write(&target, "CDF").unwrap();
    assert!(artifact_exists(&target));
}
