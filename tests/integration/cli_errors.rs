//! Binary-level tests for configuration errors
//!
//! Every case here fails validation, so no request ever leaves the process.

use assert_cmd::Command;
use tempfile::TempDir;

fn stderr_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).into_owned()
}

#[test]
fn test_dataset_ids_with_two_servers_exit_nonzero() {
    let temp_dir = TempDir::new().unwrap();

    let assert = Command::cargo_bin("erddap-downloader")
        .unwrap()
        .args([
            "download",
            "--erddap-urls",
            "https://a.example/erddap,https://b.example/erddap",
            "--dataset-ids",
            "temp01",
            "--downloads-folder",
            temp_dir.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(1);
    assert!(stderr_of(assert).contains("exactly one server"));

    assert!(!temp_dir.path().join("missed_formats.csv").exists());
}

#[test]
fn test_unsupported_scheme_exit_nonzero() {
    let temp_dir = TempDir::new().unwrap();

    let assert = Command::cargo_bin("erddap-downloader")
        .unwrap()
        .args([
            "download",
            "--erddap-urls",
            "ftp://a.example/erddap",
            "--downloads-folder",
            temp_dir.path().to_str().unwrap(),
        ])
        .assert()
        .failure();
    assert!(stderr_of(assert).contains("unsupported URL scheme"));
}

#[test]
fn test_duplicate_formats_exit_nonzero() {
    let assert = Command::cargo_bin("erddap-downloader")
        .unwrap()
        .args([
            "download",
            "--erddap-urls",
            "https://a.example/erddap",
            "--formats",
            "nc,nc",
        ])
        .assert()
        .failure();
    assert!(stderr_of(assert).contains("listed twice"));
}

#[test]
fn test_missing_urls_is_usage_error() {
    Command::cargo_bin("erddap-downloader")
        .unwrap()
        .args(["download"])
        .assert()
        .failure();
}
