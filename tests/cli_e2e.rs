//! End-to-end CLI tests for the exporter binary.

#![allow(deprecated)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn exporter(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("exporter").unwrap();
    cmd.current_dir(workdir)
        .env_remove("RUST_LOG")
        .args(["--delay", "0", "--jitter", "0"]);
    cmd
}

fn write_manifest(workdir: &Path, rows: &str) {
    std::fs::write(
        workdir.join("uploads.csv"),
        format!("Filename,Extension,Subdomain\n{rows}"),
    )
    .unwrap();
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("exporter").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Re-download hosted uploads"))
        .stdout(predicate::str::contains("--dry-run"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("exporter").unwrap();
    cmd.arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// A missing manifest is fatal.
#[test]
fn test_binary_missing_manifest_fails() {
    let dir = TempDir::new().unwrap();
    exporter(dir.path())
        .args(["--csv", "does-not-exist.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load manifest"));
    assert!(!dir.path().join("downloaded.log").exists());
}

/// Dry run prints the summary and never touches the network or the ledger.
#[test]
fn test_binary_dry_run_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_manifest(dir.path(), "a,png,site\nb,jpg,site\nc,gif,\n");

    exporter(dir.path())
        .args(["--csv", "uploads.csv", "--dry-run", "--base-url", "http://127.0.0.1:9/uploads"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run mode: Yes"))
        .stdout(predicate::str::contains("Total files processed: 3"))
        .stdout(predicate::str::contains("Skipped (dry run): 3"))
        .stdout(predicate::str::contains("No files were downloaded").not())
        .stdout(predicate::str::contains("Detailed log has been saved to:"));

    assert!(!dir.path().join("downloaded.log").exists());
    assert!(dir.path().join("exported_files").is_dir());
    let detailed = std::fs::read_to_string(dir.path().join("detailed.log")).unwrap();
    assert!(detailed.contains("command-line arguments"));
    assert!(detailed.contains("Dry run, skipping download"));
}

/// A full run downloads, and a second run explains why nothing was fetched.
#[test]
fn test_binary_download_then_rerun_is_idempotent() {
    let server = tokio_test::block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uploads/site/a1.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abcd".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        server
    });
    let base_url = format!("{}/uploads", server.uri());
    let dir = TempDir::new().unwrap();
    write_manifest(dir.path(), "a1,png,site\n");

    exporter(dir.path())
        .args(["--csv", "uploads.csv", "--base-url", &base_url])
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloaded successfully: 1"));
    assert_eq!(
        std::fs::read(dir.path().join("exported_files").join("a1.png")).unwrap(),
        b"abcd"
    );

    exporter(dir.path())
        .args(["--csv", "uploads.csv", "--base-url", &base_url])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped (already downloaded): 1"))
        .stdout(predicate::str::contains("No files were downloaded. Possible reasons:"));

    let ledger = std::fs::read_to_string(dir.path().join("downloaded.log")).unwrap();
    assert_eq!(ledger.lines().count(), 1);
}

/// Settings file supplies the subdomain for rows that lack one.
#[test]
fn test_binary_uses_subdomain_from_config() {
    let server = tokio_test::block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uploads/configured/b2.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        server
    });
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("uploads.csv"),
        "Filename,Extension\nb2,txt\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"subdomain": "configured", "unrelated": 1}"#,
    )
    .unwrap();

    exporter(dir.path())
        .args(["--csv", "uploads.csv", "--base-url", &format!("{}/uploads", server.uri())])
        .assert()
        .success()
        .stdout(predicate::str::contains("Downloaded successfully: 1"));
}
