//! End-to-end tests for the `npr` binary
//!
//! Every test points the binary at its own temporary data directory and
//! turns synthetic latency off.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn npr(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("npr").expect("npr binary builds");
    cmd.current_dir(dir.path())
        .env("NPR_DATA_DIR", dir.path().join("data"))
        .env("NPR_SYNTHETIC_LATENCY_MS", "0")
        .env("NPR_SYNTHETIC_COUNT", "4")
        .env_remove("NPR_ARCHIVE_URL")
        .env_remove("NPR_DATABASE_URL")
        .env_remove("NPR_STORE_FILE")
        .env_remove("LOG_OUTPUT");
    cmd
}

#[test]
fn test_validate_and_generate() {
    let dir = TempDir::new().unwrap();

    npr(&dir)
        .args(["validate", "1234567893"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));

    npr(&dir)
        .args(["validate", "1234567890"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("check digit"));

    npr(&dir)
        .args(["generate", "123456789"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1234567893\n"));
}

#[test]
fn test_fetch_then_list_and_stats() {
    let dir = TempDir::new().unwrap();

    let output = npr(&dir).args(["--json", "fetch"]).output().unwrap();
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["sources_processed"], 2);
    assert_eq!(stats["providers_stored"], 8);

    npr(&dir)
        .args(["list", "--limit", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[registry_east]"));

    let output = npr(&dir).args(["--json", "stats"]).output().unwrap();
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total"], 8);
    assert_eq!(stats["by_source"]["registry_west"], 4);

    assert!(dir.path().join("data/providers.csv").exists());
}

#[test]
fn test_add_update_show_delete() {
    let dir = TempDir::new().unwrap();

    npr(&dir)
        .args(["add", "--npi", "1234567893", "--name", "Jane Doe", "--city", "Austin"])
        .assert()
        .success();

    npr(&dir)
        .args(["add", "--npi", "1234567893", "--name", "Someone Else"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate NPI"));

    npr(&dir)
        .args(["update", "1234567893", "--specialty", "Cardiology, Interventional"])
        .assert()
        .success();

    let output = npr(&dir)
        .args(["--json", "show", "1234567893"])
        .output()
        .unwrap();
    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["name"], "Jane Doe");
    assert_eq!(record["city"], "Austin");
    assert_eq!(record["specialty"], "Cardiology, Interventional");
    assert_eq!(record["source"], "manual");

    npr(&dir).args(["delete", "1234567893"]).assert().success();
    npr(&dir)
        .args(["show", "1234567893"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No provider"));
}

#[test]
fn test_clear_requires_confirmation() {
    let dir = TempDir::new().unwrap();
    npr(&dir).arg("fetch").assert().success();

    npr(&dir).arg("clear").assert().failure();
    npr(&dir).args(["clear", "--yes"]).assert().success();

    let output = npr(&dir).args(["--json", "list"]).output().unwrap();
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records, serde_json::json!([]));
}

#[test]
fn test_data_dir_flag_overrides_environment() {
    let dir = TempDir::new().unwrap();
    let other = dir.path().join("elsewhere");

    npr(&dir)
        .arg("--data-dir")
        .arg(&other)
        .arg("init")
        .assert()
        .success();

    let header = fs::read_to_string(other.join("providers.csv")).unwrap();
    assert!(header.starts_with("npi,name,"));
    assert!(!dir.path().join("data").exists());
}

#[test]
fn test_invalid_numeric_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    npr(&dir)
        .env("NPR_FETCH_TIMEOUT_SECS", "soon")
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("NPR_FETCH_TIMEOUT_SECS"));
}
