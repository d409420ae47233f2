//! Integration tests for the wog CLI

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_help_command() {
    let mut cmd = Command::cargo_bin("wog").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("World of Guns"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("catalogue"))
        .stdout(predicate::str::contains("keys"))
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("decrypt"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("cleanup"));
}

#[test]
fn test_version_command() {
    let mut cmd = Command::cargo_bin("wog").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wog"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("wog").unwrap();
    cmd.arg("invalid")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_download_help_lists_batch_flags() {
    let mut cmd = Command::cargo_bin("wog").unwrap();
    cmd.args(["download", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--check-only"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--continue-on-error"))
        .stdout(predicate::str::contains("--update-keys"));
}

#[test]
fn test_info_reports_empty_state_as_json() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("wog").unwrap();
    cmd.args([
        "--base-dir",
        temp.path().to_str().unwrap(),
        "--format",
        "json",
        "info",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"weapon_count\":0"))
    .stdout(predicate::str::contains("\"key_count\":0"));
}

#[test]
fn test_keys_without_catalogue_fails_with_hint() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("wog").unwrap();
    cmd.args(["--base-dir", temp.path().to_str().unwrap(), "keys"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no cached catalogue"));
}

#[test]
fn test_migrate_without_legacy_files_is_a_noop() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("wog").unwrap();
    cmd.args(["--base-dir", temp.path().to_str().unwrap(), "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to import"));

    assert!(!temp.path().join("runtime/data.json").exists());
}

#[test]
fn test_migrate_imports_legacy_text_files() {
    let temp = TempDir::new().unwrap();
    let runtime = temp.path().join("runtime");
    std::fs::create_dir_all(&runtime).unwrap();
    std::fs::write(runtime.join("weapons.txt"), "ak47\nm4a1\n").unwrap();
    std::fs::write(runtime.join("keys.txt"), "ak47 abc123\n").unwrap();

    let mut cmd = Command::cargo_bin("wog").unwrap();
    cmd.args([
        "--base-dir",
        temp.path().to_str().unwrap(),
        "--format",
        "json",
        "migrate",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"imported\":true"))
    .stdout(predicate::str::contains("\"weapon_count\":2"))
    .stdout(predicate::str::contains("\"key_count\":1"));

    assert!(temp.path().join("runtime/data.json").exists());
}

#[test]
fn test_cleanup_removes_orphaned_temp_files() {
    let temp = TempDir::new().unwrap();
    let assets = temp.path().join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("ak47.unity3d.part"), b"partial").unwrap();

    let mut cmd = Command::cargo_bin("wog").unwrap();
    cmd.args([
        "--base-dir",
        temp.path().to_str().unwrap(),
        "--format",
        "json",
        "cleanup",
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"removed\":1"));

    assert!(!assets.join("ak47.unity3d.part").exists());
}

#[test]
fn test_cleanup_with_empty_base_dir_reports_nothing() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("wog").unwrap();
    cmd.args(["--base-dir", temp.path().to_str().unwrap(), "cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to clean"));
}
