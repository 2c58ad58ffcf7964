use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn appman(root: &std::path::Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("appman"));
    cmd.arg("--root").arg(root).env_remove("APPMAN_ROOT");
    cmd
}

#[test]
fn test_available_lists_catalogue() {
    let dir = tempdir().unwrap();

    appman(dir.path())
        .arg("available")
        .assert()
        .success()
        .stdout(predicate::str::contains("Programs available:"))
        .stdout(predicate::str::contains("- selenium-server"))
        .stdout(predicate::str::contains(
            "- webdrivers -> webdriver-chrome, webdriver-firefox",
        ));

    // --- Verify ---
    assert!(dir.path().join("ledger.json").exists());
}

#[test]
fn test_installed_on_fresh_root() {
    let dir = tempdir().unwrap();

    appman(dir.path())
        .arg("installed")
        .assert()
        .success()
        .stdout(predicate::str::contains("No programs installed"));
}

#[test]
fn test_installed_reads_ledger() {
    // --- Setup ---
    let dir = tempdir().unwrap();
    let program_dir = dir.path().join("programs").join("tesseract-data");
    fs::write(
        dir.path().join("ledger.json"),
        serde_json::json!({
            "dependencies": {},
            "installed": {
                "tesseract-data": {
                    "executables": [],
                    "path": program_dir,
                    "version": "4.1.0"
                }
            }
        })
        .to_string(),
    )
    .unwrap();

    // --- Execute & Verify ---
    appman(dir.path())
        .arg("installed")
        .assert()
        .success()
        .stdout(predicate::str::contains("- tesseract-data v4.1.0"));

    appman(dir.path())
        .arg("available")
        .assert()
        .success()
        .stdout(predicate::str::contains("- tesseract-data (installed v4.1.0)"));
}

#[test]
fn test_available_rejects_arguments() {
    let dir = tempdir().unwrap();
    appman(dir.path()).args(["available", "foo"]).assert().failure();
}

#[test]
fn test_install_all_is_rejected() {
    let dir = tempdir().unwrap();

    appman(dir.path())
        .args(["install", "all"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("only in update mode"));
}

#[test]
fn test_unknown_program_aborts_before_any_action() {
    let dir = tempdir().unwrap();

    appman(dir.path())
        .args(["install", "tesseract-data", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot find \"nope\" profile"))
        .stdout(predicate::str::contains(
            "Critical error raised -> Exit (Time elapsed: 00:00:",
        ));

    // --- Verify ---
    assert!(!dir.path().join("programs").join("tesseract-data").exists());
}

#[test]
fn test_update_with_nothing_installed() {
    let dir = tempdir().unwrap();

    appman(dir.path())
        .args(["update", "all"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nothing to update"));
}

#[test]
fn test_corrupt_ledger_is_fatal() {
    // --- Setup ---
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("ledger.json"), "{ not json").unwrap();

    // --- Execute & Verify ---
    appman(dir.path())
        .arg("installed")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ledger"));

    let content = fs::read_to_string(dir.path().join("ledger.json")).unwrap();
    assert_eq!(content, "{ not json");
}

#[test]
fn test_ledger_with_unknown_program_is_fatal() {
    // --- Setup ---
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("ledger.json"),
        r#"{"dependencies": {}, "installed": {"ghost": {"executables": [], "path": "/x", "version": "1"}}}"#,
    )
    .unwrap();

    // --- Execute & Verify ---
    appman(dir.path())
        .args(["remove", "ghost"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_remove_not_installed_is_skipped() {
    let dir = tempdir().unwrap();

    appman(dir.path())
        .args(["remove", "webdrivers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not installed"))
        .stdout(predicate::str::contains("All operations done - Time elapsed: 00:00:"));
}
