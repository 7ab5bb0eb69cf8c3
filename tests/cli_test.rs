//! Command-line integration tests.

#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serial_test::serial;

#[test]
fn test_help_lists_options() {
    let mut cmd = cargo_bin_cmd!("plantid");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--on-reject"))
        .stdout(predicate::str::contains("--format"));
}

#[test]
fn test_invalid_on_reject_value() {
    let mut cmd = cargo_bin_cmd!("plantid");
    cmd.args(["--on-reject", "maybe", "leaf.jpg"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'maybe'"));
}

#[test]
#[serial]
fn test_config_path_honors_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("plantid");
    cmd.env("PLANTID_CONFIG", &path).args(["config", "path"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(path.to_string_lossy().as_ref()));
}

#[test]
#[serial]
fn test_config_init_writes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("plantid");
    cmd.env("PLANTID_CONFIG", &path).args(["config", "init"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[models.gate]"));
    assert!(written.contains("min_prob_any"));
}

#[test]
#[serial]
fn test_models_check_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("plantid");
    cmd.env("PLANTID_CONFIG", &path)
        .env("PLANTID_GATE_MODEL", dir.path().join("missing.onnx"))
        .args(["models", "check"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("model file does not exist"));
}

#[test]
#[serial]
fn test_missing_models_fail_classification() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("plantid");
    cmd.env("PLANTID_CONFIG", &config)
        .env("PLANTID_GATE_MODEL", dir.path().join("gate.onnx"))
        .env("PLANTID_SPECIES_MODEL", dir.path().join("species.onnx"))
        .arg(dir.path().join("leaf.jpg"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}
