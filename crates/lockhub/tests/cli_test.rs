//! Integration tests for the `lockhub` binary.
//!
//! Argument parsing, help output, completions, and the config subcommands,
//! all without a reachable bridge.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `lockhub` binary with env isolation.
///
/// Clears all `LOCKHUB_*` env vars and points the config file into `dir`
/// so tests never touch the user's real configuration.
fn lockhub_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("lockhub");
    cmd.env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir)
        .env("LOCKHUB_CONFIG", dir.join("config.toml"))
        .env_remove("LOCKHUB_PROFILE")
        .env_remove("LOCKHUB_SERVER")
        .env_remove("LOCKHUB_USERNAME")
        .env_remove("LOCKHUB_PASSWORD")
        .env_remove("LOCKHUB_OUTPUT")
        .env_remove("LOCKHUB_INSECURE")
        .env_remove("LOCKHUB_TIMEOUT")
        .env_remove("LOCKHUB_LOG_JSON")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = TempDir::new().unwrap();
    let output = lockhub_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    lockhub_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("smart locks")
            .and(predicate::str::contains("serve"))
            .and(predicate::str::contains("passcodes"))
            .and(predicate::str::contains("passage-mode")),
    );
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    lockhub_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lockhub"));
}

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    lockhub_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lockhub"));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let dir = TempDir::new().unwrap();
    lockhub_cmd(dir.path())
        .arg("frobnicate")
        .assert()
        .code(2);
}

#[test]
fn test_passcode_create_rejects_bad_date() {
    let dir = TempDir::new().unwrap();
    lockhub_cmd(dir.path())
        .args([
            "passcodes", "create", "Front Door", "--name", "guest", "--start", "tomorrow",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--start"));
}

// ── Config subcommands ──────────────────────────────────────────────

#[test]
fn test_config_path_follows_env() {
    let dir = TempDir::new().unwrap();
    let expected = dir.path().join("config.toml");
    lockhub_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.display().to_string()));
}

#[test]
fn test_config_profiles_empty() {
    let dir = TempDir::new().unwrap();
    lockhub_cmd(dir.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No profiles configured"));
}

#[test]
fn test_config_set_then_show() {
    let dir = TempDir::new().unwrap();
    lockhub_cmd(dir.path())
        .args(["config", "set", "server", "https://lock-api.example.com"])
        .assert()
        .success();
    lockhub_cmd(dir.path())
        .args(["config", "set", "poll-interval", "120"])
        .assert()
        .success();

    assert!(dir.path().join("config.toml").exists());

    lockhub_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.default]")
                .and(predicate::str::contains("https://lock-api.example.com"))
                .and(predicate::str::contains("poll_interval = 120")),
        );
    lockhub_cmd(dir.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default *"));
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let dir = TempDir::new().unwrap();
    lockhub_cmd(dir.path())
        .args(["config", "set", "colour", "red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown config key"));
}

#[test]
fn test_config_use_unknown_profile() {
    let dir = TempDir::new().unwrap();
    let output = lockhub_cmd(dir.path())
        .args(["config", "use", "cabin"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("cabin"));
}

// ── Commands that need a bridge ─────────────────────────────────────

#[test]
fn test_locks_list_without_config() {
    let dir = TempDir::new().unwrap();
    lockhub_cmd(dir.path())
        .args(["locks", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration file not found"));
}
