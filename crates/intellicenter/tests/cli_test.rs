//! Integration tests for the `intellicenter` CLI binary.
//!
//! These tests validate argument parsing, help output, config handling
//! and error exit codes, all without a live appliance.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `intellicenter` binary with env isolation.
///
/// Clears all `INTELLICENTER_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn ic_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("intellicenter");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("INTELLICENTER_PROFILE")
        .env_remove("INTELLICENTER_HOST")
        .env_remove("INTELLICENTER_PORT")
        .env_remove("INTELLICENTER_OUTPUT")
        .env_remove("INTELLICENTER_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = ic_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "Expected 'Usage' in output:\n{stderr}");
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    ic_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("IntelliCenter")
            .and(predicate::str::contains("objects"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_set_requires_changes() {
    let home = tempfile::tempdir().unwrap();
    ic_cmd(home.path())
        .args(["set", "CIRC01"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

// ── Connection errors ───────────────────────────────────────────────

#[test]
fn test_no_config_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    ic_cmd(home.path())
        .arg("info")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No appliance configured"));
}

#[test]
fn test_unreachable_appliance_exits_with_connection_code() {
    let home = tempfile::tempdir().unwrap();
    let port = closed_port().to_string();
    ic_cmd(home.path())
        .args(["--host", "127.0.0.1", "--port", &port, "--timeout", "2", "objects"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Could not connect"));
}

#[test]
fn test_missing_profile_is_not_found() {
    let home = tempfile::tempdir().unwrap();
    ic_cmd(home.path())
        .args(["--profile", "garage", "info"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("garage"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_points_at_toml() {
    let home = tempfile::tempdir().unwrap();
    ic_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_show() {
    let home = tempfile::tempdir().unwrap();
    ic_cmd(home.path())
        .args(["config", "init", "--host", "10.0.0.20", "--name", "home"])
        .assert()
        .success();

    ic_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.home]")
                .and(predicate::str::contains("host = \"10.0.0.20\""))
                .and(predicate::str::contains("default_profile = \"home\"")),
        );

    ic_cmd(home.path())
        .args(["--output", "json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"host\": \"10.0.0.20\""));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let home = tempfile::tempdir().unwrap();
    ic_cmd(home.path())
        .args(["config", "init", "--host", "10.0.0.20"])
        .assert()
        .success();

    ic_cmd(home.path())
        .args(["config", "init", "--host", "10.0.0.21"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    ic_cmd(home.path())
        .args(["config", "init", "--host", "10.0.0.21", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_init_rejects_empty_host() {
    let home = tempfile::tempdir().unwrap();
    ic_cmd(home.path())
        .args(["config", "init", "--host", " "])
        .assert()
        .code(2);
}
