//! CLI output integration tests.

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn fadewatch() -> Command {
    cargo_bin_cmd!("fadewatch")
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn help_lists_commands() {
    fadewatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("once"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn version() {
    fadewatch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fadewatch"));
}

#[test]
fn check_accepts_valid_config() {
    let file = config_file(
        r#"
[tracking]
participants = ["0x0000000000000000000000000000000000000001"]
"#,
    );

    fadewatch()
        .args(["check", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ config"))
        .stdout(predicate::str::contains("ready to use"));
}

#[test]
fn check_fails_on_invalid_config() {
    let file = config_file(
        r#"
[tracking]
tracked_limit = 0
"#,
    );

    fadewatch()
        .args(["check", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("✗ config"))
        .stdout(predicate::str::contains("tracked_limit"));
}

#[test]
fn check_warns_on_malformed_seed() {
    let file = config_file(
        r#"
[tracking]
participants = ["not-an-address"]
"#,
    );

    fadewatch()
        .args(["check", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("⚠ seed_addresses"));
}

#[test]
fn missing_config_exits_with_error() {
    fadewatch()
        .args(["once", "--config", "/nonexistent/fadewatch.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
