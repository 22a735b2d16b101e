// ABOUTME: Integration tests for the keeld CLI.
// ABOUTME: Validates --help output and argument errors without touching Docker.

use assert_cmd::Command;
use predicates::prelude::*;

fn keeld_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("keeld"))
}

#[test]
fn help_shows_commands() {
    keeld_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("env"));
}

#[test]
fn up_requires_a_remote() {
    keeld_cmd()
        .args(["up", "--project", "app", "--pem", "/tmp/key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--remote"));
}

#[test]
fn env_rm_requires_a_name() {
    keeld_cmd()
        .args(["env", "rm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAMES"));
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();

    keeld_cmd()
        .arg("--config")
        .arg(dir.path().join("missing.yml"))
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn env_commands_need_a_project() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("keel.yml");
    std::fs::write(
        &config,
        format!(
            "project_directory: {}\ndata_directory: {}\n",
            dir.path().join("project").display(),
            dir.path().join("data").display()
        ),
    )
    .unwrap();

    keeld_cmd()
        .arg("--config")
        .arg(&config)
        .args(["env", "ls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}
