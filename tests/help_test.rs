mod common;

use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn no_arguments_print_banner_and_help() {
    let dir = TempDir::new().unwrap();
    common::pg_migra(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("|_|    |___/"))
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("diff"));
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let output = common::pg_migra(dir.path())
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&output);

    for name in ["deploy", "diff", "init", "config", "help"] {
        assert!(stdout.contains(name), "missing command: {}", name);
    }
}

#[test]
fn help_for_deploy_shows_legacy_flags() {
    let dir = TempDir::new().unwrap();
    common::pg_migra(dir.path())
        .args(["help", "deploy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--create-db"))
        .stdout(predicate::str::contains("createDB"))
        .stdout(predicate::str::contains("--delta-update"))
        .stdout(predicate::str::contains("deltaUpdate"));
}

#[test]
fn version_flag_prints_package_version() {
    let dir = TempDir::new().unwrap();
    common::pg_migra(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
