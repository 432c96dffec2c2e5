#![allow(dead_code)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::env;
use std::path::Path;

const CONNECTION_VARS: &[&str] = &[
    "DATABASE_URL",
    "PG_MIGRA_URL",
    "PG_MIGRA_CONFIG",
    "PG_MIGRA_SERVICE",
    "PGHOST",
    "PGPORT",
    "PGDATABASE",
    "PGUSER",
    "PGPASSWORD",
    "PGSSLMODE",
    "PGSSLROOTCERT",
    "RUST_LOG",
];

pub fn integration_enabled() -> bool {
    env::var("PG_MIGRA_INTEGRATION_TESTS")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// The binary, isolated from the developer's environment: runs in `dir`, which
/// also stands in for the home and XDG config directories.
pub fn pg_migra(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("pg-migra");
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env("NO_COLOR", "1");
    for var in CONNECTION_VARS {
        cmd.env_remove(var);
    }
    cmd
}

pub fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("json on stdout")
}

pub fn stderr_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("json on stderr")
}
