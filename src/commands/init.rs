use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde_json::json;

use crate::cli::{CliArgs, InitArgs};
use crate::commands::common;
use crate::config::{DEFAULT_SERVICE, OutputFormat};
use crate::output::json as json_out;

const CONFIG_DIR: &str = ".pg-migra";
const CONFIG_FILE: &str = "config.yaml";

pub fn run(args: &CliArgs, cmd: &InitArgs) -> Result<()> {
    let resolved = common::load_config(args)?;
    let format = common::output_format(args, &resolved);

    let service = cmd.service.as_deref().unwrap_or(DEFAULT_SERVICE);
    let target = resolve_target_path(cmd.path.as_ref());

    if target.exists() && !cmd.force {
        return Err(anyhow!("Config already exists: {}", target.display()));
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&target, render_config_template(service))?;

    if args.quiet {
        return Ok(());
    }

    if matches!(format, OutputFormat::Json) {
        let payload = json!({
            "path": target.display().to_string(),
            "service": service,
            "created": true,
            "overwritten": cmd.force,
        });
        let body = json_out::emit_json_value(&payload, common::json_pretty(&resolved))?;
        println!("{}", body);
    } else {
        println!("Wrote config to {}", target.display());
    }

    Ok(())
}

fn resolve_target_path(path: Option<&PathBuf>) -> PathBuf {
    match path {
        Some(path)
            if path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| matches!(ext, "yaml" | "yml" | "json")) =>
        {
            path.clone()
        }
        Some(path) => path.join(CONFIG_DIR).join(CONFIG_FILE),
        None => Path::new(CONFIG_DIR).join(CONFIG_FILE),
    }
}

fn render_config_template(service: &str) -> String {
    format!(
        r#"# pg-migra configuration
# Credentials may also come from DATABASE_URL or PGHOST/PGPORT/PGDATABASE/PGUSER/PGPASSWORD.

defaultService: {service}
settings:
  output:
    # Values: pretty | markdown | json
    defaultFormat: pretty
    json:
      pretty: true

services:
  {service}:
    # Source dialect of the compiled DDL. "postgres" disables type translation.
    dialect: cds
    model: [db/schema.sql]
    # Optional external compiler; {{model}} expands to the model paths.
    # compiler:
    #   command: [cds, compile, "{{model}}", --to, sql]
    data:
      paths: [db/data]
    credentials:
      host: localhost
      port: 5432
      database: app
      user: postgres
      password: null
      # sslrootcert: certs/ca.pem

migrations:
  {service}:
    # schema: reference lives next to the target schema.
    # database: reference lives in its own database (required by migra).
    isolation: database
    schema:
      default: public
    database:
      default: app
      reference: app_ref
    deploy:
      tmpFile: tmp/reference.sql
    migrations:
      path: db_changelogs
"#
    )
}
