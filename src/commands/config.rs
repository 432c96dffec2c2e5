use anyhow::Result;

use crate::cli::CliArgs;
use crate::commands::common;
use crate::config::{IsolationStrategy, OutputFormat, ResolvedConfig};
use crate::output::{Summary, json};

const MASKED: &str = "********";

pub fn run(args: &CliArgs) -> Result<()> {
    let resolved = common::load_config(args)?;
    let format = common::output_format(args, &resolved);

    if args.quiet {
        return Ok(());
    }

    if matches!(format, OutputFormat::Json) {
        let payload = json::config_to_json(&resolved);
        println!(
            "{}",
            json::emit_json_value(&payload, common::json_pretty(&resolved))?
        );
        return Ok(());
    }

    println!("{}", summary(&resolved).render("Config", format));
    Ok(())
}

fn summary(resolved: &ResolvedConfig) -> Summary {
    let connection = &resolved.connection;
    let migrations = &resolved.migrations;
    let database = migrations
        .target_database
        .as_ref()
        .or(connection.database.as_ref());
    let reference = match migrations.isolation {
        IsolationStrategy::Schema => migrations.reference_schema.clone(),
        IsolationStrategy::Database => migrations.reference_database.clone(),
    };
    let model = resolved
        .service
        .model
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut summary = Summary::new()
        .row(
            "configPath",
            resolved
                .config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
        )
        .row("serviceName", &resolved.service_name)
        .optional("host", connection.host.as_ref())
        .row("port", connection.port)
        .optional("database", database)
        .optional("user", connection.user.as_ref())
        .optional("password", connection.password.as_ref().map(|_| MASKED))
        .optional("sslMode", connection.ssl_mode.as_ref())
        .optional(
            "sslRootCert",
            connection.ssl_root_cert.as_ref().map(|p| p.display()),
        )
        .row("timeoutMs", connection.timeout_ms)
        .optional("dialect", resolved.service.dialect.as_ref())
        .row("model", model)
        .row("isolation", migrations.isolation.as_str())
        .row("targetSchema", &migrations.target_schema)
        .row(
            "reference",
            reference.unwrap_or_else(|| "(derived: <target>_ref)".to_string()),
        )
        .row("changelogDir", migrations.changelog_dir.display());
    if migrations.multitenant {
        summary = summary.row("multitenant", "true (ignored)");
    }
    summary
}
