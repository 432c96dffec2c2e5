use anyhow::Result;

use crate::cli::{CliArgs, DeployArgs};
use crate::commands::common;
use crate::config::OutputFormat;
use crate::output::{Summary, json as json_out};
use crate::pipeline::{self, Components, MigrationMode, Pipeline, RunOptions};

pub fn run(args: &CliArgs, cmd: &DeployArgs) -> Result<()> {
    let resolved = common::load_config(args)?;
    let format = common::output_format(args, &resolved);
    let pretty_json = common::json_pretty(&resolved);

    let options = RunOptions {
        create_db: cmd.create_db,
        mode: MigrationMode::from_delta_flag(cmd.delta_update),
    };
    let components = Components::for_config(&resolved);
    let pipeline = Pipeline::new(resolved, components);

    let report = tokio::runtime::Runtime::new()?.block_on(pipeline.run(options))?;

    if args.quiet {
        return Ok(());
    }

    if matches!(format, OutputFormat::Json) {
        let payload = json_out::run_report_to_json(&report);
        println!("{}", json_out::emit_json_value(&payload, pretty_json)?);
        return Ok(());
    }

    let changes = if report.diff.is_empty() {
        "none".to_string()
    } else {
        format!("{} line(s)", report.diff.lines().count())
    };
    let summary = Summary::new()
        .row("Status", "deployed")
        .row("Database", &report.target.database)
        .row("Schema", &report.target.schema)
        .row("Reference", pipeline::describe_reference(&report.reference))
        .row("TLS", report.target.tls.as_str())
        .row("Changes", changes)
        .optional("Changelog", report.changelog.as_ref().map(|p| p.display()))
        .row("DataLoad", report.mode.as_str());
    println!("{}", summary.render("Deploy", format));
    Ok(())
}
