use std::fs;

use anyhow::{Context, Result};

use crate::cli::{CliArgs, DiffArgs};
use crate::commands::common;
use crate::config::OutputFormat;
use crate::output::json as json_out;
use crate::pipeline::{Components, Pipeline};

const NO_CHANGES: &str = "-- no changes";

pub fn run(args: &CliArgs, cmd: &DiffArgs) -> Result<()> {
    let resolved = common::load_config(args)?;
    let format = common::output_format(args, &resolved);
    let pretty_json = common::json_pretty(&resolved);

    let components = Components::for_config(&resolved);
    let pipeline = Pipeline::new(resolved, components);
    let report = tokio::runtime::Runtime::new()?.block_on(pipeline.diff_only())?;

    if let Some(path) = &cmd.output {
        fs::write(path, &report.diff)
            .with_context(|| format!("Failed to write diff to {}", path.display()))?;
    }

    if args.quiet {
        return Ok(());
    }

    if matches!(format, OutputFormat::Json) {
        let payload = json_out::diff_report_to_json(&report);
        println!("{}", json_out::emit_json_value(&payload, pretty_json)?);
    } else if report.diff.is_empty() {
        println!("{}", NO_CHANGES);
    } else {
        print!("{}", report.diff);
        if !report.diff.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}
