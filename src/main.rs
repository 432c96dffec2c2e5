use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use pg_migra::cli::{self, CliArgs};
use pg_migra::commands;
use pg_migra::error;
use pg_migra::output::json;

fn main() {
    let args = cli::parse();
    init_logging(args.verbose);

    if let Err(err) = commands::dispatch(&args) {
        report_error(&args, &err);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn,tokio_postgres=error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}

fn report_error(args: &CliArgs, err: &anyhow::Error) {
    let message = err.to_string();
    let kind = error::classify_error(err);
    if args.output.json {
        let payload = json::error_json(&message, kind.as_str());
        if let Ok(body) = json::emit_json_value(&payload, true) {
            let _ = writeln!(io::stderr(), "{}", body);
        }
        return;
    }

    let line = format!("Error: {}", message);
    if should_color_stderr() {
        let _ = writeln!(io::stderr(), "{}", line.red());
    } else {
        let _ = writeln!(io::stderr(), "{}", line);
    }
}

fn should_color_stderr() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    io::stderr().is_terminal()
}
