use anyhow::Result;

use crate::cli::CliArgs;
use crate::config::OutputFormat;
use crate::config::{self, CliOverrides, ResolvedConfig};
use crate::error::{AppError, ErrorKind};
use crate::output;

pub fn overrides_from_args(args: &CliArgs) -> CliOverrides {
    CliOverrides {
        config_path: args.config_path.clone(),
        env_file: args.env_file.clone(),
        service: args.service.clone(),
        host: args.host.clone(),
        port: args.port,
        database: args.database.clone(),
        user: args.user.clone(),
        password: args.password.clone(),
    }
}

pub fn load_config(args: &CliArgs) -> Result<ResolvedConfig> {
    let overrides = overrides_from_args(args);
    config::load_from_system(&overrides)
        .map_err(|err| AppError::new(ErrorKind::Config, format!("{:#}", err)).into())
}

pub fn output_format(args: &CliArgs, resolved: &ResolvedConfig) -> OutputFormat {
    output::select_format(&args.output, &resolved.settings)
}

pub fn json_pretty(resolved: &ResolvedConfig) -> bool {
    resolved.settings.output.json_pretty
}
