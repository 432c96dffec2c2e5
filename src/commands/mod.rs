mod common;
mod config;
mod deploy;
mod diff;
mod help;
mod init;

use anyhow::Result;

use crate::cli::{CliArgs, CommandKind};

pub fn dispatch(args: &CliArgs) -> Result<()> {
    match &args.command {
        CommandKind::Help { command } => help::run(command.as_deref()),
        CommandKind::Deploy(cmd) => deploy::run(args, cmd),
        CommandKind::Diff(cmd) => diff::run(args, cmd),
        CommandKind::Init(cmd) => init::run(args, cmd),
        CommandKind::Config(_) => config::run(args),
    }
}
