use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};

#[derive(Debug, Clone)]
pub struct OutputFlags {
    pub json: bool,
    pub markdown: bool,
    pub pretty: bool,
}

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub service: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub output: OutputFlags,
    pub verbose: u8,
    pub quiet: bool,
    pub command: CommandKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Help { command: Option<String> },
    Deploy(DeployArgs),
    Diff(DiffArgs),
    Init(InitArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeployArgs {
    pub create_db: bool,
    pub delta_update: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffArgs {
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitArgs {
    pub path: Option<PathBuf>,
    pub force: bool,
    pub service: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigArgs;

pub fn build_cli() -> Command {
    let mut cmd = Command::new("pg-migra")
        .about("Deploy a declarative data model to PostgreSQL")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_help_subcommand(true)
        .subcommand_value_name("COMMAND");

    cmd = add_global_args(cmd);

    cmd = cmd.subcommand(command_help());
    cmd = cmd.subcommand(command_deploy());
    cmd = cmd.subcommand(command_diff());
    cmd = cmd.subcommand(command_init());
    cmd = cmd.subcommand(command_config());

    cmd
}

pub fn parse_args() -> CliArgs {
    let matches = build_cli().get_matches();
    parse_matches(&matches)
}

pub fn try_parse_from<I, T>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = build_cli().try_get_matches_from(args)?;
    Ok(parse_matches(&matches))
}

fn add_global_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("config")
            .long("config")
            .value_name("PATH")
            .value_hint(ValueHint::FilePath)
            .global(true)
            .help("Override config file location"),
    )
    .arg(
        Arg::new("env-file")
            .long("env-file")
            .value_name("PATH")
            .value_hint(ValueHint::FilePath)
            .global(true)
            .help("Load environment variables from file (default: .env)"),
    )
    .arg(
        Arg::new("service")
            .long("service")
            .value_name("NAME")
            .global(true)
            .help("Select the configured service (default: db)"),
    )
    .arg(
        Arg::new("host")
            .long("host")
            .value_name("HOST")
            .global(true)
            .help("PostgreSQL hostname"),
    )
    .arg(
        Arg::new("port")
            .long("port")
            .value_name("PORT")
            .value_parser(clap::value_parser!(u16))
            .global(true)
            .help("PostgreSQL port (default: 5432)"),
    )
    .arg(
        Arg::new("database")
            .long("database")
            .value_name("NAME")
            .global(true)
            .help("Target database name"),
    )
    .arg(
        Arg::new("user")
            .long("user")
            .value_name("USER")
            .global(true)
            .help("PostgreSQL username"),
    )
    .arg(
        Arg::new("password")
            .long("password")
            .value_name("PASS")
            .global(true)
            .help("PostgreSQL password"),
    )
    .arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Output as JSON"),
    )
    .arg(
        Arg::new("markdown")
            .long("markdown")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Force markdown table output"),
    )
    .arg(
        Arg::new("pretty")
            .long("pretty")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Force pretty-printed table output"),
    )
    .arg(
        Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .global(true)
            .help("Increase log verbosity (-v info, -vv debug, -vvv trace)"),
    )
    .arg(
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Suppress non-error output"),
    )
}

fn command_help() -> Command {
    Command::new("help")
        .about("Show help for commands")
        .arg(Arg::new("command").value_name("COMMAND"))
}

fn command_deploy() -> Command {
    Command::new("deploy")
        .about("Rebuild the reference, diff it against the target, apply and load data")
        .arg(
            Arg::new("create-db")
                .short('c')
                .long("create-db")
                .visible_alias("createDB")
                .action(ArgAction::SetTrue)
                .help("Create a new database (not supported)"),
        )
        .arg(
            Arg::new("delta-update")
                .short('d')
                .long("delta-update")
                .visible_alias("deltaUpdate")
                .action(ArgAction::SetTrue)
                .help("Load only missing rows instead of replacing all data"),
        )
}

fn command_diff() -> Command {
    Command::new("diff")
        .about("Rebuild the reference and print the pending diff without applying it")
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("PATH")
                .value_hint(ValueHint::FilePath)
                .help("Also write the diff to a file"),
        )
}

fn command_init() -> Command {
    Command::new("init")
        .about("Create config file")
        .arg(
            Arg::new("path")
                .long("path")
                .value_name("path")
                .value_hint(ValueHint::FilePath),
        )
        .arg(Arg::new("force").long("force").action(ArgAction::SetTrue))
}

fn command_config() -> Command {
    Command::new("config").about("Display resolved config")
}

fn parse_matches(matches: &ArgMatches) -> CliArgs {
    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let env_file = matches.get_one::<String>("env-file").map(PathBuf::from);
    let service = matches.get_one::<String>("service").cloned();
    let host = matches.get_one::<String>("host").cloned();
    let port = matches.get_one::<u16>("port").copied();
    let database = matches.get_one::<String>("database").cloned();
    let user = matches.get_one::<String>("user").cloned();
    let password = matches.get_one::<String>("password").cloned();
    let output = OutputFlags {
        json: matches.get_flag("json"),
        markdown: matches.get_flag("markdown"),
        pretty: matches.get_flag("pretty"),
    };
    let verbose = matches.get_count("verbose");
    let quiet = matches.get_flag("quiet");

    let command = match matches.subcommand() {
        Some(("help", sub_m)) => CommandKind::Help {
            command: sub_m.get_one::<String>("command").cloned(),
        },
        Some(("deploy", sub_m)) => CommandKind::Deploy(DeployArgs {
            create_db: sub_m.get_flag("create-db"),
            delta_update: sub_m.get_flag("delta-update"),
        }),
        Some(("diff", sub_m)) => CommandKind::Diff(DiffArgs {
            output: sub_m.get_one::<String>("output").map(PathBuf::from),
        }),
        Some(("init", sub_m)) => CommandKind::Init(InitArgs {
            path: sub_m.get_one::<String>("path").map(PathBuf::from),
            force: sub_m.get_flag("force"),
            service: service.clone(),
        }),
        Some(("config", _)) => CommandKind::Config(ConfigArgs),
        _ => CommandKind::Help { command: None },
    };

    CliArgs {
        config_path,
        env_file,
        service,
        host,
        port,
        database,
        user,
        password,
        output,
        verbose,
        quiet,
        command,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_means_help() {
        let args = try_parse_from(["pg-migra"]).unwrap();
        assert_eq!(args.command, CommandKind::Help { command: None });
    }

    #[test]
    fn deploy_accepts_legacy_flag_names() {
        let args = try_parse_from(["pg-migra", "deploy", "--createDB", "--deltaUpdate"]).unwrap();
        assert_eq!(
            args.command,
            CommandKind::Deploy(DeployArgs {
                create_db: true,
                delta_update: true,
            })
        );

        let args = try_parse_from(["pg-migra", "deploy", "-d"]).unwrap();
        assert_eq!(
            args.command,
            CommandKind::Deploy(DeployArgs {
                create_db: false,
                delta_update: true,
            })
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = try_parse_from([
            "pg-migra", "deploy", "--host", "db", "--port", "6543", "--json", "-vv",
        ])
        .unwrap();
        assert_eq!(args.host.as_deref(), Some("db"));
        assert_eq!(args.port, Some(6543));
        assert!(args.output.json);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn init_picks_up_service() {
        let args = try_parse_from(["pg-migra", "init", "--service", "orders"]).unwrap();
        match args.command {
            CommandKind::Init(init) => assert_eq!(init.service.as_deref(), Some("orders")),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
