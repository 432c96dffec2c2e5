use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;

use crate::cli::build_cli;

const BANNER: &str = r"
                                _
  _ __   __ _       _ __ ___  (_) __ _ _ __ __ _
 | '_ \ / _` |_____| '_ ` _ \ | |/ _` | '__/ _` |
 | |_) | (_| |_____| | | | | || | (_| | | | (_| |
 | .__/ \__, |     |_| |_| |_||_|\__, |_|  \__,_|
 |_|    |___/                    |___/
";

pub fn run(command: Option<&str>) -> anyhow::Result<()> {
    let mut cmd = build_cli();

    if let Some(name) = command {
        if let Some(sub) = cmd.find_subcommand_mut(name) {
            sub.print_long_help()?;
            io::stdout().flush()?;
            return Ok(());
        }
    }

    print_banner()?;
    cmd.print_long_help()?;
    io::stdout().flush()?;
    Ok(())
}

fn print_banner() -> io::Result<()> {
    let mut stdout = io::stdout();
    if io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
        writeln!(stdout, "{}", BANNER.red())
    } else {
        writeln!(stdout, "{}", BANNER)
    }
}
