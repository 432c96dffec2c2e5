pub mod json;
pub mod table;

use std::io::IsTerminal;

use crate::cli::OutputFlags;
use crate::config::{OutputFormat, SettingsResolved};

pub use table::Summary;

/// Explicit flags win; otherwise the configured default on a terminal and
/// markdown when piped.
pub fn select_format(flags: &OutputFlags, settings: &SettingsResolved) -> OutputFormat {
    match (flags.json, flags.markdown, flags.pretty) {
        (true, _, _) => OutputFormat::Json,
        (_, true, _) => OutputFormat::Markdown,
        (_, _, true) => OutputFormat::Pretty,
        _ if std::io::stdout().is_terminal() => settings.output.default_format,
        _ => OutputFormat::Markdown,
    }
}
