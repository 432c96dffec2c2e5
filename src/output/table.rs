use comfy_table::{ContentArrangement, Table, presets};

use crate::config::OutputFormat;

const NOT_SET: &str = "—";
const MAX_VALUE_WIDTH: usize = 120;

/// Two-column key/value listing used by the command summaries.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    rows: Vec<(String, String)>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, key: &str, value: impl ToString) -> Self {
        self.rows.push((key.to_string(), value.to_string()));
        self
    }

    /// Unset values render as a dash.
    pub fn optional(self, key: &str, value: Option<impl ToString>) -> Self {
        let value = value
            .map(|v| v.to_string())
            .unwrap_or_else(|| NOT_SET.to_string());
        self.row(key, value)
    }

    pub fn render(&self, title: &str, format: OutputFormat) -> String {
        let mut table = Table::new();
        let preset = match format {
            OutputFormat::Markdown => presets::ASCII_MARKDOWN,
            _ => presets::UTF8_FULL,
        };
        table
            .load_preset(preset)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![title, "Value"]);

        for (key, value) in &self.rows {
            table.add_row(vec![key.clone(), shorten(value, MAX_VALUE_WIDTH)]);
        }
        table.to_string()
    }
}

/// Keep the first `max` characters; long paths and URLs end in an ellipsis.
fn shorten(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
