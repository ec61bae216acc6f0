//! Output formatting for pushfeed (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use pushfeed_core::Frame;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print rows as an ASCII table
    pub fn print_table<T: Tabled>(&self, data: &[T]) {
        if data.is_empty() {
            if !self.quiet {
                println!("No data");
            }
        } else {
            println!("{}", Table::new(data));
        }
    }

    /// Print one item as pretty JSON
    pub fn print_json<T: Serialize>(&self, data: &T) {
        println!(
            "{}",
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

/// Escape a value for CSV output
pub fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Frame display for watch command
#[derive(Debug, Tabled, Serialize)]
pub struct UpdateRow {
    #[tabled(rename = "Target")]
    pub target: String,
    #[tabled(rename = "Type")]
    pub kind: String,
    #[tabled(rename = "Fields")]
    pub fields: String,
}

impl From<&Frame> for UpdateRow {
    fn from(frame: &Frame) -> Self {
        let fields = frame
            .fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, format_json_value(value)))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            target: frame.target_id.to_string(),
            kind: frame.kind.clone(),
            fields,
        }
    }
}

/// Result summary for ask command
#[derive(Debug, Serialize)]
pub struct StreamSummaryRow {
    pub status: String,
    pub chars: usize,
    pub skipped: usize,
}

/// Render a JSON value without quotes around strings
pub fn format_json_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_update_row_from_frame() {
        let frame = Frame::new("metrics", 7u64)
            .with_field("cpu", 0.5)
            .with_field("host", "web-7");
        let row = UpdateRow::from(&frame);
        assert_eq!(row.target, "7");
        assert_eq!(row.kind, "metrics");
        assert_eq!(row.fields, "cpu=0.5 host=web-7");
    }

    #[test]
    fn test_escape_csv_newline() {
        assert_eq!(escape_csv("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn test_output_format_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            output: OutputFormat,
        }
        let parsed: Wrapper = toml::from_str("output = \"csv\"").unwrap();
        assert_eq!(parsed.output, OutputFormat::Csv);
    }
}
