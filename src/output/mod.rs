mod cli;
mod github;
mod json;

pub use cli::{print_cli_table, render_cli_table};
pub use github::{render_set_output, write_github_output};
pub use json::print_json;

use crate::model::AggregateReport;
use anyhow::Result;
use std::path::Path;

/// Output format for the aggregate report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// GitHub Actions step outputs
    #[default]
    Github,
    /// JSON format for programmatic use
    Json,
    /// Human-readable table format
    Table,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" | "actions" => Ok(OutputFormat::Github),
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            _ => Err(format!(
                "Unknown format: {}. Use 'github', 'json' or 'table'",
                s
            )),
        }
    }
}

/// Emits the report. `github_output` is the `GITHUB_OUTPUT` file, if any.
pub fn print_result(
    report: &AggregateReport,
    format: OutputFormat,
    github_output: Option<&Path>,
) -> Result<()> {
    match format {
        OutputFormat::Github => write_github_output(report, github_output),
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => print_cli_table(report),
    }
}
