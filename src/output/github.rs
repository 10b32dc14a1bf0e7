//! GitHub Actions step outputs.
//!
//! `vulns` carries the comma separated finding identities and `failures`
//! the failing targets. Both are a single blank when empty.

use crate::model::AggregateReport;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

fn output_value(value: String) -> String {
    if value.is_empty() {
        " ".to_string()
    } else {
        value
    }
}

fn outputs(report: &AggregateReport) -> [(&'static str, String); 2] {
    [
        ("vulns", output_value(report.finding_identities())),
        ("failures", output_value(report.failed_target_list())),
    ]
}

/// Legacy `::set-output` workflow commands, one per line.
pub fn render_set_output(report: &AggregateReport) -> String {
    outputs(report)
        .iter()
        .map(|(name, value)| format!("::set-output name={}::{}\n", name, value))
        .collect()
}

/// Appends outputs to the `GITHUB_OUTPUT` file, or prints `::set-output`
/// commands when no file is available.
pub fn write_github_output(report: &AggregateReport, output_file: Option<&Path>) -> Result<()> {
    let Some(path) = output_file else {
        print!("{}", render_set_output(report));
        return Ok(());
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    for (name, value) in outputs(report) {
        writeln!(file, "{}={}", name, value)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Severity, Target, VulnerabilityFinding};

    fn report() -> AggregateReport {
        AggregateReport {
            findings: vec![
                VulnerabilityFinding::new("nokogiri", "1.10.4", Severity::High, "A"),
                VulnerabilityFinding::new("rack", "2.0.7", Severity::Medium, "B"),
                VulnerabilityFinding::new("ffi", "1.9.0", Severity::Low, "C"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_render_set_output() {
        let rendered = render_set_output(&report());
        assert_eq!(
            rendered,
            "::set-output name=vulns::nokogiri@1.10.4,rack@2.0.7,ffi@1.9.0\n::set-output name=failures:: \n"
        );
    }

    #[test]
    fn test_render_set_output_empty() {
        let rendered = render_set_output(&AggregateReport::default());
        assert!(rendered.starts_with("::set-output name=vulns:: \n"));
    }

    #[test]
    fn test_write_github_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        std::fs::write(&path, "earlier=1\n").unwrap();

        let mut report = report();
        report.failed = true;
        report.failed_targets.push(Target::new("agent", "linux"));
        write_github_output(&report, Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "earlier=1\nvulns=nokogiri@1.10.4,rack@2.0.7,ffi@1.9.0\nfailures=agent/linux\n"
        );
    }
}
