use crate::model::{AggregateReport, Severity};
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Fixed In")]
    fixed_in: String,
}

pub fn print_cli_table(report: &AggregateReport) -> Result<()> {
    println!("{}", render_cli_table(report));
    Ok(())
}

pub fn render_cli_table(report: &AggregateReport) -> String {
    let mut out = format!(
        "Scan completed at: {}\n\n",
        report.scanned_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if report.findings.is_empty() {
        out.push_str("No vulnerabilities found.\n");
    } else {
        out.push_str(&format!(
            "Found {} vulnerabilities:\n\n",
            report.findings.len()
        ));

        let mut findings = report.findings.clone();
        findings.sort_by_key(|f| f.severity);

        let rows: Vec<FindingRow> = findings
            .iter()
            .map(|f| FindingRow {
                severity: f.severity.as_str().to_uppercase(),
                package: f.package_name.clone(),
                version: f.version.clone(),
                id: f.id.clone(),
                title: truncate(f.metadata.title.as_deref().unwrap_or("-"), 50),
                fixed_in: if f.metadata.fixed_in.is_empty() {
                    "-".to_string()
                } else {
                    f.metadata.fixed_in.join(", ")
                },
            })
            .collect();

        out.push_str(&Table::new(rows).with(Style::rounded()).to_string());
        out.push('\n');
    }

    if report.failed {
        out.push_str(&format!(
            "\nPolicy failures on {} targets: {}\n",
            report.failed_targets.len(),
            report
                .failed_targets
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    out.push_str(&format!(
        "\nSummary:\n  Targets scanned: {}\n  Vulnerabilities: {} critical, {} high, {} medium, {} low\n",
        report.targets_scanned,
        report.count_by_severity(Severity::Critical),
        report.count_by_severity(Severity::High),
        report.count_by_severity(Severity::Medium),
        report.count_by_severity(Severity::Low),
    ));

    out
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
