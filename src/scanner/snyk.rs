use crate::config::SnykSettings;
use crate::error::ScanError;
use crate::model::{FindingMetadata, Manifest, ScanVerdict, Severity, VulnerabilityFinding};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{run, unexpected_exit, ScanMode};

/// `snyk test` exit code meaning "vulnerabilities found".
const EXIT_VULNS_FOUND: i32 = 1;

/// Monitor-and-test scanning through the snyk CLI.
pub struct SnykScanner {
    settings: SnykSettings,
    branch: Option<String>,
    repository: Option<String>,
    monitor: bool,
    severity_threshold: String,
    command: Vec<String>,
}

impl SnykScanner {
    pub fn new(settings: SnykSettings) -> Self {
        Self {
            settings,
            branch: None,
            repository: None,
            monitor: true,
            severity_threshold: "medium".to_string(),
            command: vec!["snyk".to_string()],
        }
    }

    /// Sanitized branch used to prefix the target reference.
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    /// GitHub `owner/name` used for the monitor's remote URL.
    pub fn with_repository(mut self, repository: Option<String>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_monitor(mut self, monitor: bool) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_severity_threshold(mut self, threshold: String) -> Self {
        self.severity_threshold = threshold;
        self
    }

    /// Replaces the `snyk` executable, e.g. with an interpreter and script.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    fn monitor_args(&self, manifest: &Manifest) -> Vec<String> {
        let mut args = vec![
            "monitor".to_string(),
            format!(
                "--target-reference={}",
                target_reference(self.branch.as_deref(), &manifest.target.project)
            ),
        ];
        if let Some(repo) = &self.repository {
            args.push(format!("--remote-repo-url=https://github.com/{}.git", repo));
        }
        args.push(format!("--org={}", self.settings.org));
        args.push(format!("--project-name={}", manifest.target.platform));
        args.push(file_arg(manifest));
        args
    }

    fn test_args(&self, manifest: &Manifest) -> Vec<String> {
        vec![
            "test".to_string(),
            format!("--severity-threshold={}", self.severity_threshold),
            "--json".to_string(),
            file_arg(manifest),
        ]
    }
}

#[async_trait]
impl super::Scanner for SnykScanner {
    fn name(&self) -> &'static str {
        "snyk"
    }

    fn mode(&self) -> ScanMode {
        ScanMode::MonitorAndTest
    }

    async fn prepare(&self) -> Result<(), ScanError> {
        let output = run(&self.command, &["auth".to_string(), self.settings.token.clone()]).await?;
        if !output.status.success() {
            return Err(unexpected_exit("snyk auth", &output));
        }
        Ok(())
    }

    async fn scan(&self, manifest: &Manifest) -> Result<ScanVerdict, ScanError> {
        let target = &manifest.target;

        if self.monitor {
            let args = self.monitor_args(manifest);
            debug!(project = %target.project, platform = %target.platform, args = ?args, "running snyk monitor");
            let output = run(&self.command, &args).await?;
            if !output.status.success() {
                return Err(unexpected_exit("snyk monitor", &output));
            }
        }

        let output = run(&self.command, &self.test_args(manifest)).await?;
        match output.status.code() {
            Some(0) | Some(EXIT_VULNS_FOUND) => {}
            _ => return Err(unexpected_exit("snyk test", &output)),
        }

        let findings = parse_test_output(&String::from_utf8_lossy(&output.stdout))?;
        info!(
            project = %target.project,
            platform = %target.platform,
            findings = findings.len(),
            "finished snyk test"
        );
        Ok(ScanVerdict::Findings(findings))
    }
}

/// `branch_project` when a branch override is set, otherwise `project`.
pub fn target_reference(branch: Option<&str>, project: &str) -> String {
    match branch {
        Some(branch) if !branch.is_empty() => format!("{}_{}", branch, project),
        _ => project.to_string(),
    }
}

fn file_arg(manifest: &Manifest) -> String {
    format!("--file={}", manifest.lock_path().display())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnykVuln {
    id: String,
    title: Option<String>,
    package_name: String,
    version: String,
    #[serde(default = "unknown_severity")]
    severity: Severity,
    cvss_score: Option<f64>,
    #[serde(default)]
    fixed_in: Vec<String>,
    #[serde(default)]
    identifiers: BTreeMap<String, Vec<String>>,
}

fn unknown_severity() -> Severity {
    Severity::Unknown
}

impl From<SnykVuln> for VulnerabilityFinding {
    fn from(vuln: SnykVuln) -> Self {
        let metadata = FindingMetadata {
            title: vuln.title,
            cvss_score: vuln.cvss_score,
            fixed_in: vuln.fixed_in,
            identifiers: vuln.identifiers.into_values().flatten().collect(),
        };
        VulnerabilityFinding::new(vuln.package_name, vuln.version, vuln.severity, vuln.id)
            .with_metadata(metadata)
    }
}

/// Extracts every `vulnerabilities` entry from `snyk test --json` output.
///
/// The body is an object, or an array of objects when snyk tests several
/// projects at once.
pub(crate) fn parse_test_output(stdout: &str) -> Result<Vec<VulnerabilityFinding>, ScanError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let body: serde_json::Value = serde_json::from_str(trimmed)?;
    let documents = match body {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    let mut findings = Vec::new();
    for mut doc in documents {
        let Some(vulns) = doc.get_mut("vulnerabilities").map(serde_json::Value::take) else {
            continue;
        };
        let vulns: Vec<SnykVuln> = serde_json::from_value(vulns)?;
        findings.extend(vulns.into_iter().map(VulnerabilityFinding::from));
    }
    Ok(findings)
}
