use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    #[serde(other)]
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra detail carried along with a finding. Never merged between duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixed_in: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
}

/// One vulnerability reported by the scanner.
///
/// Two findings are duplicates when they share `(package_name, version)`,
/// whatever their other fields say.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    pub package_name: String,
    pub version: String,
    pub severity: Severity,
    pub id: String,
    #[serde(flatten)]
    pub metadata: FindingMetadata,
}

impl VulnerabilityFinding {
    pub fn new(
        package_name: impl Into<String>,
        version: impl Into<String>,
        severity: Severity,
        id: impl Into<String>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            version: version.into(),
            severity,
            id: id.into(),
            metadata: FindingMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: FindingMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Deduplication key.
    pub fn key(&self) -> (&str, &str) {
        (&self.package_name, &self.version)
    }

    /// Identity as reported to CI, e.g. `nokogiri@1.10.4`.
    pub fn identity(&self) -> String {
        format!("{}@{}", self.package_name, self.version)
    }
}

/// What a single scan produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanVerdict {
    /// Monitor-and-test mode: the findings of the target, possibly none.
    Findings(Vec<VulnerabilityFinding>),
    /// Policy-check mode: the target passed.
    Passed,
    /// Policy-check mode: the target failed, or its scan errored.
    Failed,
}

/// The result of scanning one manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub target: Target,
    pub verdict: ScanVerdict,
}

impl ScanOutcome {
    pub fn new(target: Target, verdict: ScanVerdict) -> Self {
        Self { target, verdict }
    }

    pub fn findings(target: Target, findings: Vec<VulnerabilityFinding>) -> Self {
        Self::new(target, ScanVerdict::Findings(findings))
    }
}

/// Deduplicated findings of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub findings: Vec<VulnerabilityFinding>,
    pub failed: bool,
    pub failed_targets: Vec<Target>,
    pub targets_scanned: usize,
    pub scanned_at: DateTime<Utc>,
}

impl Default for AggregateReport {
    fn default() -> Self {
        Self {
            findings: Vec::new(),
            failed: false,
            failed_targets: Vec::new(),
            targets_scanned: 0,
            scanned_at: Utc::now(),
        }
    }
}

impl AggregateReport {
    /// Comma separated finding identities, in report order.
    pub fn finding_identities(&self) -> String {
        self.findings
            .iter()
            .map(|f| f.identity())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Comma separated failing targets, rendered like [`Target`]'s `Display`.
    pub fn failed_target_list(&self) -> String {
        self.failed_targets
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }
}
