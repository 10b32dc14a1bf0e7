//! Merging of per-target scan outcomes into one report.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::model::{AggregateReport, ScanOutcome, ScanVerdict};

/// Merges outcomes in the order given.
///
/// Findings are deduplicated on [`crate::model::VulnerabilityFinding::key`];
/// the first one seen is kept and later duplicates are dropped whole. Any
/// failed verdict sets the report's failure flag and records the target.
pub fn aggregate(outcomes: Vec<ScanOutcome>) -> AggregateReport {
    let mut report = AggregateReport {
        targets_scanned: outcomes.len(),
        ..Default::default()
    };
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for outcome in outcomes {
        match outcome.verdict {
            ScanVerdict::Findings(findings) => {
                for finding in findings {
                    let (name, version) = finding.key();
                    if seen.insert((name.to_string(), version.to_string())) {
                        report.findings.push(finding);
                    }
                }
            }
            ScanVerdict::Passed => {
                debug!(project = %outcome.target.project, platform = %outcome.target.platform, "target passed");
            }
            ScanVerdict::Failed => {
                warn!(project = %outcome.target.project, platform = %outcome.target.platform, "target failed");
                report.failed = true;
                report.failed_targets.push(outcome.target);
            }
        }
    }

    report
}
