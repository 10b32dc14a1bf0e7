//! External vulnerability scanners.
//!
//! | Scanner | Mode | Outcome |
//! |---------|------|---------|
//! | [`SnykScanner`] | monitor-and-test | findings list |
//! | [`MendScanner`] | policy-check | pass/fail per target |
//!
//! Both share the dispatch and aggregation path; they differ only in the
//! [`ScanVerdict`] variant a successful scan produces.

mod mend;
mod snyk;

pub use mend::MendScanner;
pub use snyk::{target_reference, SnykScanner};

use crate::config::{Config, ScannerSettings};
use crate::error::ScanError;
use crate::model::{AggregateReport, Manifest, ScanVerdict};
use async_trait::async_trait;
use std::process::Output;
use std::sync::Arc;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Records a snapshot, then tests and reports findings.
    MonitorAndTest,
    /// Reports only pass/fail per target.
    PolicyCheck,
}

impl ScanMode {
    /// Whether a scan error is reported as a target failure rather than
    /// degraded to an empty finding list.
    pub fn tracks_failures(&self) -> bool {
        matches!(self, ScanMode::PolicyCheck)
    }

    /// Process exit status for a finished run. Findings never fail a
    /// monitor-and-test run; a policy check fails when any target failed.
    pub fn exit_code(&self, report: &AggregateReport) -> u8 {
        match self {
            ScanMode::MonitorAndTest => 0,
            ScanMode::PolicyCheck if report.failed => 1,
            ScanMode::PolicyCheck => 0,
        }
    }
}

#[async_trait]
pub trait Scanner: Send + Sync {
    fn name(&self) -> &'static str;

    fn mode(&self) -> ScanMode;

    /// One-time setup before any scan, e.g. authentication.
    async fn prepare(&self) -> Result<(), ScanError> {
        Ok(())
    }

    /// Scans one manifest.
    ///
    /// # Errors
    ///
    /// Only failures outside the tool's documented exit codes are errors.
    async fn scan(&self, manifest: &Manifest) -> Result<ScanVerdict, ScanError>;
}

/// Builds the scanner selected by the configuration.
pub fn from_config(config: &Config) -> Arc<dyn Scanner> {
    match &config.scanner {
        ScannerSettings::Snyk(snyk) => Arc::new(
            SnykScanner::new(snyk.clone())
                .with_branch(config.branch.clone())
                .with_repository(config.repository.clone())
                .with_monitor(!config.no_monitor)
                .with_severity_threshold(config.severity_threshold.clone()),
        ),
        ScannerSettings::Mend(mend) => Arc::new(MendScanner::new(mend.clone())),
    }
}

/// Runs `command` plus `args` to completion, capturing output.
///
/// Paths in `args` resolve against the process working directory.
async fn run(command: &[String], args: &[String]) -> Result<Output, ScanError> {
    let (program, prefix) = command.split_first().ok_or_else(|| ScanError::Spawn {
        program: String::new(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
    })?;

    Command::new(program)
        .args(prefix)
        .args(args)
        .output()
        .await
        .map_err(|source| ScanError::Spawn {
            program: program.clone(),
            source,
        })
}

fn unexpected_exit(command: &str, output: &Output) -> ScanError {
    ScanError::UnexpectedExit {
        command: command.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}
