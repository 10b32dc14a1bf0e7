//! Error types for every stage of a scan run.
//!
//! Only [`ConfigError`] and [`PipelineError`] are fatal. [`BuildError`] and
//! [`ScanError`] concern a single target and are folded into the report by
//! the pipeline instead of being propagated.

use std::path::PathBuf;

use crate::model::Target;

/// Missing or invalid settings, detected before the pipeline starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no {what} set ({var})")]
    Missing { var: &'static str, what: &'static str },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Manifest construction for one target failed; the target is not scanned.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to resolve dependencies for {target}: {reason}")]
    Resolve { target: Target, reason: String },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("lock resolution failed for {target} (exit code {code:?}): {stderr}")]
    Resolver {
        target: Target,
        code: Option<i32>,
        stderr: String,
    },
}

/// The external scanner failed in a way that is not a documented outcome.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{command} exited with unexpected status {code:?}: {stderr}")]
    UnexpectedExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse scanner output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A failure that invalidates the whole run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to enumerate targets: {0}")]
    Enumerate(String),

    #[error("failed to prepare {scanner}: {source}")]
    Prepare {
        scanner: &'static str,
        source: ScanError,
    },
}
