//! Core data types for targets, manifests, findings and reports.
//!
//! - [`Target`] - One project/platform combination
//! - [`DependencySet`] - The raw gem declarations of a target
//! - [`Manifest`] - The Gemfile + Gemfile.lock built for a target
//! - [`VulnerabilityFinding`] - A vulnerability reported by the scanner
//! - [`ScanOutcome`] - The result of scanning one manifest
//! - [`AggregateReport`] - The deduplicated result of a whole run
//!
//! # Example
//!
//! ```
//! use vanagon_scan::model::{AggregateReport, Target};
//!
//! let target = Target::new("agent-runtime-main", "el-8-x86_64");
//! let report = AggregateReport::default();
//!
//! assert_eq!(target.to_string(), "agent-runtime-main/el-8-x86_64");
//! assert!(report.findings.is_empty());
//! ```

mod finding;
mod target;

pub use finding::*;
pub use target::*;
