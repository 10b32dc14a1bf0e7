//! Two-stage scan pipeline.
//!
//! ```text
//! targets --> [resolve + build manifest] x N --> manifests
//!                                                   |
//!                                   [scan, at most k at once]
//!                                                   |
//!                                   outcomes --> aggregate --> report
//! ```
//!
//! Stage 2 starts only after every stage 1 task has finished.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregate::aggregate;
use crate::config::{Config, SkipList};
use crate::dispatch::dispatch_all;
use crate::error::{BuildError, PipelineError};
use crate::manifest::{BundlerResolver, ManifestBuilder};
use crate::model::{AggregateReport, Manifest, Target};
use crate::scanner::{self, Scanner};
use crate::source::{enumerate_targets, DependencySource, VanagonSource};

pub struct Pipeline {
    source: Arc<dyn DependencySource>,
    builder: Arc<ManifestBuilder>,
    scanner: Arc<dyn Scanner>,
    concurrency_limit: usize,
    build_concurrency: Option<usize>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn DependencySource>,
        builder: Arc<ManifestBuilder>,
        scanner: Arc<dyn Scanner>,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            source,
            builder,
            scanner,
            concurrency_limit,
            build_concurrency: None,
        }
    }

    /// Bounds stage 1. Unbounded when `None`.
    pub fn with_build_concurrency(mut self, limit: Option<usize>) -> Self {
        self.build_concurrency = limit;
        self
    }

    /// Wires the vanagon source, bundler and the configured scanner.
    pub fn from_config(config: &Config) -> Self {
        let source = Arc::new(VanagonSource::new(&config.workspace));
        let builder = Arc::new(ManifestBuilder::new(config.output_root(), Arc::new(BundlerResolver)));
        Self::new(source, builder, scanner::from_config(config), config.concurrency)
            .with_build_concurrency(config.build_concurrency)
    }

    pub fn scanner(&self) -> &Arc<dyn Scanner> {
        &self.scanner
    }

    /// Prepares the scanner, enumerates targets and runs both stages.
    pub async fn execute(&self, skip: &SkipList) -> Result<AggregateReport, PipelineError> {
        self.scanner
            .prepare()
            .await
            .map_err(|source| PipelineError::Prepare {
                scanner: self.scanner.name(),
                source,
            })?;

        let targets = enumerate_targets(self.source.as_ref(), skip).await?;
        self.run(targets).await
    }

    /// Builds a manifest per target, then scans every built manifest.
    ///
    /// Per-target failures are logged and folded into the report.
    pub async fn run(&self, targets: Vec<Target>) -> Result<AggregateReport, PipelineError> {
        info!(targets = targets.len(), "building gemfiles");
        let manifests = self.build_all(targets).await;

        info!(
            manifests = manifests.len(),
            limit = self.concurrency_limit,
            scanner = self.scanner.name(),
            "scanning manifests"
        );
        let outcomes = dispatch_all(self.scanner.clone(), manifests, self.concurrency_limit).await;

        let report = aggregate(outcomes);
        info!(
            findings = report.findings.len(),
            failed = report.failed,
            "scan complete"
        );
        Ok(report)
    }

    /// Stage 1. Returns only the manifests that built successfully.
    pub async fn build_all(&self, targets: Vec<Target>) -> Vec<Manifest> {
        let limit = self.build_concurrency.unwrap_or(targets.len()).max(1);

        stream::iter(targets)
            .map(|target| self.build_target(target))
            .buffer_unordered(limit)
            .filter_map(|built| async move {
                match built {
                    Ok(manifest) => Some(manifest),
                    Err(e) => {
                        warn!(error = %e, "dropping target from scan");
                        None
                    }
                }
            })
            .collect()
            .await
    }

    async fn build_target(&self, target: Target) -> Result<Manifest, BuildError> {
        info!(project = %target.project, platform = %target.platform, "going to process");
        let deps = self.source.resolve(&target).await?;
        self.builder.build(target, &deps).await
    }
}
