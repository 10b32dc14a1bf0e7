//! Bounded-concurrency scan dispatch.
//!
//! Every manifest gets its own task, but at most `limit` of them are inside
//! the scanner call at once. The permit is taken right before the call and
//! dropped right after it returns.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::model::{Manifest, ScanOutcome, ScanVerdict, Target};
use crate::scanner::{ScanMode, Scanner};

/// Scans every manifest with at most `limit` scans in flight.
///
/// Outcomes are returned in completion order. A failing scan never stops
/// the others: it becomes an empty finding list, or a failed verdict when
/// the scanner tracks failures.
pub async fn dispatch_all(
    scanner: Arc<dyn Scanner>,
    manifests: Vec<Manifest>,
    limit: usize,
) -> Vec<ScanOutcome> {
    if manifests.is_empty() {
        return Vec::new();
    }

    let limit = limit.max(1);
    let mode = scanner.mode();
    let permits = Arc::new(Semaphore::new(limit));
    debug!(manifests = manifests.len(), limit, scanner = scanner.name(), "dispatching scans");

    let mut pending: FuturesUnordered<_> = manifests
        .into_iter()
        .map(|manifest| {
            let target = manifest.target.clone();
            let handle = tokio::spawn(scan_one(scanner.clone(), permits.clone(), manifest));
            async move { (target, handle.await) }
        })
        .collect();

    let mut outcomes = Vec::with_capacity(pending.len());
    while let Some((target, joined)) = pending.next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!(project = %target.project, platform = %target.platform, error = %e, "scan task aborted");
                outcomes.push(degraded(target, mode));
            }
        }
    }
    outcomes
}

async fn scan_one(scanner: Arc<dyn Scanner>, permits: Arc<Semaphore>, manifest: Manifest) -> ScanOutcome {
    let result = {
        // Acquire only fails once the semaphore is closed.
        let _permit = match permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return degraded(manifest.target, scanner.mode()),
        };
        debug!(project = %manifest.target.project, platform = %manifest.target.platform, "running scan");
        scanner.scan(&manifest).await
    };

    match result {
        Ok(verdict) => ScanOutcome::new(manifest.target, verdict),
        Err(e) => {
            warn!(
                project = %manifest.target.project,
                platform = %manifest.target.platform,
                error = %e,
                "error running scan"
            );
            degraded(manifest.target, scanner.mode())
        }
    }
}

fn degraded(target: Target, mode: ScanMode) -> ScanOutcome {
    if mode.tracks_failures() {
        ScanOutcome::new(target, ScanVerdict::Failed)
    } else {
        ScanOutcome::findings(target, Vec::new())
    }
}
