//! Target enumeration and dependency resolution.
//!
//! A [`DependencySource`] knows which targets exist and what gems each one
//! declares. The vanagon implementation reads the workspace layout and
//! shells out to `vanagon dependencies`.

mod vanagon;

pub use vanagon::VanagonSource;

use crate::config::SkipList;
use crate::error::{BuildError, PipelineError};
use crate::model::{DependencySet, Target};
use async_trait::async_trait;

#[async_trait]
pub trait DependencySource: Send + Sync {
    /// Lists every target known to the source, before skip lists apply.
    ///
    /// # Errors
    ///
    /// A failure here invalidates the whole run.
    async fn enumerate(&self) -> Result<Vec<Target>, PipelineError>;

    /// Resolves the raw dependency declarations of one target.
    ///
    /// # Errors
    ///
    /// A failure only drops this target from the run.
    async fn resolve(&self, target: &Target) -> Result<DependencySet, BuildError>;
}

/// Enumerates targets and removes the ones matching either skip list.
pub async fn enumerate_targets(
    source: &dyn DependencySource,
    skip: &SkipList,
) -> Result<Vec<Target>, PipelineError> {
    let targets = source.enumerate().await?;
    Ok(targets.into_iter().filter(|t| skip.allows(t)).collect())
}
