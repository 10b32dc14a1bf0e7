//! Manifest building.
//!
//! Turns a target's dependency set into a `Gemfile` and resolves it into a
//! `Gemfile.lock` under `<root>/<project>_<platform>/`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::BuildError;
use crate::model::{DependencySet, Manifest, Target};

const GEM_SOURCE_LINE: &str = "source ENV['GEM_SOURCE'] || \"https://rubygems.org\"";

/// Produces a lock file next to a declaration file.
#[async_trait]
pub trait LockResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolves the declaration in `dir` into a lock file in the same directory.
    async fn lock(&self, target: &Target, dir: &Path) -> Result<(), BuildError>;
}

/// Runs `bundle lock` in the manifest directory.
pub struct BundlerResolver;

#[async_trait]
impl LockResolver for BundlerResolver {
    fn name(&self) -> &'static str {
        "bundler"
    }

    async fn lock(&self, target: &Target, dir: &Path) -> Result<(), BuildError> {
        let output = Command::new("bundle")
            .arg("lock")
            .current_dir(dir)
            .output()
            .await
            .map_err(|source| BuildError::Spawn {
                program: "bundle".to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(BuildError::Resolver {
                target: target.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

pub struct ManifestBuilder {
    root: PathBuf,
    resolver: Arc<dyn LockResolver>,
    root_ready: Mutex<bool>,
}

impl ManifestBuilder {
    pub fn new(root: impl Into<PathBuf>, resolver: Arc<dyn LockResolver>) -> Self {
        Self {
            root: root.into(),
            resolver,
            root_ready: Mutex::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the output root once. Safe to call from many tasks.
    async fn ensure_root(&self) -> Result<(), BuildError> {
        let mut ready = self.root_ready.lock().await;
        if !*ready {
            tokio::fs::create_dir_all(&self.root)
                .await
                .map_err(|source| BuildError::Io {
                    path: self.root.clone(),
                    source,
                })?;
            *ready = true;
        }
        Ok(())
    }

    /// Writes the declaration for `target` and resolves its lock file.
    ///
    /// An empty dependency set is valid and yields a Gemfile with no gems.
    pub async fn build(&self, target: Target, deps: &DependencySet) -> Result<Manifest, BuildError> {
        if deps.is_empty() {
            info!(project = %target.project, platform = %target.platform, "no gems, creating blank Gemfile");
        }

        self.ensure_root().await?;

        let dir = self.root.join(target.dir_name());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| BuildError::Io {
                path: dir.clone(),
                source,
            })?;

        let manifest = Manifest {
            target,
            dir,
            dependency_count: deps.len(),
        };

        let declaration = manifest.declaration_path();
        tokio::fs::write(&declaration, render_gemfile(deps))
            .await
            .map_err(|source| BuildError::Io {
                path: declaration.clone(),
                source,
            })?;

        debug!(
            project = %manifest.target.project,
            platform = %manifest.target.platform,
            resolver = self.resolver.name(),
            "resolving lock file"
        );
        self.resolver.lock(&manifest.target, &manifest.dir).await?;

        Ok(manifest)
    }
}

/// Renders a Gemfile, one `gem` line per dependency in input order.
pub fn render_gemfile(deps: &DependencySet) -> String {
    let mut gemfile = String::from(GEM_SOURCE_LINE);
    gemfile.push('\n');
    for dep in deps.iter() {
        let constraint = dep.version.trim();
        if constraint.is_empty() {
            gemfile.push_str(&format!("gem \"{}\"\n", dep.name));
        } else if is_quoted(constraint) {
            gemfile.push_str(&format!("gem \"{}\", {}\n", dep.name, constraint));
        } else {
            gemfile.push_str(&format!("gem \"{}\", \"{}\"\n", dep.name, constraint));
        }
    }
    gemfile
}

fn is_quoted(s: &str) -> bool {
    (s.starts_with('\'') || s.starts_with('"')) && s.len() > 1
}
