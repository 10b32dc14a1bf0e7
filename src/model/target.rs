use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One project/platform combination to be scanned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    pub project: String,
    pub platform: String,
}

impl Target {
    pub fn new(project: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            platform: platform.into(),
        }
    }

    /// Directory name used for this target's manifest.
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.project, self.platform)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project, self.platform)
    }
}

/// A single gem declaration with its raw version constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Ordered dependency declarations of one target. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencySet(pub Vec<Dependency>);

impl DependencySet {
    pub fn new(deps: Vec<Dependency>) -> Self {
        Self(deps)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dependency> {
        self.0.iter()
    }
}

impl FromIterator<Dependency> for DependencySet {
    fn from_iter<I: IntoIterator<Item = Dependency>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A built manifest: declaration plus resolved lock file for one target.
///
/// Read-only once built, and never cleaned up by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub target: Target,
    pub dir: PathBuf,
    pub dependency_count: usize,
}

impl Manifest {
    pub const DECLARATION_FILE: &'static str = "Gemfile";
    pub const LOCK_FILE: &'static str = "Gemfile.lock";

    pub fn declaration_path(&self) -> PathBuf {
        self.dir.join(Self::DECLARATION_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(Self::LOCK_FILE)
    }
}
