use crate::error::{BuildError, PipelineError};
use crate::model::{DependencySet, Target};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

const PROJECTS_DIR: &str = "configs/projects";
const PLATFORMS_DIR: &str = "configs/platforms";

/// Reads targets from a vanagon repository.
///
/// Targets are every `configs/projects/*.rb` crossed with every
/// `configs/platforms/*.rb`. Dependencies come from
/// `bundle exec vanagon dependencies <project> <platform>`, which prints a
/// JSON array of `{"name", "version"}` objects.
pub struct VanagonSource {
    workspace: PathBuf,
    command: Vec<String>,
}

impl VanagonSource {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            command: ["bundle", "exec", "vanagon", "dependencies"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Replaces the dependency command. Project and platform are appended.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }
}

#[async_trait]
impl super::DependencySource for VanagonSource {
    async fn enumerate(&self) -> Result<Vec<Target>, PipelineError> {
        let projects = list_configs(&self.workspace.join(PROJECTS_DIR)).await?;
        let platforms = list_configs(&self.workspace.join(PLATFORMS_DIR)).await?;

        debug!(
            projects = projects.len(),
            platforms = platforms.len(),
            "enumerated vanagon configs"
        );

        let targets = projects
            .iter()
            .flat_map(|project| {
                platforms
                    .iter()
                    .map(move |platform| Target::new(project.clone(), platform.clone()))
            })
            .collect();

        Ok(targets)
    }

    async fn resolve(&self, target: &Target) -> Result<DependencySet, BuildError> {
        let (program, args) = self.command.split_first().ok_or_else(|| BuildError::Resolve {
            target: target.clone(),
            reason: "no dependency command configured".to_string(),
        })?;

        let output = Command::new(program)
            .args(args)
            .arg(&target.project)
            .arg(&target.platform)
            .current_dir(&self.workspace)
            .output()
            .await
            .map_err(|source| BuildError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BuildError::Resolve {
                target: target.clone(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.command.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        parse_dependencies(&String::from_utf8_lossy(&output.stdout)).map_err(|e| {
            BuildError::Resolve {
                target: target.clone(),
                reason: format!("invalid dependency output: {}", e),
            }
        })
    }
}

/// Parses `vanagon dependencies` output. Blank output means no dependencies.
pub(crate) fn parse_dependencies(stdout: &str) -> Result<DependencySet, serde_json::Error> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(DependencySet::default());
    }
    serde_json::from_str(trimmed)
}

/// Sorted file stems of the `*.rb` files in `dir`.
async fn list_configs(dir: &Path) -> Result<Vec<String>, PipelineError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::Enumerate(format!("{}: {}", dir.display(), e)))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::Enumerate(format!("{}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        if path.extension().map(|e| e == "rb").unwrap_or(false) {
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dependency;
    use crate::source::DependencySource;
    use std::fs;

    fn vanagon_layout(projects: &[&str], platforms: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(PROJECTS_DIR)).unwrap();
        fs::create_dir_all(dir.path().join(PLATFORMS_DIR)).unwrap();
        for p in projects {
            fs::write(dir.path().join(PROJECTS_DIR).join(format!("{}.rb", p)), "").unwrap();
        }
        for p in platforms {
            fs::write(dir.path().join(PLATFORMS_DIR).join(format!("{}.rb", p)), "").unwrap();
        }
        fs::write(dir.path().join(PROJECTS_DIR).join("README.md"), "").unwrap();
        dir
    }

    #[test]
    fn test_parse_dependencies() {
        let deps = parse_dependencies(r#"[{"name": "ffi", "version": "'~> 1.9'"}]"#).unwrap();
        assert_eq!(deps.0, vec![Dependency::new("ffi", "'~> 1.9'")]);

        assert!(parse_dependencies("  \n").unwrap().is_empty());
        assert!(parse_dependencies("not json").is_err());
    }

    #[tokio::test]
    async fn test_enumerate_cross_product() {
        let dir = vanagon_layout(&["pdk-runtime", "agent-runtime-main"], &["el-8-x86_64", "windows-2012r2-x64"]);
        let source = VanagonSource::new(dir.path());

        let targets = source.enumerate().await.unwrap();
        assert_eq!(
            targets,
            vec![
                Target::new("agent-runtime-main", "el-8-x86_64"),
                Target::new("agent-runtime-main", "windows-2012r2-x64"),
                Target::new("pdk-runtime", "el-8-x86_64"),
                Target::new("pdk-runtime", "windows-2012r2-x64"),
            ]
        );
    }

    #[tokio::test]
    async fn test_enumerate_missing_configs_is_pipeline_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = VanagonSource::new(dir.path());

        assert!(matches!(
            source.enumerate().await,
            Err(PipelineError::Enumerate(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_runs_command_with_target() {
        let dir = tempfile::tempdir().unwrap();
        let source = VanagonSource::new(dir.path()).with_command(vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"printf '[{"name":"%s","version":"%s"}]' "$0" "$1""#.to_string(),
        ]);

        let deps = source.resolve(&Target::new("agent", "linux")).await.unwrap();
        assert_eq!(deps.0, vec![Dependency::new("agent", "linux")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_failure_is_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = VanagonSource::new(dir.path()).with_command(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo boom >&2; exit 3".to_string(),
        ]);

        let err = source.resolve(&Target::new("agent", "linux")).await.unwrap_err();
        assert!(matches!(err, BuildError::Resolve { .. }));
    }
}
