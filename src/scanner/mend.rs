use crate::config::MendSettings;
use crate::error::ScanError;
use crate::model::{Manifest, ScanVerdict};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{run, ScanMode};

/// Policy-check scanning through the Mend unified agent.
///
/// Exit status 0 passes the target; any other exit status is a policy
/// failure. Only a failure to run the agent at all is a [`ScanError`].
pub struct MendScanner {
    settings: MendSettings,
    command: Vec<String>,
}

impl MendScanner {
    pub fn new(settings: MendSettings) -> Self {
        Self {
            settings,
            command: vec!["java".to_string()],
        }
    }

    /// Replaces the `java` launcher.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    fn project_name(&self, manifest: &Manifest) -> String {
        format!(
            "{}-{}-{}",
            self.settings.project_name, manifest.target.project, manifest.target.platform
        )
    }

    fn agent_args(&self, manifest: &Manifest) -> Vec<String> {
        vec![
            "-jar".to_string(),
            self.settings.agent_jar.display().to_string(),
            "-d".to_string(),
            manifest.dir.display().to_string(),
            "-apiKey".to_string(),
            self.settings.api_key.clone(),
            "-userKey".to_string(),
            self.settings.user_key.clone(),
            "-wss.url".to_string(),
            self.settings.url.clone(),
            "-product".to_string(),
            self.settings.product_name.clone(),
            "-project".to_string(),
            self.project_name(manifest),
        ]
    }
}

#[async_trait]
impl super::Scanner for MendScanner {
    fn name(&self) -> &'static str {
        "mend"
    }

    fn mode(&self) -> ScanMode {
        ScanMode::PolicyCheck
    }

    async fn scan(&self, manifest: &Manifest) -> Result<ScanVerdict, ScanError> {
        let target = &manifest.target;
        debug!(project = %target.project, platform = %target.platform, "running mend unified agent");

        let output = run(&self.command, &self.agent_args(manifest)).await?;
        if output.status.success() {
            return Ok(ScanVerdict::Passed);
        }

        warn!(
            project = %target.project,
            platform = %target.platform,
            code = ?output.status.code(),
            "mend policy check failed, see the mend console for details"
        );
        Ok(ScanVerdict::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Target;
    use crate::scanner::Scanner;
    use std::path::PathBuf;

    fn settings() -> MendSettings {
        MendSettings {
            api_key: "key".to_string(),
            user_key: "user".to_string(),
            url: "https://saas.mend.io/agent".to_string(),
            product_name: "puppet-runtime".to_string(),
            project_name: "runtime".to_string(),
            agent_jar: PathBuf::from("/opt/wss-unified-agent.jar"),
        }
    }

    fn manifest(dir: PathBuf) -> Manifest {
        Manifest {
            target: Target::new("agent", "linux"),
            dir,
            dependency_count: 0,
        }
    }

    #[test]
    fn test_agent_args() {
        let scanner = MendScanner::new(settings());
        let args = scanner.agent_args(&manifest(PathBuf::from("/w/gen_lockfile/agent_linux")));

        assert_eq!(&args[..4], &["-jar", "/opt/wss-unified-agent.jar", "-d", "/w/gen_lockfile/agent_linux"]);
        assert_eq!(args.last().map(String::as_str), Some("runtime-agent-linux"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scan_verdicts() {
        let dir = tempfile::tempdir().unwrap();
        let m = manifest(dir.path().to_path_buf());

        let pass = MendScanner::new(settings()).with_command(vec!["true".to_string()]);
        assert_eq!(pass.scan(&m).await.unwrap(), ScanVerdict::Passed);

        let fail = MendScanner::new(settings()).with_command(vec!["false".to_string()]);
        assert_eq!(fail.scan(&m).await.unwrap(), ScanVerdict::Failed);

        let missing = MendScanner::new(settings())
            .with_command(vec!["/nonexistent/java-binary".to_string()]);
        assert!(matches!(missing.scan(&m).await, Err(ScanError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_relative_agent_jar_resolves_from_process_dir() {
        let dir = tempfile::tempdir().unwrap();
        let m = manifest(dir.path().to_path_buf());
        let mut relative = settings();
        // Present in the crate root, which is the test process directory.
        relative.agent_jar = PathBuf::from("Cargo.toml");

        // $1 is -jar, $2 the jar path.
        let java = ["sh", "-c", r#"test -f "$2""#, "java"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let scanner = MendScanner::new(relative).with_command(java);

        assert_eq!(scanner.scan(&m).await.unwrap(), ScanVerdict::Passed);
    }
}
