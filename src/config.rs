//! Run configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML tuning
//! file, then the CI environment inputs. CLI flags are applied on top by
//! the binary.
//!
//! # Tuning File
//!
//! Looked up at `<workspace>/.vanagon-scan.toml` unless a path is given
//! explicitly. Secrets never live here; they come from the environment.
//!
//! ```toml
//! scanner = "snyk"
//! concurrency = 20
//! lockfile_dir = "gen_lockfile"
//! severity_threshold = "medium"
//! skip_projects = ["pdk-runtime"]
//! skip_platforms = ["osx-10.14-x86_64"]
//! ```
//!
//! # Environment
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `GITHUB_WORKSPACE` | Repository checkout (required) |
//! | `GITHUB_REPOSITORY` | `owner/name`, used for the monitor remote URL |
//! | `GITHUB_OUTPUT` | File receiving step outputs |
//! | `INPUT_SCANNER` | `snyk` or `mend` |
//! | `INPUT_SNYKTOKEN`, `INPUT_SNYKORG` | Snyk credentials |
//! | `INPUT_NOMONITOR` | Skip `snyk monitor` when non-empty |
//! | `INPUT_MENDAPIKEY`, `INPUT_MENDTOKEN`, `INPUT_MENDURL` | Mend credentials |
//! | `INPUT_PRODUCTNAME`, `INPUT_PROJECTNAME` | Mend product and base project |
//! | `INPUT_MENDAGENT` | Path to the Mend unified agent jar |
//! | `INPUT_SKIPPROJECTS`, `INPUT_SKIPPLATFORMS` | Comma separated skip lists |
//! | `INPUT_BRANCH` | Branch override for the target reference |
//! | `INPUT_SVDEBUG` | Debug logging when non-empty |
//! | `INPUT_CONCURRENCY` | Maximum simultaneous scans |

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::model::Target;

/// Default cap on simultaneously running scanner processes.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default directory, relative to the workspace, receiving generated manifests.
pub const DEFAULT_LOCKFILE_DIR: &str = "gen_lockfile";

pub const CONFIG_FILE_NAME: &str = ".vanagon-scan.toml";

const MAX_BRANCH_LEN: usize = 10;
const DEFAULT_MEND_AGENT: &str = "wss-unified-agent.jar";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    #[default]
    Snyk,
    Mend,
}

impl std::str::FromStr for ScannerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "snyk" => Ok(ScannerKind::Snyk),
            "mend" | "whitesource" => Ok(ScannerKind::Mend),
            _ => Err(format!("Unknown scanner: {}. Use 'snyk' or 'mend'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnykSettings {
    pub token: String,
    pub org: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MendSettings {
    pub api_key: String,
    pub user_key: String,
    pub url: String,
    pub product_name: String,
    pub project_name: String,
    pub agent_jar: PathBuf,
}

/// Credentials and identity of the configured scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerSettings {
    Snyk(SnykSettings),
    Mend(MendSettings),
}

impl ScannerSettings {
    pub fn kind(&self) -> ScannerKind {
        match self {
            ScannerSettings::Snyk(_) => ScannerKind::Snyk,
            ScannerSettings::Mend(_) => ScannerKind::Mend,
        }
    }
}

/// Projects and platforms excluded before the pipeline sees any target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipList {
    pub projects: Vec<String>,
    pub platforms: Vec<String>,
}

impl SkipList {
    pub fn allows(&self, target: &Target) -> bool {
        !self.projects.iter().any(|p| *p == target.project)
            && !self.platforms.iter().any(|p| *p == target.platform)
    }
}

/// Non-secret tuning keys readable from the TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanner: Option<ScannerKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockfile_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_threshold: Option<String>,
    pub skip_projects: Vec<String>,
    pub skip_platforms: Vec<String>,
    pub no_monitor: bool,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn default_path(workspace: &Path) -> PathBuf {
        workspace.join(CONFIG_FILE_NAME)
    }

    /// The tuning file with every default spelled out.
    pub fn generate_default_config() -> String {
        let config = FileConfig {
            scanner: Some(ScannerKind::default()),
            concurrency: Some(DEFAULT_CONCURRENCY),
            build_concurrency: None,
            lockfile_dir: Some(PathBuf::from(DEFAULT_LOCKFILE_DIR)),
            severity_threshold: Some("medium".to_string()),
            skip_projects: Vec::new(),
            skip_platforms: Vec::new(),
            no_monitor: false,
        };
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: PathBuf,
    pub repository: Option<String>,
    pub github_output: Option<PathBuf>,
    pub scanner: ScannerSettings,
    pub no_monitor: bool,
    pub skip: SkipList,
    pub debug: bool,
    /// Sanitized branch override.
    pub branch: Option<String>,
    pub concurrency: usize,
    pub build_concurrency: Option<usize>,
    pub lockfile_dir: PathBuf,
    pub severity_threshold: String,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), config_file)
    }

    /// Loads configuration through `lookup`, treating empty values as unset.
    pub fn from_lookup<F>(lookup: F, config_file: Option<&Path>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let require = |var: &'static str, what: &'static str| {
            get(var).ok_or(ConfigError::Missing { var, what })
        };

        let (TargetSelection { workspace, skip }, file) = load_selection(&lookup, config_file)?;

        let kind = match get("INPUT_SCANNER") {
            Some(value) => value.parse::<ScannerKind>().map_err(|reason| ConfigError::Invalid {
                field: "INPUT_SCANNER".to_string(),
                reason,
            })?,
            None => file.scanner.unwrap_or_default(),
        };

        let scanner = match kind {
            ScannerKind::Snyk => ScannerSettings::Snyk(SnykSettings {
                token: require("INPUT_SNYKTOKEN", "snyk token")?,
                org: require("INPUT_SNYKORG", "snyk org")?,
            }),
            ScannerKind::Mend => ScannerSettings::Mend(MendSettings {
                api_key: require("INPUT_MENDAPIKEY", "mend API key")?,
                user_key: require("INPUT_MENDTOKEN", "mend user token")?,
                url: require("INPUT_MENDURL", "mend URL")?,
                product_name: require("INPUT_PRODUCTNAME", "product name")?,
                project_name: require("INPUT_PROJECTNAME", "base project name")?,
                agent_jar: get("INPUT_MENDAGENT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MEND_AGENT)),
            }),
        };

        let concurrency = match get("INPUT_CONCURRENCY") {
            Some(value) => value.trim().parse::<usize>().map_err(|_| ConfigError::Invalid {
                field: "INPUT_CONCURRENCY".to_string(),
                reason: format!("'{}' is not a positive integer", value),
            })?,
            None => file.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
        };

        let config = Config {
            workspace,
            repository: get("GITHUB_REPOSITORY"),
            github_output: get("GITHUB_OUTPUT").map(PathBuf::from),
            scanner,
            no_monitor: get("INPUT_NOMONITOR").is_some() || file.no_monitor,
            skip,
            debug: get("INPUT_SVDEBUG").is_some(),
            branch: get("INPUT_BRANCH")
                .map(|b| sanitize_branch(&b))
                .filter(|b| !b.is_empty()),
            concurrency,
            build_concurrency: file.build_concurrency,
            lockfile_dir: file
                .lockfile_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCKFILE_DIR)),
            severity_threshold: file
                .severity_threshold
                .unwrap_or_else(|| "medium".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.build_concurrency == Some(0) {
            return Err(ConfigError::Invalid {
                field: "build_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Absolute root under which manifests are written.
    pub fn output_root(&self) -> PathBuf {
        self.workspace.join(&self.lockfile_dir)
    }
}

/// Workspace and skip lists only. Enough to enumerate targets without
/// scanner credentials.
#[derive(Debug, Clone)]
pub struct TargetSelection {
    pub workspace: PathBuf,
    pub skip: SkipList,
}

impl TargetSelection {
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), config_file)
    }

    pub fn from_lookup<F>(lookup: F, config_file: Option<&Path>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        load_selection(&lookup, config_file).map(|(selection, _)| selection)
    }
}

/// Reads the workspace, the tuning file and the merged skip lists.
fn load_selection<F>(
    lookup: &F,
    config_file: Option<&Path>,
) -> Result<(TargetSelection, FileConfig), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    let workspace = get("GITHUB_WORKSPACE")
        .map(PathBuf::from)
        .ok_or(ConfigError::Missing {
            var: "GITHUB_WORKSPACE",
            what: "github workspace",
        })?;

    let file = match config_file {
        Some(path) => FileConfig::load(path)?,
        None => {
            let path = FileConfig::default_path(&workspace);
            if path.exists() {
                FileConfig::load(&path)?
            } else {
                FileConfig::default()
            }
        }
    };

    let mut skip = SkipList {
        projects: file.skip_projects.clone(),
        platforms: file.skip_platforms.clone(),
    };
    if let Some(value) = get("INPUT_SKIPPROJECTS") {
        skip.projects.extend(split_list(&value));
    }
    if let Some(value) = get("INPUT_SKIPPLATFORMS") {
        skip.platforms.extend(split_list(&value));
    }

    Ok((TargetSelection { workspace, skip }, file))
}

/// Truncates a branch name to 10 bytes, then drops everything outside
/// `[A-Za-z0-9-]`.
pub fn sanitize_branch(branch: &str) -> String {
    branch
        .bytes()
        .take(MAX_BRANCH_LEN)
        .filter(|b| b.is_ascii_alphanumeric() || *b == b'-')
        .map(char::from)
        .collect()
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn snyk_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GITHUB_WORKSPACE", "/nonexistent/workspace"),
            ("INPUT_SNYKTOKEN", "token"),
            ("INPUT_SNYKORG", "org"),
        ]
    }

    #[test]
    fn test_sanitize_branch() {
        assert_eq!(sanitize_branch("feature/ABC!! very-long-name"), "featureAB");
        assert_eq!(sanitize_branch("main"), "main");
        assert_eq!(sanitize_branch("release-7.x"), "release-7x");
        assert_eq!(sanitize_branch("////"), "");
    }

    #[test]
    fn test_sanitize_branch_counts_bytes() {
        // "é" is two bytes wide, so the cut lands after "a".
        assert_eq!(sanitize_branch("fix-éé-abcdef"), "fix--a");
        assert_eq!(sanitize_branch("ünïcödé-branch"), "ncd");
    }

    #[test]
    fn test_target_selection_needs_no_credentials() {
        let vars = [
            ("GITHUB_WORKSPACE", "/nonexistent/workspace"),
            ("INPUT_SCANNER", "mend"),
            ("INPUT_SKIPPLATFORMS", "osx-12-x86_64"),
        ];
        let selection = TargetSelection::from_lookup(lookup(&vars), None).unwrap();

        assert_eq!(selection.workspace, PathBuf::from("/nonexistent/workspace"));
        assert_eq!(selection.skip.platforms, vec!["osx-12-x86_64"]);
        assert!(Config::from_lookup(lookup(&vars), None).is_err());
    }

    #[test]
    fn test_split_list_trims_entries() {
        let items: Vec<String> = split_list(" a , b,,c ").collect();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_load_snyk_defaults() {
        let config = Config::from_lookup(lookup(&snyk_env()), None).unwrap();

        assert_eq!(
            config.scanner,
            ScannerSettings::Snyk(SnykSettings {
                token: "token".to_string(),
                org: "org".to_string(),
            })
        );
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(
            config.output_root(),
            PathBuf::from("/nonexistent/workspace/gen_lockfile")
        );
        assert!(!config.no_monitor);
        assert!(!config.debug);
        assert!(config.branch.is_none());
    }

    #[test]
    fn test_missing_token_is_error() {
        let vars = [("GITHUB_WORKSPACE", "/w"), ("INPUT_SNYKORG", "org")];
        let err = Config::from_lookup(lookup(&vars), None).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::Missing {
                var: "INPUT_SNYKTOKEN",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_workspace_is_error() {
        let vars = [("INPUT_SNYKTOKEN", "t"), ("INPUT_SNYKORG", "org")];
        let err = Config::from_lookup(lookup(&vars), None).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: "GITHUB_WORKSPACE", .. }));
    }

    #[test]
    fn test_empty_value_counts_as_unset() {
        let vars = [
            ("GITHUB_WORKSPACE", "/w"),
            ("INPUT_SNYKTOKEN", ""),
            ("INPUT_SNYKORG", "org"),
        ];
        assert!(Config::from_lookup(lookup(&vars), None).is_err());
    }

    #[test]
    fn test_mend_requires_all_settings() {
        let vars = [
            ("GITHUB_WORKSPACE", "/w"),
            ("INPUT_SCANNER", "mend"),
            ("INPUT_MENDAPIKEY", "key"),
            ("INPUT_MENDTOKEN", "user"),
            ("INPUT_MENDURL", "https://saas.mend.io"),
            ("INPUT_PRODUCTNAME", "puppet-runtime"),
        ];
        let err = Config::from_lookup(lookup(&vars), None).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: "INPUT_PROJECTNAME", .. }));
    }

    #[test]
    fn test_mend_settings() {
        let vars = [
            ("GITHUB_WORKSPACE", "/w"),
            ("INPUT_SCANNER", "mend"),
            ("INPUT_MENDAPIKEY", "key"),
            ("INPUT_MENDTOKEN", "user"),
            ("INPUT_MENDURL", "https://saas.mend.io"),
            ("INPUT_PRODUCTNAME", "puppet-runtime"),
            ("INPUT_PROJECTNAME", "runtime"),
        ];
        let config = Config::from_lookup(lookup(&vars), None).unwrap();

        match config.scanner {
            ScannerSettings::Mend(mend) => {
                assert_eq!(mend.project_name, "runtime");
                assert_eq!(mend.agent_jar, PathBuf::from(DEFAULT_MEND_AGENT));
            }
            other => panic!("expected mend settings, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_lists_and_flags() {
        let mut vars = snyk_env();
        vars.push(("INPUT_SKIPPROJECTS", "agent-runtime-5.5.x, pdk-runtime"));
        vars.push(("INPUT_SKIPPLATFORMS", "debian-10-armhf"));
        vars.push(("INPUT_NOMONITOR", "true"));
        vars.push(("INPUT_SVDEBUG", "1"));
        vars.push(("INPUT_BRANCH", "feature/ABC!! very-long-name"));

        let config = Config::from_lookup(lookup(&vars), None).unwrap();

        assert_eq!(config.skip.projects, vec!["agent-runtime-5.5.x", "pdk-runtime"]);
        assert_eq!(config.skip.platforms, vec!["debian-10-armhf"]);
        assert!(config.no_monitor);
        assert!(config.debug);
        assert_eq!(config.branch.as_deref(), Some("featureAB"));
    }

    #[test]
    fn test_invalid_concurrency() {
        let mut vars = snyk_env();
        vars.push(("INPUT_CONCURRENCY", "0"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars), None),
            Err(ConfigError::Invalid { .. })
        ));

        let mut vars = snyk_env();
        vars.push(("INPUT_CONCURRENCY", "many"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars), None),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_file_config_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.toml");
        fs::write(
            &path,
            "concurrency = 4\nbuild_concurrency = 8\nlockfile_dir = \"out\"\nskip_platforms = [\"osx-11-arm64\"]\n",
        )
        .unwrap();

        let mut vars = snyk_env();
        vars.push(("INPUT_SKIPPLATFORMS", "fedora-31-x86_64"));
        let config = Config::from_lookup(lookup(&vars), Some(&path)).unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.build_concurrency, Some(8));
        assert_eq!(config.lockfile_dir, PathBuf::from("out"));
        assert_eq!(config.skip.platforms, vec!["osx-11-arm64", "fedora-31-x86_64"]);

        let mut vars = snyk_env();
        vars.push(("INPUT_CONCURRENCY", "2"));
        let config = Config::from_lookup(lookup(&vars), Some(&path)).unwrap();
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn test_file_config_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.toml");
        fs::write(&path, "concurrency = \"lots\"").unwrap();

        let err = Config::from_lookup(lookup(&snyk_env()), Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_default_config_round_trips() {
        let content = FileConfig::generate_default_config();
        let parsed: FileConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.concurrency, Some(DEFAULT_CONCURRENCY));
        assert_eq!(parsed.scanner, Some(ScannerKind::Snyk));
    }

    #[test]
    fn test_skip_list_allows() {
        let skip = SkipList {
            projects: vec!["pdk-runtime".to_string()],
            platforms: vec!["osx-10.14-x86_64".to_string()],
        };

        assert!(skip.allows(&Target::new("agent-runtime-main", "el-8-x86_64")));
        assert!(!skip.allows(&Target::new("pdk-runtime", "el-8-x86_64")));
        assert!(!skip.allows(&Target::new("agent-runtime-main", "osx-10.14-x86_64")));
    }
}
