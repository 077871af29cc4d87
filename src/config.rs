//! Launcher and dashboard-server configuration.
//!
//! Two layers:
//! - [`LauncherConfig`]: optional `xray.toml` for the `xray` command, with
//!   `XRAY_HOME` / `XRAY_JAVA` environment overrides on top.
//! - [`LaunchConfig`]: the immutable settings of one dashboard server,
//!   handed from `xray open` to the `xray-server` child through environment
//!   variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::assets::InstallRoot;
use crate::error::XrayError;
use crate::runtime::JavaRuntime;

/// Listening port of the dashboard server.
pub const ENV_PORT: &str = "XRAY_PORT";
/// Absolute path of the static UI directory.
pub const ENV_UI_DIR: &str = "XRAY_UI_DIR";
/// Absolute path of the repository being inspected.
pub const ENV_REPO_ROOT: &str = "XRAY_REPO_ROOT";
/// Install root override.
pub const ENV_HOME: &str = "XRAY_HOME";
/// Java executable override.
pub const ENV_JAVA: &str = "XRAY_JAVA";

/// Port used when `XRAY_PORT` is unset.
pub const DEFAULT_PORT: u16 = 4173;

/// Settings of one dashboard server. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub port: u16,
    pub ui_dir: PathBuf,
    pub repo_root: PathBuf,
}

impl LaunchConfig {
    pub fn new(port: u16, ui_dir: impl Into<PathBuf>, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            port,
            ui_dir: ui_dir.into(),
            repo_root: repo_root.into(),
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an environment lookup function.
    ///
    /// `XRAY_PORT` falls back to [`DEFAULT_PORT`] when unset; the directory
    /// variables are required.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup(ENV_PORT).filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| XrayError::InvalidEnv {
                var: ENV_PORT.to_string(),
                reason: format!("'{}' is not a valid port: {}", raw, e),
            })?,
            None => DEFAULT_PORT,
        };

        let required = |var: &str| -> crate::Result<PathBuf> {
            lookup(var)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| XrayError::InvalidEnv {
                    var: var.to_string(),
                    reason: "not set".to_string(),
                })
        };

        Ok(Self {
            port,
            ui_dir: required(ENV_UI_DIR)?,
            repo_root: required(ENV_REPO_ROOT)?,
        })
    }

    /// Environment overlay that reproduces this configuration in a child.
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_PORT, self.port.to_string()),
            (ENV_UI_DIR, self.ui_dir.to_string_lossy().into_owned()),
            (ENV_REPO_ROOT, self.repo_root.to_string_lossy().into_owned()),
        ]
    }
}

/// Top-level launcher configuration, parsed from `xray.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LauncherConfig {
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub assets: AssetsSection,
    #[serde(default)]
    pub dashboard: DashboardSection,
}

/// `[runtime]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    /// Java executable used for probing and for running the analyzer.
    #[serde(default = "default_java")]
    pub java: String,
}

/// `[assets]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetsSection {
    /// Install root override; assets are looked up beneath `<root>/assets`.
    pub root: Option<PathBuf>,
}

/// `[dashboard]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardSection {
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
    /// How long `xray open` waits for the server before opening the browser.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

fn default_java() -> String {
    "java".to_string()
}

fn default_open_browser() -> bool {
    true
}

fn default_ready_timeout_secs() -> u64 {
    10
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            java: default_java(),
        }
    }
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            open_browser: default_open_browser(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

impl LauncherConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: LauncherConfig =
            toml::from_str(content).map_err(|e| XrayError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub async fn load(path: &Path) -> crate::Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| XrayError::io(format!("failed to read config file {}", path.display()), e))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            XrayError::InvalidConfig(msg) => {
                XrayError::InvalidConfig(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Fail fast on values that would only break later.
    pub fn validate(&self) -> crate::Result<()> {
        if self.runtime.java.trim().is_empty() {
            return Err(XrayError::InvalidConfig(
                "runtime.java must not be empty".to_string(),
            ));
        }
        if self.dashboard.ready_timeout_secs == 0 {
            return Err(XrayError::InvalidConfig(
                "dashboard.ready_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `XRAY_HOME` / `XRAY_JAVA` overrides from an environment lookup.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(home) = lookup(ENV_HOME).filter(|v| !v.is_empty()) {
            self.assets.root = Some(PathBuf::from(home));
        }
        if let Some(java) = lookup(ENV_JAVA).filter(|v| !v.trim().is_empty()) {
            self.runtime.java = java;
        }
        self
    }

    /// Install root: the configured override, else derived from the running
    /// executable.
    pub fn install_root(&self) -> crate::Result<InstallRoot> {
        match &self.assets.root {
            Some(root) => Ok(InstallRoot::new(root)),
            None => InstallRoot::from_current_exe(),
        }
    }

    pub fn java(&self) -> JavaRuntime {
        JavaRuntime::new(self.runtime.java.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_launch_config_from_lookup() {
        let config = LaunchConfig::from_lookup(lookup_from(&[
            (ENV_PORT, "5123"),
            (ENV_UI_DIR, "/opt/xray/assets/ui"),
            (ENV_REPO_ROOT, "/work/repo"),
        ]))
        .unwrap();
        assert_eq!(
            config,
            LaunchConfig::new(5123, "/opt/xray/assets/ui", "/work/repo")
        );
    }

    #[test]
    fn test_launch_config_default_port() {
        let config = LaunchConfig::from_lookup(lookup_from(&[
            (ENV_UI_DIR, "/ui"),
            (ENV_REPO_ROOT, "/repo"),
        ]))
        .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_launch_config_missing_ui_dir() {
        let result = LaunchConfig::from_lookup(lookup_from(&[(ENV_REPO_ROOT, "/repo")]));
        assert!(matches!(
            result,
            Err(XrayError::InvalidEnv { ref var, .. }) if var == ENV_UI_DIR
        ));
    }

    #[test]
    fn test_launch_config_missing_repo_root() {
        let result = LaunchConfig::from_lookup(lookup_from(&[(ENV_UI_DIR, "/ui")]));
        assert!(matches!(
            result,
            Err(XrayError::InvalidEnv { ref var, .. }) if var == ENV_REPO_ROOT
        ));
    }

    #[test]
    fn test_launch_config_bad_port() {
        let result = LaunchConfig::from_lookup(lookup_from(&[
            (ENV_PORT, "not-a-port"),
            (ENV_UI_DIR, "/ui"),
            (ENV_REPO_ROOT, "/repo"),
        ]));
        assert!(matches!(
            result,
            Err(XrayError::InvalidEnv { ref var, .. }) if var == ENV_PORT
        ));
    }

    #[test]
    fn test_launch_config_env_roundtrip() {
        let config = LaunchConfig::new(4000, "/ui", "/repo");
        let env = config.to_env();
        let pairs: Vec<(&str, &str)> = env.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let parsed = LaunchConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_empty_launcher_config_uses_defaults() {
        let config = LauncherConfig::from_toml_str("").unwrap();
        assert_eq!(config.runtime.java, "java");
        assert!(config.assets.root.is_none());
        assert!(config.dashboard.open_browser);
        assert_eq!(config.dashboard.ready_timeout_secs, 10);
    }

    #[test]
    fn test_full_launcher_config() {
        let config = LauncherConfig::from_toml_str(
            r#"
            [runtime]
            java = "/usr/lib/jvm/java-17/bin/java"

            [assets]
            root = "/opt/xray"

            [dashboard]
            open_browser = false
            ready_timeout_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.java().command(), "/usr/lib/jvm/java-17/bin/java");
        assert_eq!(
            config.install_root().unwrap(),
            InstallRoot::new("/opt/xray")
        );
        assert!(!config.dashboard.open_browser);
        assert_eq!(config.dashboard.ready_timeout_secs, 3);
    }

    #[test]
    fn test_launcher_config_rejects_empty_java() {
        let result = LauncherConfig::from_toml_str("[runtime]\njava = \"  \"\n");
        assert!(
            matches!(result, Err(XrayError::InvalidConfig(ref msg)) if msg.contains("runtime.java"))
        );
    }

    #[test]
    fn test_launcher_config_rejects_zero_timeout() {
        let result = LauncherConfig::from_toml_str("[dashboard]\nready_timeout_secs = 0\n");
        assert!(
            matches!(result, Err(XrayError::InvalidConfig(ref msg)) if msg.contains("ready_timeout_secs"))
        );
    }

    #[test]
    fn test_launcher_config_rejects_unknown_keys() {
        let result = LauncherConfig::from_toml_str("[dashboard]\nport = 80\n");
        assert!(matches!(result, Err(XrayError::InvalidConfig(_))));
    }

    #[test]
    fn test_env_overrides() {
        let config = LauncherConfig::default().apply_env(lookup_from(&[
            (ENV_HOME, "/tmp/xray-home"),
            (ENV_JAVA, "/custom/java"),
        ]));
        assert_eq!(config.assets.root, Some(PathBuf::from("/tmp/xray-home")));
        assert_eq!(config.runtime.java, "/custom/java");

        let untouched = LauncherConfig::default().apply_env(lookup_from(&[]));
        assert_eq!(untouched.runtime.java, "java");
        assert!(untouched.assets.root.is_none());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = LauncherConfig::load(&dir.path().join("xray.toml")).await;
        assert!(matches!(result, Err(XrayError::Io { .. })));
    }

    #[tokio::test]
    async fn test_load_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xray.toml");
        std::fs::write(&path, "[runtime\n").unwrap();
        let err = LauncherConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("xray.toml"));
    }
}
