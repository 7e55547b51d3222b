//! Configuration models that aggregate all settings.
//!
//! `AppConfig` combines the user-editable settings with the directory layout
//! derived from the dashboard root.

use crate::config::error::{ConfigError, ConfigResult};
use fd_protocol::config_models::DashboardConfig;
use std::path::{Path, PathBuf};

/// Name of the settings directory under the dashboard root.
pub const SETTINGS_DIR: &str = ".flowdeck";

/// Every directory and script the core reads from or writes to.
///
/// ```text
/// <root>/
/// ├── .flowdeck/config.toml
/// ├── agent/
/// │   ├── run-agent.sh
/// │   ├── scan-app.sh
/// │   └── logs/
/// ├── data/
/// │   ├── discovery/
/// │   ├── recordings/
/// │   └── screenshots/
/// └── maestro/
///     ├── flows/
///     │   └── generated/
///     └── results/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub discovery_dir: PathBuf,
    pub recordings_dir: PathBuf,
    pub screenshots_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub agent_dir: PathBuf,
    pub agent_script: PathBuf,
    pub scanner_script: PathBuf,
    /// Root of the local flow tree.
    pub flows_dir: PathBuf,
    /// Where synthesized flow documents land, inside the local tree.
    pub generated_flows_dir: PathBuf,
    pub results_dir: PathBuf,
}

/// Directory of the local tree that holds synthesized documents.
pub const GENERATED_SUBDIR: &str = "generated";

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let data_dir = root.join("data");
        let agent_dir = root.join("agent");
        let maestro_dir = root.join("maestro");
        let flows_dir = maestro_dir.join("flows");

        Self {
            discovery_dir: data_dir.join("discovery"),
            recordings_dir: data_dir.join("recordings"),
            screenshots_dir: data_dir.join("screenshots"),
            logs_dir: agent_dir.join("logs"),
            agent_script: agent_dir.join("run-agent.sh"),
            scanner_script: agent_dir.join("scan-app.sh"),
            generated_flows_dir: flows_dir.join(GENERATED_SUBDIR),
            results_dir: maestro_dir.join("results"),
            flows_dir,
            agent_dir,
            data_dir,
            root,
        }
    }

    /// Create every working directory that does not exist yet.
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        for dir in [
            &self.data_dir,
            &self.discovery_dir,
            &self.recordings_dir,
            &self.screenshots_dir,
            &self.logs_dir,
            &self.generated_flows_dir,
            &self.results_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::DirectoryCreate {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Path of the report the scanner writes for `scan_id`.
    pub fn report_path(&self, scan_id: &str) -> PathBuf {
        self.discovery_dir.join(format!("{scan_id}_report.json"))
    }
}

/// Unified application configuration.
///
/// # Example
///
/// ```rust,no_run
/// use fd_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Local flows live in {}", config.layout.flows_dir.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Settings from `.flowdeck/config.toml`.
    pub settings: DashboardConfig,

    /// Directory layout under the dashboard root.
    pub layout: WorkspaceLayout,
}

impl AppConfig {
    pub fn with_defaults(root: &Path) -> Self {
        Self {
            settings: DashboardConfig::default(),
            layout: WorkspaceLayout::new(root),
        }
    }

    /// The application project's flow tree, if the repository has one.
    pub fn fallback_flows_dir(&self) -> Option<PathBuf> {
        if self.settings.repo_path.is_empty() {
            return None;
        }
        let dir = Path::new(&self.settings.repo_path).join("maestro");
        dir.is_dir().then(|| dir.join("flows"))
    }

    /// Working directory for the coding agent.
    pub fn agent_workdir(&self) -> PathBuf {
        if self.settings.worktree_path.is_empty() {
            self.layout.root.clone()
        } else {
            PathBuf::from(&self.settings.worktree_path)
        }
    }
}
