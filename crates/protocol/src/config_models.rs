//! Dashboard settings from `.flowdeck/config.toml`.
//!
//! Every field has a default, so a partial file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::device_models::DeviceMode;

/// How the application under test is launched on the device.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "kebab-case")]
pub enum AppMode {
    /// The app runs inside the Expo Go host application.
    #[default]
    ExpoGo,

    /// A standalone development build is installed on the device.
    DevelopmentBuild,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpoGo => "expo-go",
            Self::DevelopmentBuild => "development-build",
        }
    }
}

/// Bundle identifier of the Expo Go host application.
pub const EXPO_GO_APP_ID: &str = "host.exp.Exponent";

/// Project-wide settings.
///
/// # Example
///
/// ```toml
/// # .flowdeck/config.toml
/// repo_path = "/Users/me/src/trail-app"
/// app_id = "com.example.trails"
/// device_mode = "physical"
/// auto_create_fix_tasks = true
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct DashboardConfig {
    /// Working tree the coding agent edits.
    pub worktree_path: String,

    /// Application repository. Its `maestro/flows` tree is the fallback flow
    /// tree.
    pub repo_path: String,

    /// Bundle identifier of the application under test.
    pub app_id: String,

    /// Queue a remediation task when a test run fails.
    pub auto_create_fix_tasks: bool,

    /// Runtime cap for one agent run, in seconds.
    pub max_agent_runtime_secs: u64,

    /// Model hint passed through to the agent script.
    pub agent_model: String,

    pub device_mode: DeviceMode,

    /// Hardware UDID to pin the physical-device strategy to. Empty means the
    /// first connected device.
    pub physical_device_id: String,

    pub app_mode: AppMode,

    /// Expo dev-server URL, e.g. `exp://192.168.1.5:8081`.
    pub expo_dev_url: String,

    /// Base URL the scanner and the agent call back to.
    pub dashboard_url: String,

    /// Test-runner executable.
    pub maestro_bin: String,

    /// Port of the device bridge used to drive physical devices.
    pub driver_host_port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            worktree_path: String::new(),
            repo_path: String::new(),
            app_id: "com.example.app".to_string(),
            auto_create_fix_tasks: true,
            max_agent_runtime_secs: 3600,
            agent_model: "opus".to_string(),
            device_mode: DeviceMode::Auto,
            physical_device_id: String::new(),
            app_mode: AppMode::ExpoGo,
            expo_dev_url: String::new(),
            dashboard_url: "http://localhost:3847".to_string(),
            maestro_bin: "maestro".to_string(),
            driver_host_port: 6001,
        }
    }
}
