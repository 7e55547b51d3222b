//! Settings loader for the `.flowdeck/` directory.
//!
//! Only `config.toml` lives there today. The directory layout itself is not
//! configurable; it is derived from the dashboard root.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::{AppConfig, WorkspaceLayout, SETTINGS_DIR};
use fd_protocol::config_models::DashboardConfig;
use std::path::Path;

/// Loads the dashboard configuration rooted at `root`.
///
/// # Returns
///
/// An `AppConfig` with settings from `.flowdeck/config.toml` and the layout
/// derived from `root`. If the settings directory or file is missing, the
/// defaults are used rather than failing.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - `config.toml` exists but cannot be read
/// - `config.toml` has invalid TOML syntax or field types
/// - A value is out of range (a zero runtime cap or bridge port)
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let settings_dir = root.join(SETTINGS_DIR);

    if !settings_dir.exists() {
        return Ok(AppConfig::with_defaults(root));
    }

    let settings = load_settings(&settings_dir)?;

    Ok(AppConfig {
        settings,
        layout: WorkspaceLayout::new(root),
    })
}

/// Loads `config.toml` from the settings directory.
fn load_settings(settings_dir: &Path) -> ConfigResult<DashboardConfig> {
    let config_path = settings_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(DashboardConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: DashboardConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    validate(&config).map_err(|reason| ConfigError::InvalidConfig {
        path: config_path,
        reason,
    })?;

    Ok(config)
}

fn validate(config: &DashboardConfig) -> Result<(), String> {
    if config.max_agent_runtime_secs == 0 {
        return Err("max_agent_runtime_secs must be greater than zero".to_string());
    }
    if config.driver_host_port == 0 {
        return Err("driver_host_port must be greater than zero".to_string());
    }
    if config.maestro_bin.trim().is_empty() {
        return Err("maestro_bin must not be empty".to_string());
    }
    Ok(())
}
