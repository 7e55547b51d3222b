//! Screenshot capture on the active device.

use crate::devices::command::run_tool;
use crate::devices::error::{DeviceError, DeviceResult};
use crate::devices::resolver::DeviceResolver;
use crate::flows::document::{FlowDocument, FlowStep};
use fd_protocol::{AppMode, DashboardConfig, DeviceDescriptor, DeviceKind, DeviceMode, EXPO_GO_APP_ID};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// How screenshots are taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotSettings {
    pub maestro_bin: String,
    pub xcrun_bin: String,
    pub driver_host_port: u16,

    /// Application the single-step flow attaches to on physical devices.
    pub app_id: String,

    /// Deadline for the test-runner capture on physical devices.
    pub runner_timeout: Duration,

    /// Deadline for `simctl io` on simulators.
    pub simctl_timeout: Duration,
}

impl Default for ScreenshotSettings {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}

impl ScreenshotSettings {
    /// Settings for the configured project. In Expo Go mode the capture flow
    /// attaches to the Expo Go host app rather than the project's own id.
    pub fn from_config(settings: &DashboardConfig) -> Self {
        let app_id = match settings.app_mode {
            AppMode::ExpoGo => EXPO_GO_APP_ID.to_string(),
            AppMode::DevelopmentBuild => settings.app_id.clone(),
        };
        Self {
            maestro_bin: settings.maestro_bin.clone(),
            xcrun_bin: "xcrun".to_string(),
            driver_host_port: settings.driver_host_port,
            app_id,
            runner_timeout: Duration::from_secs(20),
            simctl_timeout: Duration::from_secs(15),
        }
    }
}

/// Capture a screenshot of `device` into `destination`.
///
/// Physical devices are captured through a one-step flow run by the test
/// runner over the device bridge. Simulators are captured directly.
///
/// # Errors
///
/// Returns `ToolInvocationFailed` if the capture tool is missing, fails or
/// times out.
pub async fn capture_screenshot(
    device: &DeviceDescriptor,
    destination: &Path,
    settings: &ScreenshotSettings,
) -> DeviceResult<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    match device.kind {
        DeviceKind::Physical => capture_physical(device, destination, settings).await,
        DeviceKind::Virtual => {
            let args = vec![
                "simctl".to_string(),
                "io".to_string(),
                device.udid.clone(),
                "screenshot".to_string(),
                destination.display().to_string(),
            ];
            run_tool(&settings.xcrun_bin, &args, settings.simctl_timeout).await?;
            Ok(())
        }
    }
}

async fn capture_physical(
    device: &DeviceDescriptor,
    destination: &Path,
    settings: &ScreenshotSettings,
) -> DeviceResult<()> {
    let scratch = tempfile::tempdir()?;
    let flow_path = scratch.path().join("screenshot.yaml");
    let flow = screenshot_flow(&settings.app_id, destination);
    tokio::fs::write(&flow_path, flow.render()?).await?;

    let args = vec![
        "--driver-host-port".to_string(),
        settings.driver_host_port.to_string(),
        "--device".to_string(),
        device.udid.clone(),
        "test".to_string(),
        flow_path.display().to_string(),
    ];
    run_tool(&settings.maestro_bin, &args, settings.runner_timeout).await?;
    Ok(())
}

/// One-step flow that saves a screenshot to `destination`.
///
/// The runner appends `.png` itself, so the extension is stripped.
pub fn screenshot_flow(app_id: &str, destination: &Path) -> FlowDocument {
    let target: PathBuf = if destination.extension().is_some_and(|e| e == "png") {
        destination.with_extension("")
    } else {
        destination.to_path_buf()
    };
    FlowDocument::new(app_id).step(FlowStep::TakeScreenshot(target.display().to_string()))
}

impl DeviceResolver {
    /// Resolve the active device for `mode` and capture a screenshot of it.
    ///
    /// # Returns
    ///
    /// The device that was captured.
    ///
    /// # Errors
    ///
    /// Returns `NoDeviceAvailable` if resolution yields nothing, otherwise
    /// whatever the capture itself fails with.
    pub async fn take_screenshot(
        &self,
        mode: DeviceMode,
        destination: &Path,
        settings: &ScreenshotSettings,
    ) -> DeviceResult<DeviceDescriptor> {
        let device = self
            .resolve_active_device(mode)
            .await
            .ok_or(DeviceError::NoDeviceAvailable)?;

        info!(
            device = %device.name,
            udid = %device.udid,
            kind = ?device.kind,
            path = %destination.display(),
            "Taking screenshot"
        );
        capture_screenshot(&device, destination, settings).await?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::resolver::tests::{sim, FakeInventory};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_settings_use_expo_go_host_app() {
        let mut config = DashboardConfig {
            app_id: "com.example.trails".to_string(),
            ..Default::default()
        };
        assert_eq!(ScreenshotSettings::from_config(&config).app_id, "host.exp.Exponent");

        config.app_mode = AppMode::DevelopmentBuild;
        assert_eq!(ScreenshotSettings::from_config(&config).app_id, "com.example.trails");
    }

    #[test]
    fn test_screenshot_flow_strips_png() {
        let flow = screenshot_flow("host.exp.Exponent", Path::new("/tmp/shots/one.png"));
        assert_eq!(
            flow.step_list(),
            &[FlowStep::TakeScreenshot("/tmp/shots/one".to_string())]
        );

        let rendered = flow.render().expect("Failed to render");
        let steps: serde_yaml::Value = rendered
            .split_once("---\n")
            .map(|(_, steps)| serde_yaml::from_str(steps).expect("Failed to parse steps"))
            .expect("document has a separator");
        assert_eq!(steps[0]["takeScreenshot"], serde_yaml::Value::from("/tmp/shots/one"));
    }

    #[test]
    fn test_screenshot_flow_keeps_hash_in_path() {
        let flow = screenshot_flow("host.exp.Exponent", Path::new("/Users/dana/proj #2/shot.png"));
        let rendered = flow.render().expect("Failed to render");

        let steps: serde_yaml::Value = rendered
            .split_once("---\n")
            .map(|(_, steps)| serde_yaml::from_str(steps).expect("Failed to parse steps"))
            .expect("document has a separator");
        assert_eq!(
            steps[0]["takeScreenshot"],
            serde_yaml::Value::from("/Users/dana/proj #2/shot")
        );
    }

    #[tokio::test]
    async fn test_take_screenshot_without_device() {
        let resolver = DeviceResolver::new(Arc::new(FakeInventory {
            physical: Some(vec![]),
            virtuals: Some(vec![sim("S1", "iPhone 15", false)]),
        }));
        let dir = tempdir().expect("Failed to create temp dir");

        let result = resolver
            .take_screenshot(
                DeviceMode::Auto,
                &dir.path().join("shot.png"),
                &ScreenshotSettings::default(),
            )
            .await;

        if let Err(DeviceError::NoDeviceAvailable) = result {
            // Expected
        } else {
            panic!("Expected NoDeviceAvailable, got {result:?}");
        }
    }

    #[tokio::test]
    async fn test_capture_fails_closed_when_tool_missing() {
        let dir = tempdir().expect("Failed to create temp dir");
        let settings = ScreenshotSettings {
            xcrun_bin: "nonexistent-xcrun-xyz".to_string(),
            ..Default::default()
        };

        let result = capture_screenshot(
            &sim("S1", "iPhone 15", true),
            &dir.path().join("shots/shot.png"),
            &settings,
        )
        .await;

        assert!(matches!(result, Err(DeviceError::ToolInvocationFailed { .. })));
        assert!(dir.path().join("shots").is_dir());
    }
}
