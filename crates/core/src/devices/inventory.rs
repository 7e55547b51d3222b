//! Device inventories.
//!
//! An inventory enumerates physical devices and simulators. The production
//! implementation shells out to `xcrun`; tests substitute a fixed list.

use crate::devices::command::run_tool;
use crate::devices::error::{DeviceError, DeviceResult};
use async_trait::async_trait;
use fd_protocol::{DeviceDescriptor, DeviceKind};
use serde::Deserialize;
use std::time::Duration;

/// Transport types under which a physical device counts as connected.
const CONNECTED_TRANSPORTS: &[&str] = &["wired", "localNetwork"];

/// Simulator state that counts as booted.
const BOOTED_STATE: &str = "Booted";

/// Source of device descriptors.
///
/// Both methods report the full list; filtering for readiness is the
/// resolver's job.
#[async_trait]
pub trait DeviceInventory: Send + Sync {
    /// Enumerate physical devices known to the device-management layer.
    async fn physical_devices(&self) -> DeviceResult<Vec<DeviceDescriptor>>;

    /// Enumerate available simulators across all runtimes.
    async fn virtual_devices(&self) -> DeviceResult<Vec<DeviceDescriptor>>;

    /// Boot the simulator with `udid`.
    async fn boot_simulator(&self, udid: &str) -> DeviceResult<()>;

    /// Shut down the simulator with `udid`.
    async fn shutdown_simulator(&self, udid: &str) -> DeviceResult<()>;
}

/// Inventory backed by `xcrun devicectl` and `xcrun simctl`.
#[derive(Debug, Clone)]
pub struct XcrunInventory {
    xcrun: String,
    timeout: Duration,

    /// Deadline for `simctl boot` and `simctl shutdown`, which are slower
    /// than listing.
    power_timeout: Duration,
}

impl Default for XcrunInventory {
    fn default() -> Self {
        Self {
            xcrun: "xcrun".to_string(),
            timeout: Duration::from_secs(10),
            power_timeout: Duration::from_secs(30),
        }
    }
}

impl XcrunInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `program` in place of `xcrun`.
    pub fn with_xcrun(mut self, program: impl Into<String>) -> Self {
        self.xcrun = program.into();
        self
    }

    /// Override the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl DeviceInventory for XcrunInventory {
    async fn physical_devices(&self) -> DeviceResult<Vec<DeviceDescriptor>> {
        // devicectl only writes JSON to a file.
        let out_file = tempfile::Builder::new()
            .prefix("devicectl-")
            .suffix(".json")
            .tempfile()?;
        let args = vec![
            "devicectl".to_string(),
            "list".to_string(),
            "devices".to_string(),
            "--json-output".to_string(),
            out_file.path().display().to_string(),
        ];
        run_tool(&self.xcrun, &args, self.timeout).await?;

        let raw = tokio::fs::read_to_string(out_file.path()).await?;
        parse_devicectl_json(&raw)
    }

    async fn virtual_devices(&self) -> DeviceResult<Vec<DeviceDescriptor>> {
        let args = vec![
            "simctl".to_string(),
            "list".to_string(),
            "devices".to_string(),
            "--json".to_string(),
        ];
        let output = run_tool(&self.xcrun, &args, self.timeout).await?;
        parse_simctl_json(&String::from_utf8_lossy(&output.stdout))
    }

    async fn boot_simulator(&self, udid: &str) -> DeviceResult<()> {
        let args = vec!["simctl".to_string(), "boot".to_string(), udid.to_string()];
        run_tool(&self.xcrun, &args, self.power_timeout).await?;
        open_simulator_app().await;
        Ok(())
    }

    async fn shutdown_simulator(&self, udid: &str) -> DeviceResult<()> {
        let args = vec!["simctl".to_string(), "shutdown".to_string(), udid.to_string()];
        run_tool(&self.xcrun, &args, self.power_timeout).await?;
        Ok(())
    }
}

/// Bring the Simulator app forward so the booted device is visible.
#[cfg(target_os = "macos")]
async fn open_simulator_app() {
    let spawned = tokio::process::Command::new("open")
        .args(["-a", "Simulator"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();
    if let Err(e) = spawned {
        tracing::debug!(error = %e, "Failed to open the Simulator app");
    }
}

#[cfg(not(target_os = "macos"))]
async fn open_simulator_app() {}

#[derive(Deserialize, Default)]
struct DevicectlOutput {
    #[serde(default)]
    result: DevicectlResult,
}

#[derive(Deserialize, Default)]
struct DevicectlResult {
    #[serde(default)]
    devices: Vec<DevicectlDevice>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DevicectlDevice {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    hardware_properties: HardwareProperties,
    #[serde(default)]
    connection_properties: ConnectionProperties,
    #[serde(default)]
    device_properties: DeviceProperties,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct HardwareProperties {
    #[serde(default)]
    udid: Option<String>,
    #[serde(default)]
    marketing_name: Option<String>,
    #[serde(default)]
    product_type: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConnectionProperties {
    #[serde(default)]
    transport_type: Option<String>,
}

#[derive(Deserialize, Default)]
struct DeviceProperties {
    #[serde(default)]
    name: Option<String>,
}

/// Parse the JSON document written by `devicectl list devices`.
///
/// The hardware UDID is preferred over the management identifier. Entries
/// carrying neither are dropped.
///
/// # Errors
///
/// Returns `MalformedOutput` if `raw` is not JSON of the expected shape.
pub fn parse_devicectl_json(raw: &str) -> DeviceResult<Vec<DeviceDescriptor>> {
    let parsed: DevicectlOutput =
        serde_json::from_str(raw).map_err(|e| DeviceError::MalformedOutput {
            tool: "devicectl".to_string(),
            reason: e.to_string(),
        })?;

    let devices = parsed
        .result
        .devices
        .into_iter()
        .filter_map(|device| {
            let udid = device
                .hardware_properties
                .udid
                .clone()
                .or_else(|| device.identifier.clone())?;
            let transport = device
                .connection_properties
                .transport_type
                .unwrap_or_else(|| "unknown".to_string());
            let ready = CONNECTED_TRANSPORTS.contains(&transport.as_str());
            let name = device
                .name
                .or(device.device_properties.name)
                .or_else(|| device.hardware_properties.marketing_name.clone())
                .unwrap_or_else(|| "iPhone".to_string());
            let model = device
                .hardware_properties
                .marketing_name
                .or(device.hardware_properties.product_type)
                .unwrap_or_default();

            Some(DeviceDescriptor {
                udid,
                management_id: device.identifier,
                name,
                model,
                kind: DeviceKind::Physical,
                state: transport,
                ready,
                runtime: None,
            })
        })
        .collect();

    Ok(devices)
}

#[derive(Deserialize)]
struct SimctlOutput {
    #[serde(default)]
    devices: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimctlDevice {
    udid: String,
    name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    is_available: bool,
}

/// Parse the output of `simctl list devices --json`.
///
/// Runtimes keep the order the tool printed them in. Simulators marked
/// unavailable are dropped.
///
/// # Errors
///
/// Returns `MalformedOutput` if `raw` is not JSON of the expected shape.
pub fn parse_simctl_json(raw: &str) -> DeviceResult<Vec<DeviceDescriptor>> {
    let malformed = |e: serde_json::Error| DeviceError::MalformedOutput {
        tool: "simctl".to_string(),
        reason: e.to_string(),
    };
    let parsed: SimctlOutput = serde_json::from_str(raw).map_err(malformed)?;

    let mut descriptors = Vec::new();
    for (runtime_key, entries) in parsed.devices {
        let runtime = runtime_key
            .rsplit('.')
            .next()
            .unwrap_or(runtime_key.as_str())
            .to_string();
        let entries: Vec<SimctlDevice> = serde_json::from_value(entries).map_err(malformed)?;

        for sim in entries.into_iter().filter(|d| d.is_available) {
            descriptors.push(DeviceDescriptor {
                ready: sim.state == BOOTED_STATE,
                udid: sim.udid,
                management_id: None,
                name: sim.name,
                model: String::new(),
                kind: DeviceKind::Virtual,
                state: sim.state,
                runtime: Some(runtime.clone()),
            });
        }
    }

    Ok(descriptors)
}
