//! Test-target device models.
//!
//! Device descriptors are transient: they are recomputed on every resolution
//! and never cached beyond a single request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// Which kind of device the dashboard should target.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    /// Prefer a connected physical device, otherwise a booted simulator.
    #[default]
    Auto,

    /// Only ever target a physical device.
    Physical,

    /// Only ever target a simulator.
    Simulator,
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Physical => "physical",
            Self::Simulator => "simulator",
        })
    }
}

impl FromStr for DeviceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "physical" => Ok(Self::Physical),
            "simulator" => Ok(Self::Simulator),
            other => Err(format!("unknown device mode: {other}")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Physical,
    Virtual,
}

/// Power state reported after a simulator boot or shutdown request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub enum SimulatorState {
    Booting,
    Shutdown,

    /// The udid names a physical device, which is always on.
    AlreadyConnected,
}

/// A single physical device or simulator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Hardware UDID. This is what the test runner needs.
    pub udid: String,

    /// Identifier assigned by the device-management layer, which differs from
    /// the hardware UDID for physical devices.
    #[serde(default)]
    pub management_id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub model: String,

    pub kind: DeviceKind,

    /// Raw connectivity or boot state as reported by the tooling, e.g.
    /// `wired`, `localNetwork` or `Booted`.
    pub state: String,

    /// Connected (physical) or booted (virtual).
    pub ready: bool,

    /// Simulator runtime short name, e.g. `iOS-17-5`.
    #[serde(default)]
    pub runtime: Option<String>,
}

impl DeviceDescriptor {
    pub fn is_physical(&self) -> bool {
        self.kind == DeviceKind::Physical
    }
}
