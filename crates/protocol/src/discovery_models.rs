//! UI-discovery report models.
//!
//! The discovery scanner is an external process that writes a JSON report
//! named `<scanId>_report.json`. These types mirror that report. Unknown
//! fields are ignored, and missing or `null` collections read as empty, so
//! that a report from an older scanner still loads.

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Read `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Whether the scanner managed to reach a screen.
///
/// Anything other than `success` counts as not reached.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
pub enum ReachStatus {
    Success,
    #[default]
    #[serde(other)]
    Failed,
}

/// How the scanner navigated to a screen.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
pub enum NavigationMethod {
    /// Opened the navigation drawer and tapped the screen's entry.
    Drawer,

    /// Landed on the screen directly (e.g. the home screen).
    #[default]
    Direct,

    /// Any other method the scanner reports, such as a tab bar.
    #[serde(other)]
    Other,
}

/// A button found in the view hierarchy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "camelCase")]
pub struct ButtonElement {
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub test_id: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, rename = "class")]
    pub class_name: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// An input field found in the view hierarchy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "camelCase")]
pub struct InputField {
    #[serde(default)]
    pub hint: Option<String>,

    #[serde(default)]
    pub test_id: Option<String>,

    #[serde(default)]
    pub focused: bool,

    #[serde(default, rename = "class")]
    pub class_name: Option<String>,
}

/// Everything the scanner found on one screen.
///
/// Order is preserved from the report. It only matters for making generated
/// output deterministic.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "camelCase")]
pub struct ElementInventory {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_elements: u32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub text_elements: Vec<String>,

    /// Stable element identifiers.
    #[serde(default, deserialize_with = "null_as_default")]
    pub test_ids: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub buttons: Vec<ButtonElement>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub input_fields: Vec<InputField>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ScreenRecord {
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ReachStatus,

    #[serde(default, deserialize_with = "null_as_default")]
    pub navigated_via: NavigationMethod,

    #[serde(default, deserialize_with = "null_as_default")]
    pub elements: ElementInventory,

    /// Screenshot captured by the scanner, relative to the discovery directory.
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl ScreenRecord {
    pub fn is_reached(&self) -> bool {
        self.status == ReachStatus::Success
    }

    pub fn is_drawer_reachable(&self) -> bool {
        self.navigated_via == NavigationMethod::Drawer
    }
}

/// Aggregate counts written by the scanner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    #[serde(default)]
    pub total_screens: u32,

    #[serde(default)]
    pub successful: u32,

    #[serde(default)]
    pub failed: u32,

    #[serde(default)]
    pub total_elements: u32,
}

/// Output of one discovery scan. Read-only for everything in flowdeck.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub scan_id: String,

    #[serde(default)]
    pub app_id: Option<String>,

    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub summary: Option<ScanSummary>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub screens: Vec<ScreenRecord>,
}
