//! Flow catalog models.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ts_rs::TS;

/// Which tree a flow document was found in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
pub enum FlowSource {
    /// The dashboard's own flow tree. Always wins over `Fallback`.
    Local,

    /// The application project's flow tree.
    Fallback,
}

/// A test-flow document listed by the registry.
///
/// The relative path is the registry key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct FlowDescriptor {
    /// Display name, e.g. `[auth] login happy path`.
    pub name: String,

    /// Path relative to the tree root, always `/`-separated.
    pub relative_path: String,

    /// Absolute location on disk.
    pub path: PathBuf,

    /// First directory of the relative path, or `root`.
    pub category: String,

    pub source: FlowSource,
}
