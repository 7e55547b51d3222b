//! Error types for device operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    /// Resolution found neither a connected physical device nor a booted
    /// simulator.
    #[error("No device available. Connect a device over USB or boot a simulator.")]
    NoDeviceAvailable,

    /// The OS tool could not be run, timed out, or exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    ToolInvocationFailed { tool: String, reason: String },

    /// The tool ran but its output could not be understood.
    #[error("Unexpected output from {tool}: {reason}")]
    MalformedOutput { tool: String, reason: String },

    /// The capture flow could not be serialized.
    #[error("Failed to render capture flow: {0}")]
    Render(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
