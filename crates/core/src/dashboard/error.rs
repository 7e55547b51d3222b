//! Error types for operation dispatch.

use crate::devices::DeviceError;
use crate::supervisor::SupervisorError;
use crate::synthesis::SynthesisError;
use thiserror::Error;

/// Any failure an operation can report back to the surface that issued it.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// A blocking job panicked or was cancelled.
    #[error("Background job failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}

pub type DashboardResult<T> = Result<T, DashboardError>;
