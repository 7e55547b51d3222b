//! Simulator boot and shutdown.

use crate::devices::error::DeviceResult;
use crate::devices::resolver::DeviceResolver;
use fd_protocol::SimulatorState;
use tracing::info;

impl DeviceResolver {
    /// Boot the simulator with `udid`.
    ///
    /// A physical device is always on, so a udid that names one is reported
    /// as `AlreadyConnected` without calling the tooling.
    ///
    /// # Errors
    ///
    /// Returns `ToolInvocationFailed` if the boot call fails or times out.
    pub async fn boot_simulator(&self, udid: &str) -> DeviceResult<SimulatorState> {
        if self.physical_udids().await.iter().any(|known| known == udid) {
            return Ok(SimulatorState::AlreadyConnected);
        }

        self.inventory().boot_simulator(udid).await?;
        info!(udid, "Simulator booting");
        Ok(SimulatorState::Booting)
    }

    /// Shut down the simulator with `udid`.
    ///
    /// # Errors
    ///
    /// Returns `ToolInvocationFailed` if the shutdown call fails or times out.
    pub async fn shutdown_simulator(&self, udid: &str) -> DeviceResult<SimulatorState> {
        self.inventory().shutdown_simulator(udid).await?;
        info!(udid, "Simulator shut down");
        Ok(SimulatorState::Shutdown)
    }

    async fn physical_udids(&self) -> Vec<String> {
        self.physical().await.into_iter().map(|d| d.udid).collect()
    }
}
