//! Active-device resolution.
//!
//! Resolution is first-match: strategies are tried in a fixed order and each
//! takes the first ready device in enumeration order. An enumeration failure
//! makes its strategy yield nothing; it is never surfaced.

use crate::devices::inventory::DeviceInventory;
use fd_protocol::{DeviceDescriptor, DeviceMode};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// One way of finding a test target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// First physical device on a wired or local-network transport.
    ConnectedPhysical,

    /// First simulator in the booted state.
    BootedVirtual,
}

impl Strategy {
    /// Strategies to try for `mode`, in order.
    pub fn for_mode(mode: DeviceMode) -> &'static [Strategy] {
        match mode {
            DeviceMode::Auto => &[Strategy::ConnectedPhysical, Strategy::BootedVirtual],
            DeviceMode::Physical => &[Strategy::ConnectedPhysical],
            DeviceMode::Simulator => &[Strategy::BootedVirtual],
        }
    }
}

/// Picks the device tests should run against.
#[derive(Clone)]
pub struct DeviceResolver {
    inventory: Arc<dyn DeviceInventory>,
    pinned_udid: Option<String>,
}

impl DeviceResolver {
    pub fn new(inventory: Arc<dyn DeviceInventory>) -> Self {
        Self {
            inventory,
            pinned_udid: None,
        }
    }

    /// Restrict the physical strategy to one hardware UDID. An empty string
    /// clears the pin.
    pub fn with_pinned_udid(mut self, udid: impl Into<String>) -> Self {
        let udid = udid.into();
        self.pinned_udid = (!udid.is_empty()).then_some(udid);
        self
    }

    /// Resolve the single active device for `mode`.
    ///
    /// In `Physical` mode a booted simulator is never returned, even when no
    /// physical device is connected.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use fd_core::devices::{DeviceResolver, XcrunInventory};
    /// use fd_protocol::DeviceMode;
    /// use std::sync::Arc;
    ///
    /// # async fn example() {
    /// let resolver = DeviceResolver::new(Arc::new(XcrunInventory::new()));
    /// match resolver.resolve_active_device(DeviceMode::Auto).await {
    ///     Some(device) => println!("Testing on {}", device.name),
    ///     None => println!("No device"),
    /// }
    /// # }
    /// ```
    pub async fn resolve_active_device(&self, mode: DeviceMode) -> Option<DeviceDescriptor> {
        for strategy in Strategy::for_mode(mode) {
            if let Some(device) = self.try_strategy(*strategy).await {
                return Some(device);
            }
        }
        None
    }

    async fn try_strategy(&self, strategy: Strategy) -> Option<DeviceDescriptor> {
        match strategy {
            Strategy::ConnectedPhysical => self
                .physical()
                .await
                .into_iter()
                .find(|d| d.ready && self.matches_pin(d)),
            Strategy::BootedVirtual => self.simulators().await.into_iter().find(|d| d.ready),
        }
    }

    pub(crate) fn inventory(&self) -> &dyn DeviceInventory {
        self.inventory.as_ref()
    }

    fn matches_pin(&self, device: &DeviceDescriptor) -> bool {
        match &self.pinned_udid {
            Some(pin) => &device.udid == pin,
            None => true,
        }
    }

    pub(crate) async fn physical(&self) -> Vec<DeviceDescriptor> {
        match self.inventory.physical_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                debug!(error = %e, "Physical device enumeration failed");
                Vec::new()
            }
        }
    }

    async fn simulators(&self) -> Vec<DeviceDescriptor> {
        match self.inventory.virtual_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                debug!(error = %e, "Simulator enumeration failed");
                Vec::new()
            }
        }
    }

    /// Every known device for display.
    ///
    /// Physical devices are listed whether or not they are connected.
    /// Simulators are omitted in `Physical` mode. Sorted physical first, then
    /// ready, then iPhones, then by name.
    pub async fn list_devices(&self, mode: DeviceMode) -> Vec<DeviceDescriptor> {
        let mut devices = self.physical().await;
        if mode != DeviceMode::Physical {
            devices.extend(self.simulators().await);
        }
        devices.sort_by(display_order);
        devices
    }
}

fn display_order(a: &DeviceDescriptor, b: &DeviceDescriptor) -> Ordering {
    b.is_physical()
        .cmp(&a.is_physical())
        .then_with(|| b.ready.cmp(&a.ready))
        .then_with(|| b.name.contains("iPhone").cmp(&a.name.contains("iPhone")))
        .then_with(|| a.name.cmp(&b.name))
}
