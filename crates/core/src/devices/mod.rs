//! Device Resolver.
//!
//! Picks the single device tests run against and lists every known device
//! for display. Screenshots and simulator power requests go through the same
//! resolver. Enumeration goes through the [`DeviceInventory`] trait so
//! resolution can be exercised without the OS tooling.

mod command;
pub mod error;
pub mod inventory;
pub mod power;
pub mod resolver;
pub mod screenshot;

pub use error::{DeviceError, DeviceResult};
pub use inventory::{DeviceInventory, XcrunInventory};
pub use resolver::{DeviceResolver, Strategy};
pub use screenshot::{capture_screenshot, ScreenshotSettings};
