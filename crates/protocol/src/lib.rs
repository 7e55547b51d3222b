//! # fd-protocol
//!
//! Shared data models for flowdeck.
//!
//! This crate defines the structures exchanged between the core and anything
//! that observes or drives it:
//! - Dashboard settings (TOML)
//! - Discovery reports produced by the external scanner (JSON)
//! - Runtime records: agent status, process roles, tasks, history
//! - Operations and Events for the broadcast sink
//!
//! ## Modules
//!
//! - [`agent_models`]: Agent status record
//! - [`config_models`]: Settings from `.flowdeck/config.toml`
//! - [`device_models`]: Device descriptors and targeting mode
//! - [`discovery_models`]: Discovery report structure
//! - [`flow_models`]: Flow catalog entries
//! - [`process_models`]: Process roles and test-run results
//! - [`task_models`]: Tasks and history entries
//! - [`ipc`]: Operations and Events
//!
//! All types derive `TS` so a browser client can share them.

pub mod agent_models;
pub mod config_models;
pub mod device_models;
pub mod discovery_models;
pub mod flow_models;
pub mod ipc;
pub mod process_models;
pub mod task_models;

// Re-export all public types for convenience
pub use agent_models::*;
pub use config_models::*;
pub use device_models::*;
pub use discovery_models::*;
pub use flow_models::*;
pub use ipc::*;
pub use process_models::*;
pub use task_models::*;
