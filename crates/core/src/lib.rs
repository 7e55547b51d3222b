//! # fd-core
//!
//! Core of the flowdeck operator dashboard.
//!
//! This crate provides:
//! - Configuration loading from the `.flowdeck/` directory
//! - Supervision of the agent, test-runner, recorder and scanner processes
//! - Active-device resolution and screenshots
//! - The merged flow catalog
//! - Compilation of discovery reports into test flows
//! - Dispatch of protocol operations across all of the above
//!
//! ## Modules
//!
//! - [`config`]: Settings and workspace layout
//! - [`board`]: Tasks and activity history
//! - [`dashboard`]: Applies `Op` commands to the wired components
//! - [`devices`]: Device Resolver
//! - [`flows`]: Flow documents and the Flow Registry
//! - [`synthesis`]: Test Synthesis Engine
//! - [`supervisor`]: Process Supervisor and per-role launch specs

pub mod board;
pub mod config;
pub mod dashboard;
pub mod devices;
pub mod flows;
pub mod supervisor;
pub mod synthesis;
