//! Common test utilities for the integration tests.
//!
//! - Fixtures: supervisors, shell launch specs, flow trees, reports
//! - Assertions: event collection and matching

pub mod assertions;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
