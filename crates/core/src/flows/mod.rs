//! Flow documents and the flow registry.
//!
//! - `document`: typed steps rendered to the flow YAML format
//! - `registry`: the merged catalog of the local and fallback trees

pub mod document;
pub mod registry;

pub use document::{FlowDocument, FlowStep, Selector};
pub use registry::FlowRegistry;
