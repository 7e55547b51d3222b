//! Error types for report loading and test synthesis.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthesisError {
    /// No report at the given path, or no report in the discovery directory.
    #[error("No scan report found at {path}. Run a scan first.")]
    ReportNotFound { path: PathBuf },

    /// The report exists but could not be read or parsed.
    #[error("Failed to read scan report {path}: {reason}")]
    ReportUnreadable { path: PathBuf, reason: String },

    /// A generated document could not be serialized.
    #[error("Failed to render generated flow {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A generated document could not be written.
    #[error("Failed to write generated flow {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type SynthesisResult<T> = Result<T, SynthesisError>;
