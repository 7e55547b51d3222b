//! Supervised process roles and their runtime records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

/// The fixed categories of long-running child process.
///
/// At most one live process exists per role. The supervisor enforces this,
/// not the operating system.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TS)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessRole {
    /// The autonomous coding agent.
    Agent,

    /// A UI-test runner invocation.
    TestRun,

    /// A UI-test run captured to video.
    Recording,

    /// The UI-discovery scanner.
    Scanner,
}

impl ProcessRole {
    pub const ALL: [ProcessRole; 4] = [
        ProcessRole::Agent,
        ProcessRole::TestRun,
        ProcessRole::Recording,
        ProcessRole::Scanner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::TestRun => "test-run",
            Self::Recording => "recording",
            Self::Scanner => "scanner",
        }
    }

    /// Whether a live process of this role puts the dashboard in `Testing`.
    pub fn is_testing(&self) -> bool {
        matches!(self, Self::TestRun | Self::Recording)
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable view of a tracked process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    #[ts(type = "string")]
    pub id: Uuid,
    pub role: ProcessRole,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,

    /// Flow, scan id or task the process was started for.
    #[serde(default)]
    pub label: Option<String>,
}

/// Outcome of one test-runner or recording invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    pub timestamp: DateTime<Utc>,

    /// Relative flow path, or `all`.
    pub flow: String,

    pub exit_code: Option<i32>,
    pub passed: bool,

    /// Tail of the combined output.
    pub output: String,

    /// Recorded video file name, present only for successful recordings.
    #[serde(default)]
    pub video: Option<String>,
}
