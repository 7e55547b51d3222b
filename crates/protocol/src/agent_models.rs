//! Coding-agent status record.
//!
//! There is exactly one `AgentStatus` per dashboard. It is owned by the
//! process supervisor and published as a whole value whenever it changes;
//! readers always observe a complete snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Coarse state of the automation loop.
///
/// `Testing` takes precedence over `Running`: while a test run or a recording
/// is live the state reads `Testing` even if the agent is also running.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Nothing is running.
    #[default]
    Idle,

    /// The coding agent is running.
    Running,

    /// A test run or a recording is in progress.
    Testing,

    /// The last agent run exited with a non-zero code.
    Error,
}

/// Snapshot of the automation loop, replaced atomically by the supervisor.
///
/// # Example
///
/// ```json
/// {
///   "state": "running",
///   "currentTask": "auto-selecting",
///   "pid": 4242,
///   "lastExitCode": null,
///   "startedAt": "2026-01-01T10:00:00Z",
///   "lastRun": null,
///   "lastUpdated": "2026-01-01T10:00:00Z",
///   "maxRuntimeSecs": 3600
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, TS)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub state: AgentState,

    /// Task the agent is working on, or `auto-selecting`.
    #[serde(default)]
    pub current_task: Option<String>,

    /// OS process id of the live agent process.
    #[serde(default)]
    pub pid: Option<u32>,

    /// Exit code of the most recent agent run. `None` when the process was
    /// terminated by a signal or never ran.
    #[serde(default)]
    pub last_exit_code: Option<i32>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// When the last agent run finished.
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,

    /// Configured runtime cap for one agent run. Recorded only; enforcing it
    /// is up to the caller.
    #[serde(default)]
    pub max_runtime_secs: u64,
}

impl AgentStatus {
    pub fn idle(max_runtime_secs: u64) -> Self {
        Self {
            max_runtime_secs,
            ..Self::default()
        }
    }
}
