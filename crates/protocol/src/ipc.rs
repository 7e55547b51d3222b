//! Commands into the core and events out of it.
//!
//! The protocol follows an Operation/Event pattern:
//! - `Op`: commands an outer surface (CLI, HTTP routes, UI) issues
//! - `Event`: notifications fanned out to every observer through the
//!   broadcast sink
//!
//! Both use adjacently tagged serialization so a browser client can switch on
//! `type`:
//! ```json
//! {
//!   "type": "processOutput",
//!   "payload": { "role": "test-run", "text": "Running on iPhone 15\n" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ts_rs::TS;
use uuid::Uuid;

use crate::agent_models::AgentStatus;
use crate::device_models::{DeviceKind, SimulatorState};
use crate::discovery_models::DiscoveryReport;
use crate::process_models::{ProcessRole, TestRunResult};
use crate::task_models::{HistoryEntry, Task};

/// Mode the coding agent runs in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "kebab-case")]
pub enum AgentMode {
    /// The agent picks the next queued task itself.
    #[default]
    Auto,

    /// Work on one task chosen by the operator.
    SpecificTask,

    /// Run the test suite and fix what fails.
    TestAndFix,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::SpecificTask => "specific-task",
            Self::TestAndFix => "test-and-fix",
        }
    }
}

/// Operations an outer surface sends to the core.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Op {
    StartAgent {
        mode: AgentMode,
        #[ts(type = "string | null")]
        task_id: Option<Uuid>,
    },

    StopAgent,

    /// Run one flow (relative path) or the whole local tree when `None`.
    RunTests { flow: Option<String> },

    /// Run one flow while recording the device screen.
    RecordFlow { flow: String },

    StopRecording,

    StartScan,

    StopScan,

    /// Compile the newest discovery report into flow documents.
    GenerateTests,

    TakeScreenshot,

    ListFlows,

    ResolveDevice,

    BootSimulator { udid: String },

    ShutdownSimulator { udid: String },

    /// Progress the running scanner posted to its callback endpoint.
    ScannerProgress { progress: serde_json::Value },

    /// The most recent test-run results, newest first.
    RecentResults,
}

/// Events fanned out to every observer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// The agent status record was replaced.
    AgentStatusChanged(AgentStatus),

    ProcessStarted {
        role: ProcessRole,
        pid: Option<u32>,
        label: Option<String>,
    },

    /// A chunk of stdout or stderr from a supervised process, verbatim and
    /// in the order it was read.
    ProcessOutput { role: ProcessRole, text: String },

    /// A supervised process is gone. `stopped` is true when it was terminated
    /// through `stop`.
    ProcessExited {
        role: ProcessRole,
        exit_code: Option<i32>,
        stopped: bool,
    },

    History(HistoryEntry),

    /// Structured result a process embedded in its output.
    TestResult { result: serde_json::Value },

    TestRunFinished(TestRunResult),

    RecordingReady { file: String, flow: String },

    ScannerStatus {
        running: bool,
        scan_id: Option<String>,
    },

    ScannerComplete {
        scan_id: String,
        exit_code: Option<i32>,
        report: Option<DiscoveryReport>,
    },

    TaskChanged(Task),

    /// Flow documents were (re)generated from a discovery report.
    FlowsGenerated { flows: Vec<String> },

    ScreenshotTaken { path: PathBuf, device: DeviceKind },

    /// Scanner progress, relayed as posted.
    ScannerProgress(serde_json::Value),

    SimulatorStatus {
        udid: String,
        state: SimulatorState,
    },
}
