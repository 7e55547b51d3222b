//! Work items and the activity history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::process_models::TestRunResult;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Queued,
    InProgress,
    Review,
    Done,
    Failed,
}

impl TaskStatus {
    /// Queued and in-progress tasks are open; remediation tasks are
    /// deduplicated only against open tasks.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in-progress",
            Self::Review => "review",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Who created a task.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "kebab-case")]
pub enum TaskSource {
    #[default]
    Manual,

    /// Auto-created after a failing test run.
    TestRunner,

    Agent,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[ts(type = "string")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub source: TaskSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub agent_notes: String,
    #[serde(default)]
    pub test_results: Option<TestRunResult>,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Fields a caller supplies when creating a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, TS)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub source: TaskSource,
}

/// What happened, for the activity history.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryKind {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskMoved,
    TaskCompleted,
    TaskFailed,
    AgentStarted,
    AgentStopped,
    AgentFinished,
    TestRunStarted,
    TestRunStopped,
    TestRunComplete,
    RecordingStarted,
    RecordingStopped,
    RecordingComplete,
    ScannerStarted,
    ScannerStopped,
    ScannerComplete,
    ScreenshotTaken,
    TestsGenerated,
    SimulatorBooted,
    SimulatorShutdown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[ts(type = "string")]
    pub id: Uuid,
    pub kind: HistoryKind,
    pub message: String,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub task_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

/// Task counters for the dashboard header.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "camelCase")]
pub struct BoardStats {
    pub total_tasks: usize,
    pub queued: usize,
    pub in_progress: usize,
    pub review: usize,
    pub done: usize,
    pub failed: usize,
    pub today_completed: usize,
    #[serde(default)]
    pub last_test_run: Option<DateTime<Utc>>,
}
