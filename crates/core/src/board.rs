//! Task board and activity history.
//!
//! The board is an in-memory value. Persisting it is up to whoever owns it;
//! [`TaskBoard::from_parts`] and the accessors exist for that purpose. The
//! supervisor shares it as `Arc<Mutex<TaskBoard>>` to queue remediation tasks
//! and record lifecycle history.

use chrono::{DateTime, Local, Utc};
use fd_protocol::{
    BoardStats, HistoryEntry, HistoryKind, NewTask, Task, TaskPriority, TaskSource, TaskStatus,
    TestRunResult,
};
use std::collections::VecDeque;
use uuid::Uuid;

/// Number of history entries kept; older entries are dropped first.
pub const HISTORY_CAP: usize = 500;

/// Characters of test output copied into a remediation task's description.
pub const REMEDIATION_OUTPUT_CHARS: usize = 2000;

/// What [`TaskBoard::upsert_remediation`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum Remediation {
    Created(Task),
    Updated(Task),
}

impl Remediation {
    pub fn task(&self) -> &Task {
        match self {
            Self::Created(task) | Self::Updated(task) => task,
        }
    }
}

/// Title of the remediation task for a failing run of `flow`.
///
/// A run over the whole tree is titled by its label, `all`. Only a run with
/// no flow at all falls back to `multiple flows`.
pub fn remediation_title(flow: Option<&str>) -> String {
    match flow {
        Some(flow) if !flow.is_empty() => format!("Fix failing test: {flow}"),
        _ => "Fix failing test: multiple flows".to_string(),
    }
}

/// Leads every remediation description; the output tail follows.
pub const REMEDIATION_PREFIX: &str = "Maestro test failed. Output:\n";

/// Last `max_chars` characters of `text`.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    tasks: Vec<Task>,
    history: VecDeque<HistoryEntry>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a board from persisted records. History beyond the cap is
    /// trimmed from the front.
    pub fn from_parts(tasks: Vec<Task>, history: Vec<HistoryEntry>) -> Self {
        let mut board = Self {
            tasks,
            history: history.into(),
        };
        board.trim_history();
        board
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Create a task and record it in the history.
    pub fn add_task(&mut self, new: NewTask) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            status: new.status,
            priority: new.priority,
            source: new.source,
            created_at: now,
            updated_at: now,
            agent_notes: String::new(),
            test_results: None,
            files: Vec::new(),
        };
        self.tasks.push(task.clone());
        self.record(
            HistoryKind::TaskCreated,
            format!("Task created: {}", task.title),
            Some(task.id),
        );
        task
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// First task with exactly this title.
    pub fn find_by_title(&self, title: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.title == title)
    }

    /// Move a task to `status`.
    ///
    /// # Returns
    ///
    /// The updated task, or `None` if no task has this id.
    pub fn set_status(&mut self, id: Uuid, status: TaskStatus) -> Option<Task> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.status = status;
        task.updated_at = Utc::now();
        let task = task.clone();

        let kind = match status {
            TaskStatus::Done => HistoryKind::TaskCompleted,
            TaskStatus::Failed => HistoryKind::TaskFailed,
            _ => HistoryKind::TaskMoved,
        };
        self.record(
            kind,
            format!("\"{}\" moved to {}", task.title, status.as_str()),
            Some(task.id),
        );
        Some(task)
    }

    pub fn remove_task(&mut self, id: Uuid) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        let task = self.tasks.remove(index);
        self.record(
            HistoryKind::TaskDeleted,
            format!("Task deleted: {}", task.title),
            Some(task.id),
        );
        Some(task)
    }

    /// Tasks waiting for the agent, in creation order.
    pub fn queued_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Queued)
            .collect()
    }

    /// Append a history entry, dropping the oldest past [`HISTORY_CAP`].
    pub fn record(
        &mut self,
        kind: HistoryKind,
        message: impl Into<String>,
        task_id: Option<Uuid>,
    ) -> HistoryEntry {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            task_id,
            timestamp: Utc::now(),
        };
        self.history.push_back(entry.clone());
        self.trim_history();
        entry
    }

    fn trim_history(&mut self) {
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }
    }

    /// The last `limit` history entries, oldest first.
    pub fn recent_history(&self, limit: usize) -> Vec<HistoryEntry> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Queue or refresh the remediation task for a failing test run.
    ///
    /// An open task (queued or in progress) with the same title is updated in
    /// place. Otherwise a new high-priority task is queued. Either way the
    /// task carries the latest result and the tail of its output.
    pub fn upsert_remediation(&mut self, flow: Option<&str>, result: &TestRunResult) -> Remediation {
        let title = remediation_title(flow);
        let description = format!(
            "{REMEDIATION_PREFIX}{}",
            tail_chars(&result.output, REMEDIATION_OUTPUT_CHARS)
        );
        let flow_label = flow.unwrap_or("all");

        let existing = self
            .tasks
            .iter_mut()
            .find(|t| t.title == title && t.status.is_open());
        if let Some(task) = existing {
            task.description = description;
            task.test_results = Some(result.clone());
            task.updated_at = Utc::now();
            let task = task.clone();
            self.record(
                HistoryKind::TaskUpdated,
                format!("Updated existing fix task for: {flow_label}"),
                Some(task.id),
            );
            return Remediation::Updated(task);
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title,
            description,
            status: TaskStatus::Queued,
            priority: TaskPriority::High,
            source: TaskSource::TestRunner,
            created_at: now,
            updated_at: now,
            agent_notes: String::new(),
            test_results: Some(result.clone()),
            files: Vec::new(),
        };
        self.tasks.push(task.clone());
        self.record(
            HistoryKind::TaskCreated,
            format!("Auto-created fix task for failing test: {flow_label}"),
            Some(task.id),
        );
        Remediation::Created(task)
    }

    /// Counters as of now, with "today" in local time.
    pub fn stats(&self) -> BoardStats {
        self.stats_at(Local::now())
    }

    pub fn stats_at(&self, now: DateTime<Local>) -> BoardStats {
        let today = now.date_naive();
        let count = |status: TaskStatus| self.tasks.iter().filter(|t| t.status == status).count();

        BoardStats {
            total_tasks: self.tasks.len(),
            queued: count(TaskStatus::Queued),
            in_progress: count(TaskStatus::InProgress),
            review: count(TaskStatus::Review),
            done: count(TaskStatus::Done),
            failed: count(TaskStatus::Failed),
            today_completed: self
                .tasks
                .iter()
                .filter(|t| {
                    t.status == TaskStatus::Done
                        && t.updated_at.with_timezone(&Local).date_naive() >= today
                })
                .count(),
            last_test_run: self
                .history
                .iter()
                .rev()
                .find(|h| h.kind == HistoryKind::TestRunComplete)
                .map(|h| h.timestamp),
        }
    }
}
