//! Process Supervisor.
//!
//! Owns at most one live child process per [`ProcessRole`], multiplexes its
//! output to the broadcast channel, and turns lifecycle transitions into
//! status updates, history entries and remediation tasks.
//!
//! # Status
//!
//! `AgentStatus` is held in a `watch` channel and always replaced whole.
//! Every replacement happens while the slot table is locked, so the state
//! always agrees with the set of live roles:
//!
//! - a live test run or recording means `testing`
//! - otherwise a live agent means `running`
//! - otherwise the outcome of the last transition (`idle` or `error`)
//!
//! The scanner has its own running flag and never touches the status.
//!
//! # Stopping
//!
//! [`Supervisor::stop`] kills the child and releases the role immediately,
//! without waiting for the exit to be observed. A new process may start
//! under the role right away. Each handle carries a unique id so a late exit
//! from the stopped process cannot release its successor's slot or trigger
//! failure side effects.

pub mod error;
pub mod launch;
pub mod markers;
pub mod output;
pub mod results;

pub use error::{SupervisorError, SupervisorResult};
pub use launch::LaunchSpec;
pub use output::OutputTail;
pub use results::{recent_results, RECENT_RESULTS_LIMIT};
use output::{LineAssembler, Utf8Chunks};

use crate::board::{Remediation, TaskBoard};
use crate::supervisor::markers::{scan_line, Marker};
use crate::synthesis::report::load_report;
use chrono::{DateTime, Utc};
use fd_protocol::{
    AgentState, AgentStatus, DashboardConfig, Event, HistoryKind, ProcessInfo, ProcessRole, Task,
    TestRunResult,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot, watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacity of the event channel. Slow subscribers miss the oldest events.
const EVENT_CAPACITY: usize = 1024;

/// Bytes read from a child pipe at a time.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// One output pipe of a child and its decoding state.
struct Pipe<R> {
    reader: R,
    buf: Vec<u8>,
    text: Utf8Chunks,
    lines: LineAssembler,
    open: bool,
}

impl<R> Pipe<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: vec![0; READ_CHUNK_BYTES],
            text: Utf8Chunks::default(),
            lines: LineAssembler::default(),
            open: true,
        }
    }
}

/// A live (or just-finished) supervised process.
///
/// Cloning is cheap; clones share the output buffer.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    id: Uuid,
    role: ProcessRole,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    label: Option<String>,
    output: Arc<Mutex<OutputTail>>,
}

impl ProcessHandle {
    fn new(role: ProcessRole, pid: Option<u32>, label: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            pid,
            started_at: Utc::now(),
            label,
            output: Arc::new(Mutex::new(OutputTail::default())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Task title, flow or scan id the process was started for.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The last [`output::OUTPUT_TAIL_CHARS`] characters of combined output.
    pub async fn output(&self) -> String {
        self.output.lock().await.contents()
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            id: self.id,
            role: self.role,
            pid: self.pid,
            started_at: self.started_at,
            label: self.label.clone(),
        }
    }
}

/// Supervisor policy taken from the dashboard settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Queue a remediation task when a test run fails.
    pub auto_create_fix_tasks: bool,

    /// Recorded in the status; enforcing it is up to the caller.
    pub max_agent_runtime: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}

impl SupervisorSettings {
    pub fn from_config(settings: &DashboardConfig) -> Self {
        Self {
            auto_create_fix_tasks: settings.auto_create_fix_tasks,
            max_agent_runtime: Duration::from_secs(settings.max_agent_runtime_secs),
        }
    }
}

struct Slot {
    handle: ProcessHandle,
    kill: oneshot::Sender<()>,
}

/// What the monitor task needs to account for one process.
struct RunContext {
    handle: ProcessHandle,
    task_id: Option<Uuid>,
    log_file: Option<PathBuf>,
    artifact: Option<PathBuf>,
    result_file: Option<PathBuf>,
}

struct Inner {
    slots: Mutex<HashMap<ProcessRole, Slot>>,
    status: watch::Sender<AgentStatus>,
    events: broadcast::Sender<Event>,
    board: Arc<Mutex<TaskBoard>>,
    settings: SupervisorSettings,
}

/// Supervises the agent, test-run, recording and scanner processes.
///
/// Cloning is cheap and every clone drives the same processes.
///
/// # Example
///
/// ```rust,no_run
/// use fd_core::board::TaskBoard;
/// use fd_core::supervisor::{LaunchSpec, Supervisor, SupervisorSettings};
/// use fd_protocol::ProcessRole;
/// use std::sync::Arc;
/// use tokio::sync::Mutex;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let supervisor = Supervisor::new(
///     SupervisorSettings::default(),
///     Arc::new(Mutex::new(TaskBoard::new())),
/// );
/// let mut events = supervisor.subscribe();
///
/// let spec = LaunchSpec::new("maestro").args(["test", "maestro/flows"]);
/// supervisor.start(ProcessRole::TestRun, spec).await?;
///
/// while let Ok(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(settings: SupervisorSettings, board: Arc<Mutex<TaskBoard>>) -> Self {
        let status = AgentStatus::idle(settings.max_agent_runtime.as_secs());
        let (status_tx, _) = watch::channel(status);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                status: status_tx,
                events,
                board,
                settings,
            }),
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// Latest status snapshot.
    pub fn status(&self) -> AgentStatus {
        self.inner.status.borrow().clone()
    }

    /// Follow status replacements.
    pub fn watch_status(&self) -> watch::Receiver<AgentStatus> {
        self.inner.status.subscribe()
    }

    pub fn board(&self) -> &Arc<Mutex<TaskBoard>> {
        &self.inner.board
    }

    pub fn max_agent_runtime(&self) -> Duration {
        self.inner.settings.max_agent_runtime
    }

    pub async fn is_running(&self, role: ProcessRole) -> bool {
        self.inner.slots.lock().await.contains_key(&role)
    }

    pub async fn handle(&self, role: ProcessRole) -> Option<ProcessHandle> {
        self.inner
            .slots
            .lock()
            .await
            .get(&role)
            .map(|slot| slot.handle.clone())
    }

    /// Every live process, in role order.
    pub async fn running(&self) -> Vec<ProcessInfo> {
        let slots = self.inner.slots.lock().await;
        let mut infos: Vec<ProcessInfo> = slots.values().map(|s| s.handle.info()).collect();
        infos.sort_by_key(|info| info.role);
        infos
    }

    pub async fn scanner_running(&self) -> bool {
        self.is_running(ProcessRole::Scanner).await
    }

    pub async fn current_scan_id(&self) -> Option<String> {
        self.handle(ProcessRole::Scanner)
            .await
            .and_then(|h| h.label)
    }

    /// Spawn `spec` under `role`.
    ///
    /// The role check and the registration happen under one lock, so of two
    /// concurrent starts for the same role exactly one succeeds.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if the role holds a live process; the existing
    ///   handle is left untouched
    /// - `ToolInvocationFailed` if the program cannot be spawned
    pub async fn start(&self, role: ProcessRole, spec: LaunchSpec) -> SupervisorResult<ProcessHandle> {
        let mut slots = self.inner.slots.lock().await;
        if slots.contains_key(&role) {
            return Err(SupervisorError::AlreadyRunning(role));
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command
            .spawn()
            .map_err(|source| SupervisorError::ToolInvocationFailed {
                program: spec.program.clone(),
                source,
            })?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.start_kill();
            return Err(SupervisorError::ToolInvocationFailed {
                program: spec.program.clone(),
                source: std::io::Error::other("child output was not captured"),
            });
        };

        let handle = ProcessHandle::new(role, child.id(), spec.label.clone());
        let (kill_tx, kill_rx) = oneshot::channel();
        slots.insert(
            role,
            Slot {
                handle: handle.clone(),
                kill: kill_tx,
            },
        );

        if role != ProcessRole::Scanner {
            let label = handle.label.clone();
            let pid = handle.pid;
            self.replace_status(&slots, |status| {
                if role == ProcessRole::Agent {
                    status.current_task = label;
                    status.pid = pid;
                    status.started_at = Some(Utc::now());
                }
            });
        }
        drop(slots);

        info!(role = %role, pid = ?handle.pid, label = ?handle.label, "Process started");
        self.emit(Event::ProcessStarted {
            role,
            pid: handle.pid,
            label: handle.label.clone(),
        });
        if role == ProcessRole::Scanner {
            self.emit(Event::ScannerStatus {
                running: true,
                scan_id: handle.label.clone(),
            });
        }
        let label = handle.label().unwrap_or_default();
        let (kind, message) = match role {
            ProcessRole::Agent => (HistoryKind::AgentStarted, format!("Agent started: {label}")),
            ProcessRole::TestRun => (HistoryKind::TestRunStarted, format!("Running tests: {label}")),
            ProcessRole::Recording => (
                HistoryKind::RecordingStarted,
                format!("Recording test: {label}"),
            ),
            ProcessRole::Scanner => (
                HistoryKind::ScannerStarted,
                format!("Discovery scan started: {label}"),
            ),
        };
        self.record(kind, message, spec.task_id).await;

        let run = RunContext {
            handle: handle.clone(),
            task_id: spec.task_id,
            log_file: spec.log_file,
            artifact: spec.artifact,
            result_file: spec.result_file,
        };
        tokio::spawn(self.clone().monitor(child, stdout, stderr, kill_rx, run));

        Ok(handle)
    }

    /// Kill the process under `role` and release the role.
    ///
    /// Returns as soon as the kill is requested. The eventual exit is still
    /// broadcast as `ProcessExited { stopped: true }` but has no other side
    /// effects.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if the role is idle.
    pub async fn stop(&self, role: ProcessRole) -> SupervisorResult<()> {
        let mut slots = self.inner.slots.lock().await;
        let slot = slots
            .remove(&role)
            .ok_or(SupervisorError::NotRunning(role))?;
        let _ = slot.kill.send(());

        match role {
            ProcessRole::Agent => self.replace_status(&slots, |status| {
                status.state = AgentState::Idle;
                status.current_task = None;
                status.pid = None;
            }),
            ProcessRole::TestRun | ProcessRole::Recording => {
                self.replace_status(&slots, |status| status.state = AgentState::Idle)
            }
            ProcessRole::Scanner => {}
        }
        drop(slots);

        info!(role = %role, pid = ?slot.handle.pid, "Process stopped");
        let label = slot.handle.label().unwrap_or_default();
        let (kind, message) = match role {
            ProcessRole::Agent => (HistoryKind::AgentStopped, "Agent manually stopped".to_string()),
            ProcessRole::TestRun => (HistoryKind::TestRunStopped, format!("Test run stopped: {label}")),
            ProcessRole::Recording => (
                HistoryKind::RecordingStopped,
                format!("Recording stopped: {label}"),
            ),
            ProcessRole::Scanner => {
                self.emit(Event::ScannerStatus {
                    running: false,
                    scan_id: slot.handle.label.clone(),
                });
                (
                    HistoryKind::ScannerStopped,
                    format!("Discovery scan stopped: {label}"),
                )
            }
        };
        self.record(kind, message, None).await;
        Ok(())
    }

    /// Stop every live process.
    pub async fn stop_all(&self) {
        for role in ProcessRole::ALL {
            // Roles that are already idle are fine.
            let _ = self.stop(role).await;
        }
    }

    /// Broadcast that `task` changed.
    pub(crate) fn publish_task(&self, task: Task) {
        self.emit(Event::TaskChanged(task));
    }

    /// Broadcast `event` to every subscriber.
    pub(crate) fn emit(&self, event: Event) {
        let _ = self.inner.events.send(event);
    }

    /// Append a history entry and broadcast it.
    pub(crate) async fn record(
        &self,
        kind: HistoryKind,
        message: impl Into<String>,
        task_id: Option<Uuid>,
    ) {
        let entry = self.inner.board.lock().await.record(kind, message, task_id);
        self.emit(Event::History(entry));
    }

    /// Apply `update` to a copy of the status, re-derive the state from the
    /// live roles, and publish the copy. Callers hold the slot lock.
    fn replace_status(
        &self,
        slots: &HashMap<ProcessRole, Slot>,
        update: impl FnOnce(&mut AgentStatus),
    ) {
        let mut next = self.inner.status.borrow().clone();
        update(&mut next);

        if slots.keys().any(ProcessRole::is_testing) {
            next.state = AgentState::Testing;
        } else if slots.contains_key(&ProcessRole::Agent) {
            next.state = AgentState::Running;
        }
        next.last_updated = Some(Utc::now());

        self.inner.status.send_replace(next.clone());
        self.emit(Event::AgentStatusChanged(next));
    }

    async fn monitor(
        self,
        mut child: Child,
        stdout: tokio::process::ChildStdout,
        stderr: tokio::process::ChildStderr,
        mut kill_rx: oneshot::Receiver<()>,
        run: RunContext,
    ) {
        let role = run.handle.role;
        let mut log = open_log(run.log_file.as_deref()).await;
        let mut out = Pipe::new(stdout);
        let mut err = Pipe::new(stderr);
        let mut killed = false;

        while out.open || err.open {
            tokio::select! {
                read = out.reader.read(&mut out.buf), if out.open => {
                    self.on_read(&run, &mut log, &mut out, read).await
                }
                read = err.reader.read(&mut err.buf), if err.open => {
                    self.on_read(&run, &mut log, &mut err, read).await
                }
                _ = &mut kill_rx => {
                    let _ = child.start_kill();
                    killed = true;
                    break;
                }
            }
        }
        drop((out, err));

        let status = if killed {
            child.wait().await
        } else {
            tokio::select! {
                status = child.wait() => status,
                _ = &mut kill_rx => {
                    let _ = child.start_kill();
                    child.wait().await
                }
            }
        };

        let exit_code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(role = %role, error = %e, "Failed to wait for process");
                None
            }
        };
        if let Some(file) = log.as_mut() {
            let _ = file.flush().await;
        }
        self.finish(run, exit_code).await;
    }

    /// Account for one read from a pipe. End of stream flushes what the
    /// pipe still holds.
    async fn on_read<R>(
        &self,
        run: &RunContext,
        log: &mut Option<File>,
        pipe: &mut Pipe<R>,
        read: std::io::Result<usize>,
    ) {
        let (text, lines) = match read {
            Ok(n) if n > 0 => {
                let text = pipe.text.decode(&pipe.buf[..n]);
                let lines = pipe.lines.push(&text);
                (text, lines)
            }
            result => {
                if let Err(e) = result {
                    debug!(role = %run.handle.role, error = %e, "Output stream failed");
                }
                pipe.open = false;
                let text = pipe.text.finish();
                let mut lines = pipe.lines.push(&text);
                lines.extend(pipe.lines.finish());
                (text, lines)
            }
        };

        if !text.is_empty() {
            self.handle_chunk(run, log, text).await;
        }
        for line in &lines {
            self.handle_markers(run, line).await;
        }
    }

    /// Tail, log and broadcast a chunk of output exactly as received.
    async fn handle_chunk(&self, run: &RunContext, log: &mut Option<File>, text: String) {
        let role = run.handle.role;
        run.handle.output.lock().await.push_str(&text);

        if let Some(file) = log.as_mut() {
            if let Err(e) = file.write_all(text.as_bytes()).await {
                warn!(role = %role, error = %e, "Failed to write process log; disabling it");
                *log = None;
            }
        }

        self.emit(Event::ProcessOutput { role, text });
    }

    async fn handle_markers(&self, run: &RunContext, line: &str) {
        for marker in scan_line(line) {
            match marker {
                Marker::TaskComplete(text) => {
                    self.record(HistoryKind::TaskCompleted, text, run.task_id).await
                }
                Marker::TaskFailed(text) => {
                    self.record(HistoryKind::TaskFailed, text, run.task_id).await
                }
                Marker::TestResult(result) => self.emit(Event::TestResult { result }),
            }
        }
    }

    /// Account for an observed exit.
    async fn finish(&self, run: RunContext, exit_code: Option<i32>) {
        let role = run.handle.role;
        let mut slots = self.inner.slots.lock().await;
        let owned = slots
            .get(&role)
            .is_some_and(|slot| slot.handle.id == run.handle.id);
        if !owned {
            drop(slots);
            debug!(role = %role, exit_code = ?exit_code, "Stopped process exited");
            self.emit(Event::ProcessExited {
                role,
                exit_code,
                stopped: true,
            });
            return;
        }
        slots.remove(&role);

        match role {
            ProcessRole::Agent => self.replace_status(&slots, |status| {
                status.state = if exit_code == Some(0) {
                    AgentState::Idle
                } else {
                    AgentState::Error
                };
                status.current_task = None;
                status.pid = None;
                status.last_exit_code = exit_code;
                status.last_run = Some(Utc::now());
            }),
            ProcessRole::TestRun | ProcessRole::Recording => {
                self.replace_status(&slots, |status| status.state = AgentState::Idle)
            }
            ProcessRole::Scanner => {}
        }
        drop(slots);

        info!(role = %role, pid = ?run.handle.pid, exit_code = ?exit_code, "Process exited");
        let passed = exit_code == Some(0);
        let label = run.handle.label.clone().unwrap_or_default();

        match role {
            ProcessRole::Agent => {
                let code = exit_code.map_or_else(|| "none".to_string(), |c| c.to_string());
                self.record(
                    HistoryKind::AgentFinished,
                    format!("Agent finished with exit code {code}"),
                    run.task_id,
                )
                .await;
            }
            ProcessRole::TestRun => {
                let result = self.run_result(&run, &label, exit_code, None).await;
                if let Some(path) = &run.result_file {
                    write_result(path, &result).await;
                }
                let verdict = if passed { "PASSED" } else { "FAILED" };
                self.record(
                    HistoryKind::TestRunComplete,
                    format!("Tests {verdict}: {label}"),
                    None,
                )
                .await;
                self.emit(Event::TestRunFinished(result.clone()));

                if !passed && self.inner.settings.auto_create_fix_tasks {
                    self.queue_remediation(&label, &result).await;
                }
            }
            ProcessRole::Recording => {
                let video = run
                    .artifact
                    .as_ref()
                    .filter(|_| passed)
                    .and_then(|p| p.file_name())
                    .map(|name| name.to_string_lossy().into_owned());
                let result = self.run_result(&run, &label, exit_code, video.clone()).await;
                let verdict = if passed { "completed" } else { "failed" };
                self.record(
                    HistoryKind::RecordingComplete,
                    format!("Recording {verdict}: {label}"),
                    None,
                )
                .await;
                self.emit(Event::TestRunFinished(result));
                if let Some(file) = video {
                    self.emit(Event::RecordingReady { file, flow: label });
                }
            }
            ProcessRole::Scanner => {
                let report = match (&run.artifact, passed) {
                    (Some(path), true) => match load_report(path).await {
                        Ok(report) => Some(report),
                        Err(e) => {
                            warn!(scan_id = %label, error = %e, "Scan finished without a usable report");
                            None
                        }
                    },
                    _ => None,
                };
                self.emit(Event::ScannerStatus {
                    running: false,
                    scan_id: None,
                });
                self.emit(Event::ScannerComplete {
                    scan_id: label.clone(),
                    exit_code,
                    report,
                });
                let verdict = if passed { "completed" } else { "failed" };
                self.record(
                    HistoryKind::ScannerComplete,
                    format!("Discovery scan {verdict}: {label}"),
                    None,
                )
                .await;
            }
        }

        self.emit(Event::ProcessExited {
            role,
            exit_code,
            stopped: false,
        });
    }

    async fn run_result(
        &self,
        run: &RunContext,
        flow: &str,
        exit_code: Option<i32>,
        video: Option<String>,
    ) -> TestRunResult {
        TestRunResult {
            timestamp: Utc::now(),
            flow: flow.to_string(),
            exit_code,
            passed: exit_code == Some(0),
            output: run.handle.output().await,
            video,
        }
    }

    async fn queue_remediation(&self, flow: &str, result: &TestRunResult) {
        let (outcome, entry) = {
            let mut board = self.inner.board.lock().await;
            let outcome = board.upsert_remediation(Some(flow), result);
            (outcome, board.recent_history(1).pop())
        };

        match &outcome {
            Remediation::Created(task) => info!(task_id = %task.id, title = %task.title, "Queued remediation task"),
            Remediation::Updated(task) => info!(task_id = %task.id, title = %task.title, "Refreshed remediation task"),
        }
        if let Some(entry) = entry {
            self.emit(Event::History(entry));
        }
        self.publish_task(outcome.task().clone());
    }
}

async fn open_log(path: Option<&Path>) -> Option<File> {
    let path = path?;
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %parent.display(), error = %e, "Failed to create log directory");
            return None;
        }
    }
    match OpenOptions::new().create(true).append(true).open(path).await {
        Ok(file) => Some(file),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to open process log");
            None
        }
    }
}

async fn write_result(path: &Path, result: &TestRunResult) {
    let body = match serde_json::to_vec_pretty(result) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Failed to serialize test result");
            return;
        }
    };
    if let Some(parent) = path.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }
    if let Err(e) = tokio::fs::write(path, body).await {
        warn!(path = %path.display(), error = %e, "Failed to write test result");
    }
}
