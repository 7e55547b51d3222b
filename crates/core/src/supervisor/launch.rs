//! Command lines for each supervised role.
//!
//! The builders are pure: they turn configuration, an optional target device
//! and the flow registry into a [`LaunchSpec`]. The `Supervisor` methods at
//! the bottom resolve the device, build the launch spec and start it.

use crate::config::models::AppConfig;
use crate::devices::DeviceResolver;
use crate::flows::FlowRegistry;
use crate::supervisor::error::{SupervisorError, SupervisorResult};
use crate::supervisor::{ProcessHandle, Supervisor};
use chrono::Utc;
use fd_protocol::{AgentMode, DeviceDescriptor, ProcessRole, Task, TaskStatus};
use std::path::PathBuf;
use uuid::Uuid;

/// Placeholder task reference while the agent picks its own task.
pub const AUTO_SELECTING: &str = "auto-selecting";

/// Label of a test run over the whole local tree.
pub const ALL_FLOWS: &str = "all";

/// Everything needed to spawn and account for one child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,

    /// Added to the inherited environment.
    pub env: Vec<(String, String)>,

    pub cwd: Option<PathBuf>,

    /// Human-readable reference: the task, flow or scan id.
    pub label: Option<String>,

    /// Task the process works on, attached to marker history entries.
    pub task_id: Option<Uuid>,

    /// Output is also appended here.
    pub log_file: Option<PathBuf>,

    /// File the process is expected to produce: a recording or a scan report.
    pub artifact: Option<PathBuf>,

    /// Where the test-run result is written on exit.
    pub result_file: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Value of an environment entry added by this spec.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Device-targeting flags for the test runner.
///
/// Physical devices are driven through the device bridge and need explicit
/// flags. Simulators are picked up by the runner on its own.
pub fn device_flags(device: Option<&DeviceDescriptor>, driver_host_port: u16) -> Vec<String> {
    match device {
        Some(device) if device.is_physical() => vec![
            "--driver-host-port".to_string(),
            driver_host_port.to_string(),
            "--device".to_string(),
            device.udid.clone(),
        ],
        _ => Vec::new(),
    }
}

/// Coding-agent launch.
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `mode` - How the agent picks its work
/// * `task` - Specific task to work on, if any
/// * `queued` - Tasks the agent may choose from
pub fn agent_launch(
    config: &AppConfig,
    mode: AgentMode,
    task: Option<&Task>,
    queued: &[&Task],
) -> LaunchSpec {
    let settings = &config.settings;
    let log_file = config
        .layout
        .logs_dir
        .join(format!("agent-{}.log", Utc::now().timestamp_millis()));
    let task_context = task
        .map(|t| format!("SPECIFIC_TASK=\"{}: {}\"", t.title, t.description))
        .unwrap_or_default();
    let tasks_json = serde_json::to_string(queued).unwrap_or_else(|_| "[]".to_string());

    let mut spec = LaunchSpec::new("bash")
        .arg(config.layout.agent_script.display().to_string())
        .current_dir(config.agent_workdir())
        .label(task.map_or(AUTO_SELECTING, |t| t.title.as_str()))
        .env("AGENT_MODE", mode.as_str())
        .env("WORKTREE_PATH", &settings.worktree_path)
        .env("REPO_PATH", &settings.repo_path)
        .env("APP_ID", &settings.app_id)
        .env("LOG_FILE", log_file.display().to_string())
        .env("TASK_CONTEXT", task_context)
        .env("TASKS_JSON", tasks_json)
        .env("AGENT_MODEL", &settings.agent_model)
        .env("DASHBOARD_URL", &settings.dashboard_url);
    spec.task_id = task.map(|t| t.id);
    spec.log_file = Some(log_file);
    spec
}

/// Test-runner launch for one flow, or the whole local tree when `flow` is
/// `None` or `"all"`.
///
/// A flow missing from both trees still resolves to its local path; the
/// runner reports the failure.
pub fn test_run_launch(
    config: &AppConfig,
    registry: &FlowRegistry,
    flow: Option<&str>,
    device: Option<&DeviceDescriptor>,
) -> LaunchSpec {
    let settings = &config.settings;
    let flow = flow.filter(|f| !f.is_empty() && *f != ALL_FLOWS);
    let target = match flow {
        Some(flow) => registry
            .resolve(flow)
            .unwrap_or_else(|| registry.local_root().join(flow)),
        None => registry.local_root().to_path_buf(),
    };

    let mut spec = LaunchSpec::new(&settings.maestro_bin)
        .args(device_flags(device, settings.driver_host_port))
        .arg("test")
        .arg(target.display().to_string())
        .args(["--format", "JUNIT"])
        .current_dir(&config.layout.root)
        .label(flow.unwrap_or(ALL_FLOWS));
    spec.result_file = Some(
        config
            .layout
            .results_dir
            .join(format!("test-{}.json", Utc::now().timestamp_millis())),
    );
    spec
}

/// Video-recording launch for `flow`.
///
/// # Errors
///
/// Returns `FlowNotFound` if neither tree has the flow.
pub fn recording_launch(
    config: &AppConfig,
    registry: &FlowRegistry,
    flow: &str,
    device: Option<&DeviceDescriptor>,
) -> SupervisorResult<LaunchSpec> {
    let settings = &config.settings;
    let flow_path = registry
        .resolve(flow)
        .ok_or_else(|| SupervisorError::FlowNotFound(flow.to_string()))?;
    let video = config
        .layout
        .recordings_dir
        .join(format!("recording-{}.mp4", Utc::now().timestamp_millis()));

    let mut spec = LaunchSpec::new(&settings.maestro_bin)
        .args(device_flags(device, settings.driver_host_port))
        .arg("record")
        .arg(flow_path.display().to_string())
        .arg("--output")
        .arg(video.display().to_string())
        .current_dir(&config.layout.root)
        .label(flow);
    spec.artifact = Some(video);
    Ok(spec)
}

/// A fresh scan id, `scan-<epoch millis>`.
pub fn new_scan_id() -> String {
    format!("scan-{}", Utc::now().timestamp_millis())
}

/// Discovery-scanner launch. The scan id becomes the label and the expected
/// report its artifact.
pub fn scanner_launch(
    config: &AppConfig,
    scan_id: &str,
    device: Option<&DeviceDescriptor>,
) -> LaunchSpec {
    let settings = &config.settings;
    let device_type = match device {
        Some(d) if d.is_physical() => "physical",
        _ => "simulator",
    };

    let mut spec = LaunchSpec::new("bash")
        .arg(config.layout.scanner_script.display().to_string())
        .current_dir(&config.layout.root)
        .label(scan_id)
        .env("DASHBOARD_URL", &settings.dashboard_url)
        .env("APP_ID", &settings.app_id)
        .env("SCAN_ID", scan_id)
        .env("DEVICE_TYPE", device_type)
        .env("DEVICE_UDID", device.map(|d| d.udid.as_str()).unwrap_or_default())
        .env("DEVICE_NAME", device.map(|d| d.name.as_str()).unwrap_or_default())
        .env("APP_MODE", settings.app_mode.as_str())
        .env("EXPO_DEV_URL", &settings.expo_dev_url);
    spec.artifact = Some(config.layout.report_path(scan_id));
    spec
}

impl Supervisor {
    /// Start the coding agent.
    ///
    /// With a `task_id`, that task is moved to in-progress once the agent is
    /// running and is excluded from the queued list the agent receives.
    ///
    /// # Errors
    ///
    /// - `TaskNotFound` if `task_id` names no task
    /// - `AlreadyRunning` if an agent is live
    /// - `ToolInvocationFailed` if the script cannot be spawned
    pub async fn start_agent(
        &self,
        config: &AppConfig,
        mode: AgentMode,
        task_id: Option<Uuid>,
    ) -> SupervisorResult<ProcessHandle> {
        let spec = {
            let board = self.board().lock().await;
            let task = match task_id {
                Some(id) => Some(board.task(id).ok_or(SupervisorError::TaskNotFound(id))?),
                None => None,
            };
            let queued: Vec<&Task> = board
                .queued_tasks()
                .into_iter()
                .filter(|t| Some(t.id) != task_id)
                .collect();
            agent_launch(config, mode, task, &queued)
        };

        let handle = self.start(ProcessRole::Agent, spec).await?;

        if let Some(id) = task_id {
            let updated = self.board().lock().await.set_status(id, TaskStatus::InProgress);
            if let Some(task) = updated {
                self.publish_task(task);
            }
        }
        Ok(handle)
    }

    /// Run one flow, or every local flow when `flow` is `None`.
    pub async fn run_tests(
        &self,
        config: &AppConfig,
        registry: &FlowRegistry,
        resolver: &DeviceResolver,
        flow: Option<&str>,
    ) -> SupervisorResult<ProcessHandle> {
        let device = resolver
            .resolve_active_device(config.settings.device_mode)
            .await;
        let spec = test_run_launch(config, registry, flow, device.as_ref());
        self.start(ProcessRole::TestRun, spec).await
    }

    /// Record a video of `flow`.
    pub async fn record_flow(
        &self,
        config: &AppConfig,
        registry: &FlowRegistry,
        resolver: &DeviceResolver,
        flow: &str,
    ) -> SupervisorResult<ProcessHandle> {
        let device = resolver
            .resolve_active_device(config.settings.device_mode)
            .await;
        let spec = recording_launch(config, registry, flow, device.as_ref())?;
        self.start(ProcessRole::Recording, spec).await
    }

    /// Start a discovery scan. The handle's label is the scan id.
    pub async fn start_scan(
        &self,
        config: &AppConfig,
        resolver: &DeviceResolver,
    ) -> SupervisorResult<ProcessHandle> {
        let device = resolver
            .resolve_active_device(config.settings.device_mode)
            .await;
        let spec = scanner_launch(config, &new_scan_id(), device.as_ref());
        self.start(ProcessRole::Scanner, spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fd_protocol::{DeviceKind, NewTask, TaskPriority};
    use std::fs;
    use tempfile::tempdir;

    fn physical() -> DeviceDescriptor {
        DeviceDescriptor {
            udid: "00008110-001A2B3C4D5E6F70".to_string(),
            management_id: Some("5A1B2C3D".to_string()),
            name: "Dana's iPhone".to_string(),
            model: "iPhone 15 Pro".to_string(),
            kind: DeviceKind::Physical,
            state: "wired".to_string(),
            ready: true,
            runtime: None,
        }
    }

    fn simulator() -> DeviceDescriptor {
        DeviceDescriptor {
            udid: "SIM-1".to_string(),
            management_id: None,
            name: "iPhone 15".to_string(),
            model: String::new(),
            kind: DeviceKind::Virtual,
            state: "Booted".to_string(),
            ready: true,
            runtime: Some("iOS-17-5".to_string()),
        }
    }

    fn sample_task(title: &str) -> Task {
        let mut board = crate::board::TaskBoard::new();
        board.add_task(NewTask {
            title: title.to_string(),
            description: "Map crashes on zoom".to_string(),
            priority: TaskPriority::High,
            ..Default::default()
        })
    }

    #[test]
    fn test_device_flags_only_for_physical() {
        assert_eq!(
            device_flags(Some(&physical()), 6001),
            vec!["--driver-host-port", "6001", "--device", "00008110-001A2B3C4D5E6F70"]
        );
        assert!(device_flags(Some(&simulator()), 6001).is_empty());
        assert!(device_flags(None, 6001).is_empty());
    }

    #[test]
    fn test_agent_launch_env() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut config = AppConfig::with_defaults(dir.path());
        config.settings.worktree_path = "/work/tree".to_string();
        let task = sample_task("Fix trail map");
        let other = sample_task("Add dark mode");

        let spec = agent_launch(&config, AgentMode::SpecificTask, Some(&task), &[&other]);

        assert_eq!(spec.program, "bash");
        assert_eq!(spec.args, vec![config.layout.agent_script.display().to_string()]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/work/tree")));
        assert_eq!(spec.label.as_deref(), Some("Fix trail map"));
        assert_eq!(spec.task_id, Some(task.id));
        assert_eq!(spec.env_value("AGENT_MODE"), Some("specific-task"));
        assert_eq!(
            spec.env_value("TASK_CONTEXT"),
            Some("SPECIFIC_TASK=\"Fix trail map: Map crashes on zoom\"")
        );

        let queued: Vec<Task> = serde_json::from_str(spec.env_value("TASKS_JSON").unwrap_or("[]"))
            .expect("TASKS_JSON is a task list");
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].title, "Add dark mode");

        let log_file = spec.log_file.clone().expect("log file set");
        assert!(log_file.starts_with(&config.layout.logs_dir));
        assert_eq!(spec.env_value("LOG_FILE"), Some(log_file.display().to_string().as_str()));
    }

    #[test]
    fn test_agent_launch_auto_mode() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config = AppConfig::with_defaults(dir.path());

        let spec = agent_launch(&config, AgentMode::Auto, None, &[]);
        assert_eq!(spec.label.as_deref(), Some(AUTO_SELECTING));
        assert_eq!(spec.cwd, Some(dir.path().to_path_buf()));
        assert_eq!(spec.env_value("TASK_CONTEXT"), Some(""));
        assert_eq!(spec.env_value("TASKS_JSON"), Some("[]"));
        assert_eq!(spec.env_value("DASHBOARD_URL"), Some("http://localhost:3847"));
    }

    #[test]
    fn test_test_run_launch_resolves_through_registry() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config = AppConfig::with_defaults(dir.path());
        let fallback = dir.path().join("app/maestro/flows");
        fs::create_dir_all(fallback.join("auth")).expect("Failed to create fallback tree");
        fs::write(fallback.join("auth/login.yaml"), "").expect("Failed to write flow");
        let registry = FlowRegistry::new(config.layout.flows_dir.clone(), Some(fallback.clone()));

        let spec = test_run_launch(&config, &registry, Some("auth/login.yaml"), Some(&physical()));
        assert_eq!(spec.program, "maestro");
        assert_eq!(
            spec.args,
            vec![
                "--driver-host-port".to_string(),
                "6001".to_string(),
                "--device".to_string(),
                "00008110-001A2B3C4D5E6F70".to_string(),
                "test".to_string(),
                fallback.join("auth/login.yaml").display().to_string(),
                "--format".to_string(),
                "JUNIT".to_string(),
            ]
        );
        assert_eq!(spec.label.as_deref(), Some("auth/login.yaml"));
        assert!(spec
            .result_file
            .as_ref()
            .is_some_and(|p| p.starts_with(&config.layout.results_dir)));
    }

    #[test]
    fn test_test_run_launch_all_flows() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config = AppConfig::with_defaults(dir.path());
        let registry = FlowRegistry::new(config.layout.flows_dir.clone(), None);

        for flow in [None, Some("all")] {
            let spec = test_run_launch(&config, &registry, flow, Some(&simulator()));
            assert_eq!(
                spec.args,
                vec![
                    "test".to_string(),
                    config.layout.flows_dir.display().to_string(),
                    "--format".to_string(),
                    "JUNIT".to_string(),
                ]
            );
            assert_eq!(spec.label.as_deref(), Some("all"));
        }
    }

    #[test]
    fn test_test_run_launch_unknown_flow_uses_local_candidate() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config = AppConfig::with_defaults(dir.path());
        let registry = FlowRegistry::new(config.layout.flows_dir.clone(), None);

        let spec = test_run_launch(&config, &registry, Some("missing.yaml"), None);
        assert_eq!(
            spec.args[1],
            config.layout.flows_dir.join("missing.yaml").display().to_string()
        );
    }

    #[test]
    fn test_recording_launch() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config = AppConfig::with_defaults(dir.path());
        fs::create_dir_all(&config.layout.flows_dir).expect("Failed to create flows dir");
        fs::write(config.layout.flows_dir.join("smoke.yaml"), "").expect("Failed to write flow");
        let registry = FlowRegistry::new(config.layout.flows_dir.clone(), None);

        let spec = recording_launch(&config, &registry, "smoke.yaml", None)
            .expect("Failed to build recording spec");
        let video = spec.artifact.clone().expect("video path set");
        assert!(video.starts_with(&config.layout.recordings_dir));
        assert_eq!(spec.args[0], "record");
        assert_eq!(spec.args[2], "--output");
        assert_eq!(spec.args[3], video.display().to_string());

        let missing = recording_launch(&config, &registry, "nope.yaml", None);
        if let Err(SupervisorError::FlowNotFound(flow)) = missing {
            assert_eq!(flow, "nope.yaml");
        } else {
            panic!("Expected FlowNotFound");
        }
    }

    #[test]
    fn test_scanner_launch_env() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut config = AppConfig::with_defaults(dir.path());
        config.settings.expo_dev_url = "exp://192.168.1.5:8081".to_string();

        let spec = scanner_launch(&config, "scan-42", Some(&physical()));
        assert_eq!(spec.label.as_deref(), Some("scan-42"));
        assert_eq!(spec.env_value("SCAN_ID"), Some("scan-42"));
        assert_eq!(spec.env_value("DEVICE_TYPE"), Some("physical"));
        assert_eq!(spec.env_value("DEVICE_UDID"), Some("00008110-001A2B3C4D5E6F70"));
        assert_eq!(spec.env_value("DEVICE_NAME"), Some("Dana's iPhone"));
        assert_eq!(spec.env_value("APP_MODE"), Some("expo-go"));
        assert_eq!(spec.env_value("EXPO_DEV_URL"), Some("exp://192.168.1.5:8081"));
        assert_eq!(spec.artifact, Some(config.layout.report_path("scan-42")));

        let no_device = scanner_launch(&config, "scan-43", None);
        assert_eq!(no_device.env_value("DEVICE_TYPE"), Some("simulator"));
        assert_eq!(no_device.env_value("DEVICE_UDID"), Some(""));
    }

    #[test]
    fn test_scan_id_format() {
        let id = new_scan_id();
        let millis = id.strip_prefix("scan-").expect("scan- prefix");
        assert!(millis.parse::<i64>().is_ok());
    }
}
