//! Operation dispatch for outer surfaces.
//!
//! The `Dashboard` owns one instance of each core component and applies
//! [`Op`] commands to them. Long-running operations return as soon as the
//! process is started; progress arrives on the supervisor's event channel.

pub mod error;

pub use error::{DashboardError, DashboardResult};

use crate::board::TaskBoard;
use crate::config::AppConfig;
use crate::devices::{DeviceInventory, DeviceResolver, ScreenshotSettings, XcrunInventory};
use crate::flows::FlowRegistry;
use crate::supervisor::{recent_results, Supervisor, SupervisorSettings, RECENT_RESULTS_LIMIT};
use crate::synthesis::{latest_report, Synthesizer};
use chrono::Utc;
use fd_protocol::{
    DeviceDescriptor, DiscoveryReport, Event, FlowDescriptor, HistoryKind, NewTask, Op,
    ProcessInfo, ProcessRole, SimulatorState, Task, TestRunResult,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// What an applied operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A process was started under its role.
    Started(ProcessInfo),

    /// The process under this role was stopped.
    Stopped(ProcessRole),

    Flows(Vec<FlowDescriptor>),

    /// The active device, if any.
    Device(Option<DeviceDescriptor>),

    /// Names of the generated flow documents, relative to the local tree.
    Generated(Vec<String>),

    Screenshot {
        path: PathBuf,
        device: DeviceDescriptor,
    },

    Simulator {
        udid: String,
        state: SimulatorState,
    },

    /// Scanner progress was relayed to observers.
    Relayed,

    /// Recent test-run results, newest first.
    Results(Vec<TestRunResult>),
}

/// The core components wired together for one dashboard root.
pub struct Dashboard {
    config: AppConfig,
    registry: FlowRegistry,
    resolver: DeviceResolver,
    supervisor: Supervisor,
    synthesizer: Synthesizer,
    screenshots: ScreenshotSettings,
}

impl Dashboard {
    /// Wire the components for `config` against the host's device tools.
    pub fn from_config(config: AppConfig) -> Self {
        Self::with_inventory(config, Arc::new(XcrunInventory::new()))
    }

    /// Wire the components for `config`, enumerating devices through
    /// `inventory`.
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration
    /// * `inventory` - Source of physical and virtual device lists
    pub fn with_inventory(config: AppConfig, inventory: Arc<dyn DeviceInventory>) -> Self {
        let settings = &config.settings;
        let board = Arc::new(Mutex::new(TaskBoard::new()));

        Self {
            registry: FlowRegistry::from_config(&config),
            resolver: DeviceResolver::new(inventory)
                .with_pinned_udid(settings.physical_device_id.clone()),
            supervisor: Supervisor::new(SupervisorSettings::from_config(settings), board),
            synthesizer: Synthesizer::from_config(&config),
            screenshots: ScreenshotSettings::from_config(settings),
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &DeviceResolver {
        &self.resolver
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Apply one operation.
    ///
    /// # Errors
    ///
    /// Whatever the component handling the operation reports: supervisor
    /// errors for process operations, `NoDeviceAvailable` for screenshots,
    /// `ReportNotFound` when generating without a discovery report.
    pub async fn apply(&self, op: Op) -> DashboardResult<Outcome> {
        let config = &self.config;
        let outcome = match op {
            Op::StartAgent { mode, task_id } => Outcome::Started(
                self.supervisor
                    .start_agent(config, mode, task_id)
                    .await?
                    .info(),
            ),
            Op::StopAgent => self.stop(ProcessRole::Agent).await?,
            Op::RunTests { flow } => Outcome::Started(
                self.supervisor
                    .run_tests(config, &self.registry, &self.resolver, flow.as_deref())
                    .await?
                    .info(),
            ),
            Op::RecordFlow { flow } => Outcome::Started(
                self.supervisor
                    .record_flow(config, &self.registry, &self.resolver, &flow)
                    .await?
                    .info(),
            ),
            Op::StopRecording => self.stop(ProcessRole::Recording).await?,
            Op::StartScan => Outcome::Started(
                self.supervisor
                    .start_scan(config, &self.resolver)
                    .await?
                    .info(),
            ),
            Op::StopScan => self.stop(ProcessRole::Scanner).await?,
            Op::GenerateTests => {
                let report = latest_report(&config.layout.discovery_dir).await?;
                Outcome::Generated(self.generate_tests(&report).await?)
            }
            Op::TakeScreenshot => self.take_screenshot().await?,
            Op::ListFlows => Outcome::Flows(self.registry.list_flows()),
            Op::ResolveDevice => Outcome::Device(
                self.resolver
                    .resolve_active_device(config.settings.device_mode)
                    .await,
            ),
            Op::BootSimulator { udid } => {
                let state = self.boot_simulator(&udid).await?;
                Outcome::Simulator { udid, state }
            }
            Op::ShutdownSimulator { udid } => {
                let state = self.shutdown_simulator(&udid).await?;
                Outcome::Simulator { udid, state }
            }
            Op::ScannerProgress { progress } => {
                self.scanner_progress(progress);
                Outcome::Relayed
            }
            Op::RecentResults => Outcome::Results(self.recent_results(RECENT_RESULTS_LIMIT).await),
        };
        Ok(outcome)
    }

    /// Compile `report` into flow documents and announce them.
    pub async fn generate_tests(&self, report: &DiscoveryReport) -> DashboardResult<Vec<String>> {
        let synthesizer = self.synthesizer.clone();
        let owned = report.clone();
        let flows = tokio::task::spawn_blocking(move || synthesizer.synthesize(&owned)).await??;
        self.supervisor
            .record(
                HistoryKind::TestsGenerated,
                format!("Generated {} test flows from {}", flows.len(), report.scan_id),
                None,
            )
            .await;
        self.supervisor.emit(Event::FlowsGenerated {
            flows: flows.clone(),
        });
        Ok(flows)
    }

    /// Boot the simulator with `udid` and announce it.
    ///
    /// A udid naming a physical device reports `AlreadyConnected` and is not
    /// announced.
    pub async fn boot_simulator(&self, udid: &str) -> DashboardResult<SimulatorState> {
        let state = self.resolver.boot_simulator(udid).await?;
        if state == SimulatorState::Booting {
            let name = self.device_name(udid).await;
            self.supervisor
                .record(
                    HistoryKind::SimulatorBooted,
                    format!("iOS Simulator booted: {name}"),
                    None,
                )
                .await;
            self.supervisor.emit(Event::SimulatorStatus {
                udid: udid.to_string(),
                state,
            });
        }
        Ok(state)
    }

    /// Shut down the simulator with `udid` and announce it.
    pub async fn shutdown_simulator(&self, udid: &str) -> DashboardResult<SimulatorState> {
        let state = self.resolver.shutdown_simulator(udid).await?;
        self.supervisor
            .record(
                HistoryKind::SimulatorShutdown,
                format!("Simulator shut down: {udid}"),
                None,
            )
            .await;
        self.supervisor.emit(Event::SimulatorStatus {
            udid: udid.to_string(),
            state,
        });
        Ok(state)
    }

    /// Relay progress the scanner posted to its callback endpoint.
    pub fn scanner_progress(&self, progress: serde_json::Value) {
        self.supervisor.emit(Event::ScannerProgress(progress));
    }

    /// Up to `limit` test-run results, newest first.
    pub async fn recent_results(&self, limit: usize) -> Vec<TestRunResult> {
        recent_results(&self.config.layout.results_dir, limit).await
    }

    /// Display name for `udid`, or the udid itself when it is not listed.
    async fn device_name(&self, udid: &str) -> String {
        self.resolver
            .list_devices(self.config.settings.device_mode)
            .await
            .into_iter()
            .find(|d| d.udid == udid)
            .map_or_else(|| udid.to_string(), |d| d.name)
    }

    /// Add a task to the board and announce it.
    pub async fn add_task(&self, new: NewTask) -> Task {
        let task = self.supervisor.board().lock().await.add_task(new);
        self.supervisor.publish_task(task.clone());
        task
    }

    async fn stop(&self, role: ProcessRole) -> DashboardResult<Outcome> {
        self.supervisor.stop(role).await?;
        Ok(Outcome::Stopped(role))
    }

    async fn take_screenshot(&self) -> DashboardResult<Outcome> {
        let path = self
            .config
            .layout
            .screenshots_dir
            .join(format!("screenshot-{}.png", Utc::now().timestamp_millis()));
        tokio::fs::create_dir_all(&self.config.layout.screenshots_dir)
            .await
            .map_err(crate::devices::DeviceError::from)?;

        let device = self
            .resolver
            .take_screenshot(self.config.settings.device_mode, &path, &self.screenshots)
            .await?;

        info!(path = %path.display(), device = %device.name, "Screenshot saved");
        self.supervisor
            .record(
                HistoryKind::ScreenshotTaken,
                format!("Screenshot taken on {}", device.name),
                None,
            )
            .await;
        self.supervisor.emit(Event::ScreenshotTaken {
            path: path.clone(),
            device: device.kind,
        });
        Ok(Outcome::Screenshot { path, device })
    }
}
