//! `flowdeck`: operator command line for the dashboard core.
//!
//! Each subcommand loads the configuration under `--root`, applies one
//! operation and, for process operations, follows the process output until
//! it exits.

mod follow;
mod render;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, eyre, OptionExt};
use color_eyre::Result;
use colored::Colorize;
use fd_core::config::load_config;
use fd_core::dashboard::{Dashboard, Outcome};
use fd_core::supervisor::RECENT_RESULTS_LIMIT;
use fd_core::synthesis::{latest_report, load_report};
use fd_protocol::{AgentMode, Event, NewTask, Op, ProcessRole, TaskSource};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "flowdeck")]
#[command(version)]
#[command(about = "Drive the coding agent, test runner and app scanner from one place")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Dashboard root holding `.flowdeck/`, `data/`, `agent/` and `maestro/`
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List every test flow, local flows shadowing repository flows
    Flows {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the device tests would run against
    Device,

    /// List candidate devices
    Devices,

    /// Capture the active device's screen
    Screenshot,

    /// Boot a simulator
    Boot {
        /// Simulator udid, as listed by `devices`
        udid: String,
    },

    /// Shut down a simulator
    Shutdown { udid: String },

    /// Generate test flows from a discovery report
    Synthesize {
        /// Report to compile instead of the newest one
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run one flow, or every local flow
    Test {
        /// Flow path relative to the flow tree, or "all"
        flow: Option<String>,

        /// Record a video of the run
        #[arg(long)]
        record: bool,
    },

    /// Discover the app's screens
    Scan {
        /// Generate test flows from the report when the scan succeeds
        #[arg(long)]
        generate: bool,
    },

    /// Run the coding agent
    Agent {
        #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
        mode: ModeArg,

        /// Queue a task with this title and work on it
        #[arg(long)]
        task_title: Option<String>,
    },

    /// Show recent test-run results
    Results {
        #[arg(long, default_value_t = RECENT_RESULTS_LIMIT)]
        limit: usize,
    },

    /// Summarize configuration, device and flows
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Auto,
    SpecificTask,
    TestAndFix,
}

impl From<ModeArg> for AgentMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => AgentMode::Auto,
            ModeArg::SpecificTask => AgentMode::SpecificTask,
            ModeArg::TestAndFix => AgentMode::TestAndFix,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    debug!("parsed cli arguments: {cli:?}");

    let config = load_config(&cli.root).await?;
    let dashboard = Dashboard::from_config(config);

    match cli.command {
        Commands::Flows { json } => flows(&dashboard, json).await,
        Commands::Device => device(&dashboard).await,
        Commands::Devices => devices(&dashboard).await,
        Commands::Screenshot => screenshot(&dashboard).await,
        Commands::Boot { udid } => power(&dashboard, Op::BootSimulator { udid }).await,
        Commands::Shutdown { udid } => power(&dashboard, Op::ShutdownSimulator { udid }).await,
        Commands::Results { limit } => results(&dashboard, limit).await,
        Commands::Synthesize { report } => synthesize(&dashboard, report).await,
        Commands::Test { flow, record } => test(&dashboard, flow, record).await,
        Commands::Scan { generate } => scan(&dashboard, generate).await,
        Commands::Agent { mode, task_title } => agent(&dashboard, mode.into(), task_title).await,
        Commands::Status => status(&dashboard).await,
    }
}

async fn flows(dashboard: &Dashboard, json: bool) -> Result<()> {
    let Outcome::Flows(flows) = dashboard.apply(Op::ListFlows).await? else {
        bail!("unexpected reply to ListFlows");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&flows)?);
    } else {
        render::flows(&flows);
    }
    Ok(())
}

async fn device(dashboard: &Dashboard) -> Result<()> {
    let Outcome::Device(device) = dashboard.apply(Op::ResolveDevice).await? else {
        bail!("unexpected reply to ResolveDevice");
    };
    let device = device.ok_or_eyre("No device available. Connect a device over USB or boot a simulator.")?;
    println!("{}", render::device(&device));
    Ok(())
}

async fn devices(dashboard: &Dashboard) -> Result<()> {
    let devices = dashboard
        .resolver()
        .list_devices(dashboard.config().settings.device_mode)
        .await;
    if devices.is_empty() {
        println!("{}", "No devices found".yellow());
    }
    for device in &devices {
        println!("{}", render::device(device));
    }
    Ok(())
}

async fn screenshot(dashboard: &Dashboard) -> Result<()> {
    let Outcome::Screenshot { path, device } = dashboard.apply(Op::TakeScreenshot).await? else {
        bail!("unexpected reply to TakeScreenshot");
    };
    println!(
        "{} {} ({})",
        "Saved".green().bold(),
        path.display(),
        device.name
    );
    Ok(())
}

async fn power(dashboard: &Dashboard, op: Op) -> Result<()> {
    let Outcome::Simulator { udid, state } = dashboard.apply(op).await? else {
        bail!("unexpected reply to a simulator request");
    };
    println!("{udid}: {}", render::simulator_state(state));
    Ok(())
}

async fn results(dashboard: &Dashboard, limit: usize) -> Result<()> {
    let results = dashboard.recent_results(limit).await;
    if results.is_empty() {
        println!("{}", "No test results yet".yellow());
    }
    for result in &results {
        render::run_result(result);
    }
    Ok(())
}

async fn synthesize(dashboard: &Dashboard, report: Option<PathBuf>) -> Result<()> {
    let report = match report {
        Some(path) => load_report(&path).await?,
        None => latest_report(&dashboard.config().layout.discovery_dir).await?,
    };
    let flows = dashboard.generate_tests(&report).await?;
    render::generated(&report.scan_id, &flows);
    Ok(())
}

async fn test(dashboard: &Dashboard, flow: Option<String>, record: bool) -> Result<()> {
    dashboard.config().layout.ensure_dirs()?;
    let (role, op) = if record {
        let flow = flow.ok_or_eyre("--record needs a flow to record")?;
        (ProcessRole::Recording, Op::RecordFlow { flow })
    } else {
        (ProcessRole::TestRun, Op::RunTests { flow })
    };

    let mut events = dashboard.supervisor().subscribe();
    dashboard.apply(op).await?;
    let run = follow::until_exit(dashboard.supervisor(), &mut events, role, None).await?;

    let result = run
        .events
        .iter()
        .find_map(|e| match e {
            Event::TestRunFinished(result) => Some(result.clone()),
            _ => None,
        })
        .ok_or_else(|| eyre!("{role} was stopped before it finished"))?;
    render::run_result(&result);
    for event in &run.events {
        if let Event::RecordingReady { file, .. } = event {
            let path = dashboard.config().layout.recordings_dir.join(file);
            println!("{} {}", "Recording".green().bold(), path.display());
        }
    }

    if !result.passed {
        bail!("Tests failed: {}", result.flow);
    }
    Ok(())
}

async fn scan(dashboard: &Dashboard, generate: bool) -> Result<()> {
    dashboard.config().layout.ensure_dirs()?;
    let mut events = dashboard.supervisor().subscribe();
    let Outcome::Started(info) = dashboard.apply(Op::StartScan).await? else {
        bail!("unexpected reply to StartScan");
    };
    let scan_id = info.label.unwrap_or_default();
    let run = follow::until_exit(dashboard.supervisor(), &mut events, ProcessRole::Scanner, None).await?;

    let report = run.events.into_iter().find_map(|e| match e {
        Event::ScannerComplete { report, .. } => report,
        _ => None,
    });
    let Some(report) = report else {
        bail!("Scan {scan_id} produced no report");
    };
    render::report(&report);

    if generate {
        let flows = dashboard.generate_tests(&report).await?;
        render::generated(&report.scan_id, &flows);
    }
    Ok(())
}

async fn agent(dashboard: &Dashboard, mode: AgentMode, task_title: Option<String>) -> Result<()> {
    let (mode, task_id) = match task_title {
        Some(title) => {
            let task = dashboard
                .add_task(NewTask {
                    title,
                    source: TaskSource::Manual,
                    ..Default::default()
                })
                .await;
            let mode = if mode == AgentMode::Auto {
                AgentMode::SpecificTask
            } else {
                mode
            };
            (mode, Some(task.id))
        }
        None => (mode, None),
    };

    let mut events = dashboard.supervisor().subscribe();
    dashboard.apply(Op::StartAgent { mode, task_id }).await?;
    let limit = dashboard.supervisor().max_agent_runtime();
    let run = follow::until_exit(dashboard.supervisor(), &mut events, ProcessRole::Agent, Some(limit)).await?;

    if run.timed_out {
        bail!("Agent exceeded its maximum runtime of {}s and was stopped", limit.as_secs());
    }
    match run.exit_code {
        Some(0) => {
            println!("{}", "Agent finished".green().bold());
            Ok(())
        }
        code => bail!("Agent failed with exit code {code:?}"),
    }
}

async fn status(dashboard: &Dashboard) -> Result<()> {
    let config = dashboard.config();
    let settings = &config.settings;
    let flows = dashboard.registry().list_flows();
    let latest = latest_report(&config.layout.discovery_dir).await.ok();
    let device = dashboard
        .resolver()
        .resolve_active_device(settings.device_mode)
        .await;

    println!("{:<14} {}", "Root".bold(), config.layout.root.display());
    println!("{:<14} {}", "App".bold(), settings.app_id);
    println!("{:<14} {}", "App mode".bold(), settings.app_mode.as_str());
    println!("{:<14} {}", "Device mode".bold(), settings.device_mode);
    println!(
        "{:<14} {}",
        "Device".bold(),
        device.as_ref().map_or_else(|| "none".dimmed().to_string(), render::device)
    );
    println!("{:<14} {}", "Flows".bold(), render::flow_counts(&flows));
    println!(
        "{:<14} {}",
        "Latest scan".bold(),
        latest.map_or_else(|| "none".dimmed().to_string(), |r| r.scan_id)
    );
    Ok(())
}
