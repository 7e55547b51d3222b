//! Terminal rendering.

use colored::Colorize;
use std::io::Write as _;
use fd_protocol::{
    DeviceDescriptor, DiscoveryReport, Event, FlowDescriptor, FlowSource, ProcessRole,
    SimulatorState, TestRunResult,
};

/// Flows grouped under their category, in catalog order.
pub fn flows(flows: &[FlowDescriptor]) {
    if flows.is_empty() {
        println!("{}", "No flows found".yellow());
        return;
    }

    let mut categories: Vec<&str> = Vec::new();
    for flow in flows {
        if !categories.contains(&flow.category.as_str()) {
            categories.push(&flow.category);
        }
    }

    for category in categories {
        println!("{}", category.bold());
        for flow in flows.iter().filter(|f| f.category == category) {
            let source = match flow.source {
                FlowSource::Local => "local".green(),
                FlowSource::Fallback => "repo".cyan(),
            };
            println!("  {:<40} {:<6} {}", flow.relative_path, source, flow.name.dimmed());
        }
    }
}

pub fn flow_counts(flows: &[FlowDescriptor]) -> String {
    let local = flows.iter().filter(|f| f.source == FlowSource::Local).count();
    format!("{} ({local} local, {} repo)", flows.len(), flows.len() - local)
}

/// One-line device summary.
pub fn device(device: &DeviceDescriptor) -> String {
    let kind = if device.is_physical() {
        "physical".cyan()
    } else {
        "simulator".magenta()
    };
    let state = if device.ready {
        device.state.green()
    } else {
        device.state.dimmed()
    };
    format!("{} {kind} {} [{state}]", device.name.bold(), device.udid)
}

pub fn simulator_state(state: SimulatorState) -> colored::ColoredString {
    match state {
        SimulatorState::Booting => "booting".green(),
        SimulatorState::Shutdown => "shut down".yellow(),
        SimulatorState::AlreadyConnected => "physical device, already connected".cyan(),
    }
}

pub fn generated(scan_id: &str, flows: &[String]) {
    println!(
        "{} {} flows from {scan_id}",
        "Generated".green().bold(),
        flows.len()
    );
    for flow in flows {
        println!("  {flow}");
    }
}

pub fn report(report: &DiscoveryReport) {
    let reached = report.screens.iter().filter(|s| s.is_reached()).count();
    println!(
        "{} {}: {reached}/{} screens reached",
        "Scan complete".green().bold(),
        report.scan_id,
        report.screens.len()
    );
    for screen in report.screens.iter().filter(|s| !s.is_reached()) {
        println!("  {} {}", "unreachable".red(), screen.name);
    }
}

pub fn run_result(result: &TestRunResult) {
    let verdict = if result.passed {
        "PASSED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    let code = result
        .exit_code
        .map_or_else(|| "none".to_string(), |c| c.to_string());
    println!("{verdict} {} (exit code {code})", result.flow);
}

/// Echo what a followed process is doing.
pub fn event(event: &Event, role: ProcessRole) {
    match event {
        Event::ProcessOutput { role: r, text } if *r == role => {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
        Event::History(entry) => eprintln!("{} {}", "›".dimmed(), entry.message.dimmed()),
        Event::TaskChanged(task) => {
            eprintln!("{} task {}: {}", "›".dimmed(), task.status.as_str(), task.title)
        }
        _ => {}
    }
}
