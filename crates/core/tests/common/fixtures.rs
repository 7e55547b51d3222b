//! Test fixtures for supervisors, flow trees and discovery reports.

use fd_core::board::TaskBoard;
use fd_core::supervisor::{LaunchSpec, Supervisor, SupervisorSettings};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A supervisor over a fresh, shared board.
#[allow(dead_code)]
pub fn new_supervisor(auto_create_fix_tasks: bool) -> (Supervisor, Arc<Mutex<TaskBoard>>) {
    let board = Arc::new(Mutex::new(TaskBoard::new()));
    let settings = SupervisorSettings {
        auto_create_fix_tasks,
        max_agent_runtime: Duration::from_secs(3600),
    };
    (Supervisor::new(settings, board.clone()), board)
}

/// Launch spec running `script` under `sh -c`.
#[allow(dead_code)]
pub fn sh(script: &str) -> LaunchSpec {
    LaunchSpec::new("sh").args(["-c", script])
}

/// Write an empty flow document at `relative` under `root`.
#[allow(dead_code)]
pub fn write_flow(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create flow dir");
    }
    std::fs::write(path, content).expect("Failed to write flow");
}

/// A discovery report as the scanner writes it.
#[allow(dead_code)]
pub const TRAIL_REPORT_JSON: &str = r#"{
  "scanId": "scan-1700000000000",
  "appId": "com.example.trails",
  "timestamp": "2026-01-01T10:00:00Z",
  "summary": { "totalScreens": 4, "successful": 3, "failed": 1, "totalElements": 42 },
  "screens": [
    {
      "name": "Home",
      "status": "success",
      "navigatedVia": "direct",
      "elements": {
        "totalElements": 12,
        "textElements": ["Good morning", "Nearby trails"],
        "testIds": ["home-feed"],
        "buttons": [{ "text": "Start Hike", "testId": "start-hike", "enabled": true, "class": "Button" }],
        "inputFields": []
      }
    },
    {
      "name": "Trail Map",
      "status": "success",
      "navigatedVia": "drawer",
      "elements": {
        "textElements": ["Elevation Gain"],
        "testIds": ["map-view"],
        "buttons": []
      },
      "screenshot": "scan-1700000000000/trail-map.png"
    },
    {
      "name": "Settings & Privacy",
      "status": "success",
      "navigatedVia": "drawer",
      "elements": {
        "textElements": ["Units", "Account"],
        "buttons": [{ "text": "Sign out" }],
        "extraField": "ignored"
      }
    },
    {
      "name": "Offline Maps",
      "status": "failed",
      "navigatedVia": "drawer",
      "elements": { "testIds": ["offline-list"] }
    }
  ]
}"#;
