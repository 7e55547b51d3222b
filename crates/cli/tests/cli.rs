//! End-to-end tests for the `flowdeck` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const REPORT_JSON: &str = r#"{
  "scanId": "scan-1700000000000",
  "appId": "com.example.trails",
  "screens": [
    {
      "name": "Trail Map",
      "status": "success",
      "navigatedVia": "drawer",
      "elements": { "textElements": ["Elevation Gain"], "testIds": ["map-view"] }
    },
    {
      "name": "Offline Maps",
      "status": "failed",
      "navigatedVia": "drawer",
      "elements": {}
    }
  ]
}"#;

fn flowdeck(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("flowdeck").expect("Failed to find flowdeck binary");
    cmd.arg("--root").arg(root);
    cmd
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, content).expect("Failed to write file");
}

/// A dashboard root with the given `config.toml`.
fn dashboard(config_toml: &str) -> TempDir {
    let root = tempdir().expect("Failed to create temp dir");
    write(root.path(), ".flowdeck/config.toml", config_toml);
    root
}

#[test]
fn test_help_lists_subcommands() {
    let root = tempdir().expect("Failed to create temp dir");
    flowdeck(root.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("flows"))
        .stdout(predicate::str::contains("synthesize"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("agent"));
}

#[test]
fn test_flows_merges_repository_tree() {
    let repo = tempdir().expect("Failed to create repo");
    write(repo.path(), "maestro/flows/a/x.yaml", "appId: repo\n");
    write(repo.path(), "maestro/flows/b/y.yaml", "appId: repo\n");
    let root = dashboard(&format!("repo_path = {:?}\n", repo.path().display().to_string()));
    write(root.path(), "maestro/flows/a/x.yaml", "appId: local\n");

    let output = flowdeck(root.path())
        .args(["flows", "--json"])
        .output()
        .expect("Failed to run flowdeck");
    assert!(output.status.success());

    let flows: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("flows --json prints JSON");
    let flows = flows.as_array().expect("a JSON array");
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0]["relativePath"], "a/x.yaml");
    assert_eq!(flows[0]["source"], "local");
    assert_eq!(flows[1]["relativePath"], "b/y.yaml");
    assert_eq!(flows[1]["source"], "fallback");

    flowdeck(root.path())
        .arg("flows")
        .assert()
        .success()
        .stdout(predicate::str::contains("a/x.yaml"))
        .stdout(predicate::str::contains("b/y.yaml"));
}

#[test]
fn test_synthesize_without_report_fails() {
    let root = dashboard("");
    flowdeck(root.path())
        .arg("synthesize")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Run a scan first"));
}

#[test]
fn test_synthesize_writes_generated_flows() {
    let root = dashboard("");
    write(
        root.path(),
        "data/discovery/scan-1700000000000_report.json",
        REPORT_JSON,
    );

    flowdeck(root.path())
        .arg("synthesize")
        .assert()
        .success()
        .stdout(predicate::str::contains("generated/drawer-navigation-smoke.yaml"))
        .stdout(predicate::str::contains("generated/verify-trail-map.yaml"))
        .stdout(predicate::str::contains("generated/element-census.yaml"));

    let verify = fs::read_to_string(root.path().join("maestro/flows/generated/verify-trail-map.yaml"))
        .expect("Failed to read generated flow");
    assert!(verify.starts_with("appId: com.example.trails\n"));
    assert!(!root
        .path()
        .join("maestro/flows/generated/verify-offline-maps.yaml")
        .exists());
}

#[test]
fn test_synthesize_explicit_report() {
    let root = dashboard("");
    write(root.path(), "elsewhere/report.json", REPORT_JSON);

    flowdeck(root.path())
        .args(["synthesize", "--report"])
        .arg(root.path().join("elsewhere/report.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("scan-1700000000000"));
}

#[test]
fn test_passing_test_run() {
    let root = dashboard("maestro_bin = \"echo\"\n");
    write(root.path(), "maestro/flows/smoke.yaml", "appId: x\n");

    flowdeck(root.path())
        .args(["test", "smoke.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--format JUNIT"))
        .stdout(predicate::str::contains("PASSED"))
        .stdout(predicate::str::contains("smoke.yaml"));

    let results: Vec<_> = fs::read_dir(root.path().join("maestro/results"))
        .expect("results directory exists")
        .collect();
    assert_eq!(results.len(), 1);

    flowdeck(root.path())
        .arg("results")
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED"))
        .stdout(predicate::str::contains("smoke.yaml"));
}

#[test]
fn test_results_when_none_recorded() {
    let root = dashboard("");
    flowdeck(root.path())
        .arg("results")
        .assert()
        .success()
        .stdout(predicate::str::contains("No test results yet"));
}

#[test]
fn test_failing_test_run() {
    let root = dashboard("maestro_bin = \"false\"\n");

    flowdeck(root.path())
        .args(["test", "auth/login.yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAILED"))
        .stderr(predicate::str::contains("Fix failing test: auth/login.yaml"));
}

#[test]
fn test_record_needs_flow() {
    let root = dashboard("");
    flowdeck(root.path())
        .args(["test", "--record"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--record needs a flow"));
}

#[test]
fn test_agent_runs_script() {
    let root = dashboard("");
    write(root.path(), "agent/run-agent.sh", "echo \"mode=$AGENT_MODE\"\n");

    flowdeck(root.path())
        .args(["agent", "--task-title", "Fix trail map"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mode=specific-task"))
        .stdout(predicate::str::contains("Agent finished"));
}

#[test]
fn test_agent_runtime_limit() {
    let root = dashboard("max_agent_runtime_secs = 1\n");
    write(root.path(), "agent/run-agent.sh", "sleep 30\n");

    flowdeck(root.path())
        .arg("agent")
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .failure()
        .stderr(predicate::str::contains("maximum runtime"));
}

#[test]
fn test_status_summary() {
    let root = dashboard("app_id = \"com.example.trails\"\n");
    write(root.path(), "maestro/flows/smoke.yaml", "appId: x\n");

    flowdeck(root.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("com.example.trails"))
        .stdout(predicate::str::contains("1 local"));
}

#[test]
fn test_invalid_config_is_reported() {
    let root = dashboard("device_mode = \"emulator\"\n");
    flowdeck(root.path())
        .arg("flows")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.toml"));
}
