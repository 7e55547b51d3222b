//! Structured markers embedded in child-process output.
//!
//! Child processes report progress by printing lines containing one of a
//! few bracketed tags. Everything after the tag, trimmed, is the payload.
//!
//! ```text
//! [TASK_COMPLETE] Fixed trail map crash
//! [TASK_FAILED] Could not reproduce
//! [TEST_RESULT] {"flow": "smoke.yaml", "passed": true}
//! ```

use serde_json::Value;

const TASK_COMPLETE: &str = "[TASK_COMPLETE]";
const TASK_FAILED: &str = "[TASK_FAILED]";
const TEST_RESULT: &str = "[TEST_RESULT]";

#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    TaskComplete(String),
    TaskFailed(String),
    TestResult(Value),
}

/// Every marker in `line`, in tag order.
///
/// A `[TEST_RESULT]` payload that is not valid JSON yields nothing.
pub fn scan_line(line: &str) -> Vec<Marker> {
    let mut markers = Vec::new();

    if let Some(text) = payload_after(line, TASK_COMPLETE) {
        markers.push(Marker::TaskComplete(text.to_string()));
    }
    if let Some(text) = payload_after(line, TASK_FAILED) {
        markers.push(Marker::TaskFailed(text.to_string()));
    }
    if let Some(text) = payload_after(line, TEST_RESULT) {
        match serde_json::from_str(text) {
            Ok(value) => markers.push(Marker::TestResult(value)),
            Err(e) => tracing::debug!(error = %e, "Ignoring malformed test result marker"),
        }
    }

    markers
}

fn payload_after<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.find(tag).map(|idx| line[idx + tag.len()..].trim())
}
