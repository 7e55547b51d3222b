//! Reading back test-run results.
//!
//! Every test run writes its [`TestRunResult`] to `results/test-<ms>.json`
//! on exit. File names sort in run order.

use fd_protocol::TestRunResult;
use std::path::Path;
use tracing::debug;

/// Results listed when the caller does not ask for a number.
pub const RECENT_RESULTS_LIMIT: usize = 20;

/// Up to `limit` results from `results_dir`, newest first.
///
/// A missing directory has no results. Files that cannot be read or parsed
/// are skipped.
pub async fn recent_results(results_dir: &Path, limit: usize) -> Vec<TestRunResult> {
    let mut entries = match tokio::fs::read_dir(results_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %results_dir.display(), error = %e, "No results directory");
            return Vec::new();
        }
    };

    let mut paths = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    paths.reverse();

    let mut results = Vec::new();
    for path in paths.into_iter().take(limit) {
        let parsed = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str::<TestRunResult>(&raw).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match parsed {
            Ok(result) => results.push(result),
            Err(reason) => debug!(path = %path.display(), reason = %reason, "Skipping unreadable result"),
        }
    }
    results
}
