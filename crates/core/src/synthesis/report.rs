//! Loading discovery reports from disk.

use crate::synthesis::error::{SynthesisError, SynthesisResult};
use fd_protocol::DiscoveryReport;
use std::path::{Path, PathBuf};

/// File-name suffix the scanner uses for reports.
pub const REPORT_SUFFIX: &str = "_report.json";

/// Load and parse the report at `path`.
///
/// # Errors
///
/// - `ReportNotFound` if the file does not exist
/// - `ReportUnreadable` if it cannot be read or is not a valid report
pub async fn load_report(path: &Path) -> SynthesisResult<DiscoveryReport> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SynthesisError::ReportNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(SynthesisError::ReportUnreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };

    serde_json::from_str(&content).map_err(|e| SynthesisError::ReportUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Report files in `discovery_dir`, newest first.
///
/// Scan ids embed a millisecond timestamp, so reverse name order is
/// newest-first. A missing directory has no reports.
pub fn report_paths(discovery_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(discovery_dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(REPORT_SUFFIX))
        })
        .collect();
    paths.sort();
    paths.reverse();
    paths
}

/// Load the newest report in `discovery_dir`.
///
/// # Errors
///
/// `ReportNotFound` if the directory holds no report, otherwise the errors
/// of [`load_report`].
pub async fn latest_report(discovery_dir: &Path) -> SynthesisResult<DiscoveryReport> {
    let newest = report_paths(discovery_dir)
        .into_iter()
        .next()
        .ok_or_else(|| SynthesisError::ReportNotFound {
            path: discovery_dir.to_path_buf(),
        })?;
    load_report(&newest).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_report_missing() {
        let dir = tempdir().expect("Failed to create temp dir");
        let result = load_report(&dir.path().join("scan-1_report.json")).await;

        if let Err(SynthesisError::ReportNotFound { path }) = result {
            assert!(path.ends_with("scan-1_report.json"));
        } else {
            panic!("Expected ReportNotFound");
        }
    }

    #[tokio::test]
    async fn test_load_report_corrupt() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("scan-1_report.json");
        std::fs::write(&path, "{ not json").expect("Failed to write report");

        let result = load_report(&path).await;
        assert!(matches!(result, Err(SynthesisError::ReportUnreadable { .. })));
    }

    #[tokio::test]
    async fn test_latest_report_picks_newest() {
        let dir = tempdir().expect("Failed to create temp dir");
        for id in ["scan-1700000000000", "scan-1700000500000"] {
            std::fs::write(
                dir.path().join(format!("{id}_report.json")),
                format!(r#"{{"scanId": "{id}", "screens": []}}"#),
            )
            .expect("Failed to write report");
        }
        std::fs::write(dir.path().join("notes.json"), "{}").expect("Failed to write file");

        let report = latest_report(dir.path()).await.expect("Failed to load latest");
        assert_eq!(report.scan_id, "scan-1700000500000");
        assert_eq!(report_paths(dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn test_latest_report_empty_dir() {
        let dir = tempdir().expect("Failed to create temp dir");
        let result = latest_report(&dir.path().join("discovery")).await;
        assert!(matches!(result, Err(SynthesisError::ReportNotFound { .. })));
    }
}
