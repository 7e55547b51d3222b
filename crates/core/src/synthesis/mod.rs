//! Test Synthesis Engine.
//!
//! Turns a discovery report into flow documents under the local flow tree's
//! `generated/` directory. Regeneration overwrites documents of the same
//! name. Each document is written whole through a temporary file, so readers
//! never observe a partial document.

pub mod error;
pub mod generator;
pub mod report;

pub use error::{SynthesisError, SynthesisResult};
pub use generator::{generate, slugify, GeneratedFlow};
pub use report::{latest_report, load_report, report_paths};

use crate::config::models::{AppConfig, GENERATED_SUBDIR};
use fd_protocol::DiscoveryReport;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes generated flows into one directory.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    output_dir: PathBuf,
    default_app_id: String,
}

impl Synthesizer {
    /// # Arguments
    ///
    /// * `output_dir` - Directory generated documents are written to
    /// * `default_app_id` - App id used when the report does not name one
    pub fn new(output_dir: impl Into<PathBuf>, default_app_id: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            default_app_id: default_app_id.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.layout.generated_flows_dir.clone(),
            config.settings.app_id.clone(),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Generate and write every document for `report`.
    ///
    /// # Returns
    ///
    /// Written document names relative to the local flow tree, e.g.
    /// `generated/verify-trail-map.yaml`, in generation order. A name that
    /// is generated twice is listed once; the later document wins on disk.
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError::Write` if the output directory or a document
    /// cannot be written.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use fd_core::synthesis::{latest_report, Synthesizer};
    /// use std::path::Path;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let report = latest_report(Path::new("data/discovery")).await?;
    /// let synthesizer = Synthesizer::new("maestro/flows/generated", "com.example.app");
    /// for name in synthesizer.synthesize(&report)? {
    ///     println!("wrote {name}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn synthesize(&self, report: &DiscoveryReport) -> SynthesisResult<Vec<String>> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| SynthesisError::Write {
            path: self.output_dir.clone(),
            source,
        })?;

        let app_id = report
            .app_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.default_app_id);

        let mut names: Vec<String> = Vec::new();
        for flow in generate(report, app_id) {
            let content = flow
                .document
                .render()
                .map_err(|source| SynthesisError::Render {
                    name: flow.file_name.clone(),
                    source,
                })?;
            let path = self.output_dir.join(&flow.file_name);
            write_atomically(&path, &content)?;

            let name = format!("{}/{}", GENERATED_SUBDIR, flow.file_name);
            if !names.contains(&name) {
                names.push(name);
            }
        }

        info!(
            scan_id = %report.scan_id,
            count = names.len(),
            dir = %self.output_dir.display(),
            "Generated test flows"
        );
        Ok(names)
    }
}

fn write_atomically(path: &Path, content: &str) -> SynthesisResult<()> {
    let to_write_error = |source: std::io::Error| SynthesisError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(to_write_error)?;
    tmp.write_all(content.as_bytes()).map_err(to_write_error)?;
    tmp.persist(path).map_err(|e| to_write_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fd_protocol::{ElementInventory, NavigationMethod, ReachStatus, ScreenRecord};
    use tempfile::tempdir;

    fn trail_report(app_id: Option<&str>) -> DiscoveryReport {
        DiscoveryReport {
            scan_id: "scan-1700000000000".to_string(),
            app_id: app_id.map(str::to_string),
            timestamp: None,
            summary: None,
            screens: vec![ScreenRecord {
                name: "Trail Map".to_string(),
                status: ReachStatus::Success,
                navigated_via: NavigationMethod::Drawer,
                elements: ElementInventory {
                    text_elements: vec!["Elevation Gain".to_string()],
                    test_ids: vec!["map-view".to_string()],
                    ..Default::default()
                },
                screenshot: None,
            }],
        }
    }

    #[test]
    fn test_synthesize_writes_documents() {
        let dir = tempdir().expect("Failed to create temp dir");
        let out = dir.path().join("flows/generated");
        let synthesizer = Synthesizer::new(&out, "com.example.fallback");

        let names = synthesizer
            .synthesize(&trail_report(Some("com.example.trails")))
            .expect("Failed to synthesize");

        assert_eq!(
            names,
            vec![
                "generated/drawer-navigation-smoke.yaml",
                "generated/verify-trail-map.yaml",
                "generated/element-census.yaml",
            ]
        );

        let verify = std::fs::read_to_string(out.join("verify-trail-map.yaml"))
            .expect("Failed to read verification flow");
        let (header, steps) = verify
            .split_once("---\n")
            .expect("document has a separator");
        assert_eq!(
            header,
            "appId: com.example.trails\n\
             # Auto-generated verification for: Trail Map\n\
             # Generated from scan: scan-1700000000000\n"
        );

        let steps: serde_yaml::Value = serde_yaml::from_str(steps).expect("Failed to parse steps");
        let expected: serde_yaml::Value = serde_yaml::from_str(
            r#"
- launchApp
- waitForAnimationToEnd
- tapOn:
    point: "92%,6%"
- waitForAnimationToEnd
- tapOn:
    text: "Trail Map"
    optional: true
- waitForAnimationToEnd
- assertVisible:
    text: "Elevation Gain"
    optional: true
- assertVisible:
    id: "map-view"
    optional: true
"#,
        )
        .expect("Failed to parse expected steps");
        assert_eq!(steps, expected);
    }

    #[test]
    fn test_synthesize_falls_back_to_configured_app_id() {
        let dir = tempdir().expect("Failed to create temp dir");
        let synthesizer = Synthesizer::new(dir.path(), "com.example.fallback");

        synthesizer
            .synthesize(&trail_report(None))
            .expect("Failed to synthesize");

        let smoke = std::fs::read_to_string(dir.path().join("drawer-navigation-smoke.yaml"))
            .expect("Failed to read smoke flow");
        assert!(smoke.starts_with("appId: com.example.fallback\n"));
    }

    #[test]
    fn test_regeneration_overwrites() {
        let dir = tempdir().expect("Failed to create temp dir");
        let synthesizer = Synthesizer::new(dir.path(), "app");
        let path = dir.path().join("verify-trail-map.yaml");
        std::fs::write(&path, "stale").expect("Failed to write stale file");

        synthesizer
            .synthesize(&trail_report(None))
            .expect("Failed to synthesize");
        let first = std::fs::read_to_string(&path).expect("Failed to read flow");
        synthesizer
            .synthesize(&trail_report(None))
            .expect("Failed to synthesize");
        let second = std::fs::read_to_string(&path).expect("Failed to read flow");

        assert_ne!(first, "stale");
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_slugs_listed_once() {
        let dir = tempdir().expect("Failed to create temp dir");
        let mut report = trail_report(None);
        let mut twin = report.screens[0].clone();
        twin.name = "trail map".to_string();
        twin.navigated_via = NavigationMethod::Direct;
        report.screens.push(twin);

        let names = Synthesizer::new(dir.path(), "app")
            .synthesize(&report)
            .expect("Failed to synthesize");
        let verify_count = names
            .iter()
            .filter(|n| n.as_str() == "generated/verify-trail-map.yaml")
            .count();
        assert_eq!(verify_count, 1);

        let content = std::fs::read_to_string(dir.path().join("verify-trail-map.yaml"))
            .expect("Failed to read flow");
        assert!(content.contains("verification for: trail map"));
    }

    #[test]
    fn test_synthesize_unwritable_output() {
        let dir = tempdir().expect("Failed to create temp dir");
        let blocker = dir.path().join("generated");
        std::fs::write(&blocker, "not a directory").expect("Failed to write file");

        let result = Synthesizer::new(&blocker, "app").synthesize(&trail_report(None));
        assert!(matches!(result, Err(SynthesisError::Write { .. })));
    }
}
