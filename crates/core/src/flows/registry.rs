//! Flow catalog built from two overlapping directory trees.
//!
//! The local tree always wins: a fallback document whose relative path
//! matches a local one is never listed, even if its content differs.

use crate::config::models::AppConfig;
use fd_protocol::{FlowDescriptor, FlowSource};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Extensions recognized as flow documents.
const FLOW_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Category for documents sitting directly under a tree root.
const ROOT_CATEGORY: &str = "root";

/// Lists and resolves flow documents.
///
/// # Example
///
/// ```rust,no_run
/// use fd_core::flows::registry::FlowRegistry;
///
/// let registry = FlowRegistry::new("maestro/flows", Some("../app/maestro/flows".into()));
/// for flow in registry.list_flows() {
///     println!("{} ({:?})", flow.relative_path, flow.source);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FlowRegistry {
    local_root: PathBuf,
    fallback_root: Option<PathBuf>,
}

impl FlowRegistry {
    pub fn new(local_root: impl Into<PathBuf>, fallback_root: Option<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            fallback_root,
        }
    }

    /// Registry over the configured local and fallback trees.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.layout.flows_dir.clone(), config.fallback_flows_dir())
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn fallback_root(&self) -> Option<&Path> {
        self.fallback_root.as_deref()
    }

    /// List every flow document, local entries first.
    ///
    /// Missing directories contribute nothing. Within a tree, entries are
    /// ordered by walking directories in file-name order.
    pub fn list_flows(&self) -> Vec<FlowDescriptor> {
        let mut catalog = Catalog::default();
        catalog.walk(&self.local_root, FlowSource::Local);
        if let Some(fallback) = &self.fallback_root {
            catalog.walk(fallback, FlowSource::Fallback);
        }
        catalog.entries
    }

    /// On-disk path of the document at `relative`, local tree first.
    ///
    /// Returns `None` if neither tree has the file, or if `relative` tries to
    /// leave the tree.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }

        std::iter::once(self.local_root.as_path())
            .chain(self.fallback_root.as_deref())
            .map(|root| root.join(relative))
            .find(|candidate| candidate.is_file())
    }
}

/// Ordered catalog with insert-if-absent semantics.
#[derive(Default)]
struct Catalog {
    entries: Vec<FlowDescriptor>,
    seen: HashSet<String>,
}

impl Catalog {
    fn walk(&mut self, root: &Path, source: FlowSource) {
        if !root.is_dir() {
            return;
        }

        let files = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && is_flow_document(entry.path()));

        for entry in files {
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let key = relative_key(relative);
            if !self.seen.insert(key.clone()) {
                continue;
            }

            self.entries.push(FlowDescriptor {
                name: display_name(relative),
                category: category_of(relative),
                path: entry.path().to_path_buf(),
                relative_path: key,
                source,
            });
        }
    }
}

fn is_flow_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FLOW_EXTENSIONS.contains(&ext))
}

/// `/`-joined relative path, independent of the host separator.
fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn category_of(relative: &Path) -> String {
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => first.as_os_str().to_string_lossy().into_owned(),
        _ => ROOT_CATEGORY.to_string(),
    }
}

/// `auth/login-happy-path.yaml` becomes `[auth] login happy path`.
fn display_name(relative: &Path) -> String {
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().replace('-', " "))
        .unwrap_or_default();
    match relative.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => format!("[{}] {}", relative_key(dir), stem),
        None => stem,
    }
}
