//! Typed flow documents.
//!
//! A flow document is a two-part YAML file: a header naming the application,
//! a `---` separator, then an ordered list of steps. Documents are built from
//! typed steps and serialized with `serde_yaml`, so any scalar a scan turns
//! up is quoted or escaped as YAML requires.
//!
//! # Example
//!
//! ```
//! use fd_core::flows::document::{FlowDocument, FlowStep, Selector};
//!
//! # fn main() -> Result<(), serde_yaml::Error> {
//! let doc = FlowDocument::new("com.example.app")
//!     .comment("Smoke check")
//!     .step(FlowStep::LaunchApp)
//!     .step(FlowStep::assert_visible(Selector::Text("Welcome".into())));
//!
//! let text = doc.render()?;
//! assert!(text.starts_with("appId: com.example.app\n# Smoke check\n---\n"));
//! # Ok(())
//! # }
//! ```

use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};

/// How a step picks its target element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Match on visible text.
    Text(String),

    /// Match on the element's test identifier.
    Id(String),

    /// A screen coordinate, e.g. `"92%,6%"`.
    Point(String),
}

impl Selector {
    fn key(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Id(_) => "id",
            Self::Point(_) => "point",
        }
    }

    fn value(&self) -> &str {
        match self {
            Self::Text(v) | Self::Id(v) | Self::Point(v) => v,
        }
    }
}

/// One entry in a flow's step list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStep {
    LaunchApp,
    WaitForAnimationToEnd,
    TapOn { selector: Selector, optional: bool },
    AssertVisible { selector: Selector, optional: bool },
    TakeScreenshot(String),

    /// A blank line followed by a comment, used to label a group of steps.
    /// Rendered by the document, not serialized as a step.
    Section(String),
}

impl FlowStep {
    /// A tap that fails the flow if the target is missing.
    pub fn tap(selector: Selector) -> Self {
        Self::TapOn { selector, optional: false }
    }

    /// A tap that is skipped if the target is missing.
    pub fn tap_optional(selector: Selector) -> Self {
        Self::TapOn { selector, optional: true }
    }

    /// A visibility check that never fails the flow.
    pub fn assert_visible(selector: Selector) -> Self {
        Self::AssertVisible { selector, optional: true }
    }
}

/// `{ <command>: <body> }`, the shape of every step that takes arguments.
fn command<S, T>(serializer: S, name: &str, body: &T) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(name, body)?;
    map.end()
}

/// Selector plus the `optional` flag, as one mapping.
struct Target<'a> {
    selector: &'a Selector,
    optional: bool,
}

impl Serialize for Target<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(self.selector.key(), self.selector.value())?;
        if self.optional {
            map.serialize_entry("optional", &true)?;
        }
        map.end()
    }
}

impl Serialize for FlowStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::LaunchApp => serializer.serialize_str("launchApp"),
            Self::WaitForAnimationToEnd => serializer.serialize_str("waitForAnimationToEnd"),
            Self::TapOn { selector, optional } => command(
                serializer,
                "tapOn",
                &Target { selector, optional: *optional },
            ),
            Self::AssertVisible { selector, optional } => command(
                serializer,
                "assertVisible",
                &Target { selector, optional: *optional },
            ),
            Self::TakeScreenshot(path) => command(serializer, "takeScreenshot", path),
            Self::Section(_) => Err(S::Error::custom("a section comment is not a flow step")),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Header<'a> {
    app_id: &'a str,
}

/// Comments are single-line.
fn comment_text(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// A flow document under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDocument {
    app_id: String,
    header_comments: Vec<String>,
    steps: Vec<FlowStep>,
}

impl FlowDocument {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            header_comments: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Append a header comment line.
    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.header_comments.push(text.into());
        self
    }

    /// Append a step.
    pub fn step(mut self, step: FlowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = FlowStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn step_list(&self) -> &[FlowStep] {
        &self.steps
    }

    /// Render the document to its YAML text.
    ///
    /// Steps between section comments are serialized as one sequence each;
    /// the comments sit between them.
    ///
    /// # Errors
    ///
    /// Returns the `serde_yaml` error if a part cannot be serialized.
    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        let mut out = serde_yaml::to_string(&Header { app_id: &self.app_id })?;
        for line in &self.header_comments {
            out.push_str("# ");
            out.push_str(&comment_text(line));
            out.push('\n');
        }
        out.push_str("---\n");

        let mut run: Vec<&FlowStep> = Vec::new();
        for step in &self.steps {
            if let FlowStep::Section(text) = step {
                flush_steps(&mut out, &mut run)?;
                out.push_str("\n# ");
                out.push_str(&comment_text(text));
                out.push('\n');
            } else {
                run.push(step);
            }
        }
        flush_steps(&mut out, &mut run)?;
        Ok(out)
    }
}

fn flush_steps(out: &mut String, run: &mut Vec<&FlowStep>) -> Result<(), serde_yaml::Error> {
    if !run.is_empty() {
        out.push_str(&serde_yaml::to_string(run.as_slice())?);
        run.clear();
    }
    Ok(())
}
