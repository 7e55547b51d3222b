//! Compiles a discovery report into flow documents.
//!
//! Generation is pure: the same report and app id always produce the same
//! documents in the same order. Every assertion is optional, since discovery
//! data goes stale as the UI changes between scans.

use crate::flows::document::{FlowDocument, FlowStep, Selector};
use fd_protocol::{DiscoveryReport, ScreenRecord};
use std::collections::HashSet;

/// Screen coordinate of the navigation-drawer toggle.
pub const DRAWER_TOGGLE_POINT: &str = "92%,6%";

pub const SMOKE_FILE: &str = "drawer-navigation-smoke.yaml";
pub const CENSUS_FILE: &str = "element-census.yaml";

const VERIFY_TEXT_LIMIT: usize = 5;
const VERIFY_ID_LIMIT: usize = 10;
const VERIFY_BUTTON_LIMIT: usize = 5;

/// A document ready to be written, named relative to the generated directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFlow {
    pub file_name: String,
    pub document: FlowDocument,
}

/// Build every document for `report`.
///
/// Order: the drawer smoke test, one verification document per reached
/// screen, then the element census. Families with nothing to check are
/// skipped.
pub fn generate(report: &DiscoveryReport, app_id: &str) -> Vec<GeneratedFlow> {
    let mut flows = Vec::new();

    if let Some(smoke) = smoke_test(report, app_id) {
        flows.push(GeneratedFlow {
            file_name: SMOKE_FILE.to_string(),
            document: smoke,
        });
    }

    for (index, screen) in report.screens.iter().enumerate() {
        if !screen.is_reached() {
            continue;
        }
        flows.push(GeneratedFlow {
            file_name: verify_file_name(screen, index),
            document: verification(report, screen, app_id),
        });
    }

    if let Some(census) = element_census(report, app_id) {
        flows.push(GeneratedFlow {
            file_name: CENSUS_FILE.to_string(),
            document: census,
        });
    }

    flows
}

/// Lower-case, with every run of non-alphanumerics collapsed to one `-` and
/// no leading or trailing `-`.
///
/// ```
/// use fd_core::synthesis::generator::slugify;
///
/// assert_eq!(slugify("Trail Map"), "trail-map");
/// assert_eq!(slugify("  Settings & Privacy!! "), "settings-privacy");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn verify_file_name(screen: &ScreenRecord, index: usize) -> String {
    let slug = slugify(&screen.name);
    if slug.is_empty() {
        format!("verify-screen-{index}.yaml")
    } else {
        format!("verify-{slug}.yaml")
    }
}

/// Open the drawer, then tap the screen's entry by name.
fn drawer_navigation(screen: &ScreenRecord) -> [FlowStep; 4] {
    [
        FlowStep::tap(Selector::Point(DRAWER_TOGGLE_POINT.to_string())),
        FlowStep::WaitForAnimationToEnd,
        FlowStep::tap_optional(Selector::Text(screen.name.clone())),
        FlowStep::WaitForAnimationToEnd,
    ]
}

fn launch() -> [FlowStep; 2] {
    [FlowStep::LaunchApp, FlowStep::WaitForAnimationToEnd]
}

fn char_len_within(text: &str, min_exclusive: usize, max_exclusive: usize) -> bool {
    let len = text.chars().count();
    len > min_exclusive && len < max_exclusive
}

fn smoke_test(report: &DiscoveryReport, app_id: &str) -> Option<FlowDocument> {
    let screens: Vec<&ScreenRecord> = report
        .screens
        .iter()
        .filter(|s| s.is_reached() && s.is_drawer_reachable())
        .collect();
    if screens.is_empty() {
        return None;
    }

    let mut doc = FlowDocument::new(app_id)
        .comment("Auto-generated drawer navigation smoke test")
        .comment("Visits every discovered screen via the drawer")
        .comment(format!("Generated from scan: {}", report.scan_id))
        .steps(launch());

    for screen in screens {
        doc = doc
            .step(FlowStep::Section(format!("Navigate to: {}", screen.name)))
            .steps(drawer_navigation(screen));

        let landmark = screen
            .elements
            .text_elements
            .iter()
            .find(|t| char_len_within(t, 3, 40));
        if let Some(text) = landmark {
            doc = doc.step(FlowStep::assert_visible(Selector::Text(text.clone())));
        }
    }

    Some(doc)
}

fn verification(report: &DiscoveryReport, screen: &ScreenRecord, app_id: &str) -> FlowDocument {
    let mut doc = FlowDocument::new(app_id)
        .comment(format!("Auto-generated verification for: {}", screen.name))
        .comment(format!("Generated from scan: {}", report.scan_id))
        .steps(launch());

    if screen.is_drawer_reachable() {
        doc = doc.steps(drawer_navigation(screen));
    }

    let elements = &screen.elements;
    let texts = elements
        .text_elements
        .iter()
        .take(VERIFY_TEXT_LIMIT)
        .filter(|t| char_len_within(t, 2, 60))
        .map(|t| FlowStep::assert_visible(Selector::Text(t.clone())));
    let ids = elements
        .test_ids
        .iter()
        .take(VERIFY_ID_LIMIT)
        .map(|id| FlowStep::assert_visible(Selector::Id(id.clone())));
    let buttons = elements
        .buttons
        .iter()
        .take(VERIFY_BUTTON_LIMIT)
        .filter_map(|b| b.text.as_ref())
        .filter(|t| char_len_within(t, 1, 40))
        .map(|t| FlowStep::assert_visible(Selector::Text(t.clone())));

    doc.steps(texts).steps(ids).steps(buttons)
}

fn element_census(report: &DiscoveryReport, app_id: &str) -> Option<FlowDocument> {
    let known_ids: HashSet<&str> = report
        .screens
        .iter()
        .flat_map(|s| s.elements.test_ids.iter().map(String::as_str))
        .collect();
    if known_ids.is_empty() {
        return None;
    }

    let mut doc = FlowDocument::new(app_id)
        .comment("Auto-generated element census")
        .comment("Verifies all discovered testIDs still exist")
        .comment(format!("Generated from scan: {}", report.scan_id))
        .steps(launch());

    for screen in report
        .screens
        .iter()
        .filter(|s| s.is_reached() && !s.elements.test_ids.is_empty())
    {
        doc = doc.step(FlowStep::Section(format!("Screen: {}", screen.name)));
        if screen.is_drawer_reachable() {
            doc = doc.steps(drawer_navigation(screen));
        }
        doc = doc.steps(
            screen
                .elements
                .test_ids
                .iter()
                .map(|id| FlowStep::assert_visible(Selector::Id(id.clone()))),
        );
    }

    Some(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fd_protocol::{ButtonElement, ElementInventory, NavigationMethod, ReachStatus};

    fn screen(name: &str, status: ReachStatus, via: NavigationMethod) -> ScreenRecord {
        ScreenRecord {
            name: name.to_string(),
            status,
            navigated_via: via,
            elements: ElementInventory::default(),
            screenshot: None,
        }
    }

    fn report(screens: Vec<ScreenRecord>) -> DiscoveryReport {
        DiscoveryReport {
            scan_id: "scan-1".to_string(),
            app_id: None,
            timestamp: None,
            summary: None,
            screens,
        }
    }

    fn button(text: &str) -> ButtonElement {
        ButtonElement {
            text: Some(text.to_string()),
            enabled: true,
            ..Default::default()
        }
    }

    fn assertions(doc: &FlowDocument) -> Vec<Selector> {
        doc.step_list()
            .iter()
            .filter_map(|step| match step {
                FlowStep::AssertVisible { selector, optional } => {
                    assert!(*optional, "assertions are always optional");
                    Some(selector.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Trail Map"), "trail-map");
        assert_eq!(slugify("--Hello__World--"), "hello-world");
        assert_eq!(slugify("Profile (v2)"), "profile-v2");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_trail_map_example() {
        let mut trail = screen("Trail Map", ReachStatus::Success, NavigationMethod::Drawer);
        trail.elements.text_elements = vec!["Elevation Gain".to_string()];
        trail.elements.test_ids = vec!["map-view".to_string()];

        let flows = generate(&report(vec![trail]), "com.example.trails");
        let names: Vec<&str> = flows.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["drawer-navigation-smoke.yaml", "verify-trail-map.yaml", "element-census.yaml"]
        );

        let smoke = &flows[0].document;
        insta::assert_debug_snapshot!(smoke.step_list(), @r###"
        [
            LaunchApp,
            WaitForAnimationToEnd,
            Section(
                "Navigate to: Trail Map",
            ),
            TapOn {
                selector: Point(
                    "92%,6%",
                ),
                optional: false,
            },
            WaitForAnimationToEnd,
            TapOn {
                selector: Text(
                    "Trail Map",
                ),
                optional: true,
            },
            WaitForAnimationToEnd,
            AssertVisible {
                selector: Text(
                    "Elevation Gain",
                ),
                optional: true,
            },
        ]
        "###);
        assert_eq!(
            assertions(smoke),
            vec![Selector::Text("Elevation Gain".to_string())]
        );

        assert_eq!(
            assertions(&flows[1].document),
            vec![
                Selector::Text("Elevation Gain".to_string()),
                Selector::Id("map-view".to_string()),
            ]
        );
    }

    #[test]
    fn test_smoke_only_drawer_screens() {
        let home = screen("Home", ReachStatus::Success, NavigationMethod::Direct);
        let broken = screen("Broken", ReachStatus::Failed, NavigationMethod::Drawer);
        let flows = generate(&report(vec![home, broken]), "app");

        let names: Vec<&str> = flows.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["verify-home.yaml"]);
    }

    #[test]
    fn test_smoke_landmark_length_bounds() {
        let mut s = screen("Map", ReachStatus::Success, NavigationMethod::Drawer);
        s.elements.text_elements = vec![
            "Hey".to_string(),
            "x".repeat(40),
            "Nearby".to_string(),
            "Later".to_string(),
        ];
        let flows = generate(&report(vec![s]), "app");
        assert_eq!(
            assertions(&flows[0].document),
            vec![Selector::Text("Nearby".to_string())]
        );
    }

    #[test]
    fn test_verification_limits_and_bounds() {
        let mut s = screen("Settings", ReachStatus::Success, NavigationMethod::Direct);
        s.elements.text_elements = vec![
            "ok".to_string(),
            "Account".to_string(),
            "y".repeat(60),
            "Privacy".to_string(),
            "Units".to_string(),
            "Sixth is dropped".to_string(),
        ];
        s.elements.test_ids = (0..12).map(|i| format!("id-{i}")).collect();
        s.elements.buttons = vec![
            button("X"),
            button("Save"),
            ButtonElement::default(),
            button("Cancel"),
            button("Reset"),
            button("Sixth"),
        ];

        let flows = generate(&report(vec![s]), "app");
        let doc = &flows[0].document;
        assert!(!doc
            .step_list()
            .iter()
            .any(|step| matches!(step, FlowStep::TapOn { .. })));

        let selectors = assertions(doc);
        let texts: Vec<&Selector> = selectors
            .iter()
            .filter(|s| matches!(s, Selector::Text(_)))
            .collect();
        let ids = selectors
            .iter()
            .filter(|s| matches!(s, Selector::Id(_)))
            .count();

        assert_eq!(
            texts,
            vec![
                &Selector::Text("Account".to_string()),
                &Selector::Text("Privacy".to_string()),
                &Selector::Text("Units".to_string()),
                &Selector::Text("Save".to_string()),
                &Selector::Text("Cancel".to_string()),
                &Selector::Text("Reset".to_string()),
            ]
        );
        assert_eq!(ids, 10);
    }

    #[test]
    fn test_census_covers_reached_screens_with_ids() {
        let mut home = screen("Home", ReachStatus::Success, NavigationMethod::Direct);
        home.elements.test_ids = vec!["home-feed".to_string()];
        let mut map = screen("Map", ReachStatus::Success, NavigationMethod::Drawer);
        map.elements.test_ids = vec!["map-view".to_string(), "map-legend".to_string()];
        let empty = screen("About", ReachStatus::Success, NavigationMethod::Drawer);

        let flows = generate(&report(vec![home, map, empty]), "app");
        let census = flows
            .iter()
            .find(|f| f.file_name == CENSUS_FILE)
            .expect("census generated");

        let sections: Vec<&FlowStep> = census
            .document
            .step_list()
            .iter()
            .filter(|s| matches!(s, FlowStep::Section(_)))
            .collect();
        assert_eq!(
            sections,
            vec![
                &FlowStep::Section("Screen: Home".to_string()),
                &FlowStep::Section("Screen: Map".to_string()),
            ]
        );
        assert_eq!(assertions(&census.document).len(), 3);
    }

    #[test]
    fn test_no_ids_no_census() {
        let s = screen("Home", ReachStatus::Success, NavigationMethod::Direct);
        let flows = generate(&report(vec![s]), "app");
        assert!(flows.iter().all(|f| f.file_name != CENSUS_FILE));
    }

    #[test]
    fn test_unsluggable_name_uses_index() {
        let s = screen("???", ReachStatus::Success, NavigationMethod::Direct);
        let flows = generate(&report(vec![s]), "app");
        assert_eq!(flows[0].file_name, "verify-screen-0.yaml");
    }

    #[test]
    fn test_generation_is_deterministic() {
        let mut s = screen("Trail Map", ReachStatus::Success, NavigationMethod::Drawer);
        s.elements.test_ids = vec!["map-view".to_string()];
        let r = report(vec![s]);
        assert_eq!(generate(&r, "app"), generate(&r, "app"));
    }
}
