use serde::Serialize;

/// The fixed accessibility profile catalog. Read-only at runtime; the
/// widget renders one card per entry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProfileDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<&'static [&'static str]>,
}

const PROFILE_CATALOG: [ProfileDefinition; 5] = [
    ProfileDefinition {
        id: "standard",
        name: "Standard UI",
        description: "Default interface without modifications",
        features: None,
    },
    ProfileDefinition {
        id: "dyslexia",
        name: "Dyslexia Support",
        description: "Enhanced readability with adjusted spacing and fonts",
        features: Some(&["increased-spacing", "larger-text", "dyslexia-font-option"]),
    },
    ProfileDefinition {
        id: "adhd",
        name: "ADHD Focus",
        description: "Reduced distractions with focus enhancements",
        features: Some(&["focus-mode", "tooltips", "highlighted-terms"]),
    },
    ProfileDefinition {
        id: "low-vision",
        name: "Low Vision Support",
        description: "High contrast and larger text for better visibility",
        features: Some(&["high-contrast", "zoom", "simplified-layout"]),
    },
    ProfileDefinition {
        id: "motor-impairment",
        name: "Motor Impairment",
        description: "Larger click targets and keyboard navigation",
        features: Some(&["large-targets", "keyboard-nav", "reduced-motion"]),
    },
];

pub fn profile_catalog() -> &'static [ProfileDefinition] {
    &PROFILE_CATALOG
}
