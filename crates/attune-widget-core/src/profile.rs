use serde::{Deserialize, Serialize};

/// The accessibility profiles the widget can apply. Each maps to a
/// fixed set of body-level marker classes the stylesheet keys off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileId {
    Standard,
    Dyslexia,
    Adhd,
    LowVision,
    MotorImpairment,
}

/// Every marker class any profile can place on the body. Activation
/// removes all of these before applying the new profile's set, which
/// keeps class application idempotent.
pub const MARKER_CLASSES: [&str; 6] = [
    "attune-dyslexia",
    "attune-adhd",
    "attune-low-vision",
    "attune-motor-impairment",
    "attune-high-contrast",
    "attune-reduced-motion",
];

const CLASSES_STANDARD: [&str; 0] = [];
const CLASSES_DYSLEXIA: [&str; 1] = ["attune-dyslexia"];
const CLASSES_ADHD: [&str; 1] = ["attune-adhd"];
const CLASSES_LOW_VISION: [&str; 2] = ["attune-low-vision", "attune-high-contrast"];
const CLASSES_MOTOR_IMPAIRMENT: [&str; 2] = ["attune-motor-impairment", "attune-reduced-motion"];

impl ProfileId {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Dyslexia => "dyslexia",
            Self::Adhd => "adhd",
            Self::LowVision => "low-vision",
            Self::MotorImpairment => "motor-impairment",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "dyslexia" => Some(Self::Dyslexia),
            "adhd" => Some(Self::Adhd),
            "low-vision" => Some(Self::LowVision),
            "motor-impairment" => Some(Self::MotorImpairment),
            _ => None,
        }
    }

    /// Saved settings may carry an id this build does not know; those
    /// fall back to the standard profile.
    #[must_use]
    pub fn from_saved(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::Standard)
    }

    #[must_use]
    pub fn body_classes(self) -> &'static [&'static str] {
        match self {
            Self::Standard => &CLASSES_STANDARD,
            Self::Dyslexia => &CLASSES_DYSLEXIA,
            Self::Adhd => &CLASSES_ADHD,
            Self::LowVision => &CLASSES_LOW_VISION,
            Self::MotorImpairment => &CLASSES_MOTOR_IMPAIRMENT,
        }
    }
}

/// Stylesheet injected at init. The page-transform rules key off the
/// marker classes; the widget shell rules style the button and panel.
pub const WIDGET_STYLESHEET: &str = r#"
.attune-widget-button {
    position: fixed;
    bottom: 20px;
    right: 20px;
    width: 60px;
    height: 60px;
    border-radius: 50%;
    background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
    color: white;
    border: none;
    cursor: pointer;
    z-index: 999999;
}

.attune-widget-panel {
    position: fixed;
    bottom: 100px;
    right: 20px;
    width: 350px;
    max-height: 600px;
    background: #1a1a1a;
    border-radius: 12px;
    z-index: 999998;
    display: none;
    overflow: hidden;
}

.attune-widget-panel.open {
    display: flex;
    flex-direction: column;
}

.attune-profile-card {
    background: #2a2a2a;
    border: 2px solid #3a3a3a;
    border-radius: 8px;
    padding: 15px;
    margin-bottom: 12px;
    cursor: pointer;
}

.attune-profile-card.active {
    border-color: #667eea;
    background: #2d2d3d;
}

body.attune-dyslexia {
    letter-spacing: 0.12em !important;
    word-spacing: 0.16em !important;
    line-height: 1.8 !important;
}

body.attune-dyslexia * {
    font-size: 1.1em !important;
}

body.attune-adhd {
    font-size: 1.15em !important;
}

body.attune-adhd .attune-highlight {
    background-color: #fef08a !important;
    padding: 2px 4px;
    border-radius: 3px;
    font-weight: 600;
}

body.attune-low-vision {
    font-size: 1.3em !important;
}

body.attune-low-vision * {
    font-weight: 600 !important;
}

body.attune-high-contrast {
    filter: contrast(1.5) !important;
    background: #000 !important;
    color: #fff !important;
}

body.attune-motor-impairment a,
body.attune-motor-impairment button,
body.attune-motor-impairment input,
body.attune-motor-impairment [role="button"] {
    min-width: 44px !important;
    min-height: 44px !important;
    padding: 12px !important;
}

body.attune-reduced-motion * {
    animation: none !important;
    transition: none !important;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_profile() {
        for profile in [
            ProfileId::Standard,
            ProfileId::Dyslexia,
            ProfileId::Adhd,
            ProfileId::LowVision,
            ProfileId::MotorImpairment,
        ] {
            assert_eq!(ProfileId::parse(profile.as_str()), Some(profile));
        }
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        assert_eq!(ProfileId::parse("  Low-Vision "), Some(ProfileId::LowVision));
    }

    #[test]
    fn unknown_saved_profile_falls_back_to_standard() {
        assert_eq!(ProfileId::from_saved("focus-plus"), ProfileId::Standard);
    }

    #[test]
    fn every_body_class_is_a_marker_class() {
        for profile in [
            ProfileId::Standard,
            ProfileId::Dyslexia,
            ProfileId::Adhd,
            ProfileId::LowVision,
            ProfileId::MotorImpairment,
        ] {
            for class in profile.body_classes() {
                assert!(
                    MARKER_CLASSES.contains(class),
                    "{class} missing from MARKER_CLASSES"
                );
            }
        }
    }

    #[test]
    fn serde_uses_kebab_case_ids() {
        let encoded = serde_json::to_string(&ProfileId::MotorImpairment).expect("serialize");
        assert_eq!(encoded, "\"motor-impairment\"");
    }
}
