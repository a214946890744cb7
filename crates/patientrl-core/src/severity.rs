//! Severity classification of free-text risk assessments.

use serde::{Deserialize, Serialize};

use crate::state::Severity;

/// All-clear marker. Its presence forces [`Severity::None`].
pub const ALL_CLEAR_MARKER: &str = "✅";
/// Warning marker. Matched without the U+FE0F presentation selector so that
/// both `⚠` and `⚠️` count once.
pub const WARNING_MARKER: &str = "\u{26A0}";

/// Marker tokens used by [`SeverityMarkers::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityMarkers {
    #[serde(default = "default_all_clear")]
    pub all_clear: String,
    #[serde(default = "default_warning")]
    pub warning: String,
}

fn default_all_clear() -> String {
    ALL_CLEAR_MARKER.to_string()
}

fn default_warning() -> String {
    WARNING_MARKER.to_string()
}

impl Default for SeverityMarkers {
    fn default() -> Self {
        Self {
            all_clear: default_all_clear(),
            warning: default_warning(),
        }
    }
}

impl SeverityMarkers {
    /// Classifies `risk_text`. The all-clear check runs first and wins over
    /// any number of warnings. Empty markers never match.
    #[must_use]
    pub fn classify(&self, risk_text: Option<&str>) -> Severity {
        let text = match risk_text {
            Some(t) if !t.is_empty() => t,
            _ => return Severity::None,
        };
        if !self.all_clear.is_empty() && text.contains(self.all_clear.as_str()) {
            return Severity::None;
        }
        if self.warning.is_empty() {
            return Severity::None;
        }
        match text.matches(self.warning.as_str()).count() {
            0 => Severity::None,
            1 => Severity::LessSevere,
            _ => Severity::Severe,
        }
    }
}

/// Classifies `risk_text` with the default markers.
#[must_use]
pub fn determine_severity_level(risk_text: Option<&str>) -> Severity {
    SeverityMarkers::default().classify(risk_text)
}
