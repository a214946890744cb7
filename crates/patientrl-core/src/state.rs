//! Discretized learning state.
//!
//! A [`State`] is the pair `(category, severity)` that keys the Q-table.
//! Categories are opaque labels chosen upstream; severity is derived from a
//! free-text risk assessment by [`crate::severity`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::severity::determine_severity_level;

/// Three-way discretization of a clinical risk summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    /// No risk markers, or an explicit all-clear.
    #[default]
    None = 0,
    /// Exactly one warning marker.
    LessSevere = 1,
    /// Two or more warning markers.
    Severe = 2,
}

impl Severity {
    #[must_use]
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl From<Severity> for u8 {
    fn from(s: Severity) -> Self {
        s.level()
    }
}

impl TryFrom<u8> for Severity {
    type Error = StateKeyError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::LessSevere),
            2 => Ok(Self::Severe),
            other => Err(StateKeyError::Severity(i64::from(other))),
        }
    }
}

/// Failure to decode a persisted state key.
#[derive(Debug, Error)]
pub enum StateKeyError {
    #[error("state key is not a [category, severity] array: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("severity level out of range: {0}")]
    Severity(i64),
}

/// Key into the Q-table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct State {
    pub category: String,
    pub severity: Severity,
}

impl State {
    pub fn new(category: impl Into<String>, severity: Severity) -> Self {
        Self {
            category: category.into(),
            severity,
        }
    }

    /// Encodes the state as the string form of the JSON array
    /// `["category", severity]`, used as an object key in snapshots.
    #[must_use]
    pub fn to_key(&self) -> String {
        serde_json::json!([self.category, self.severity.level()]).to_string()
    }

    /// Decodes a key produced by [`State::to_key`]. Anything that is not a
    /// two-element `[string, 0..=2]` array is rejected.
    pub fn from_key(key: &str) -> Result<Self, StateKeyError> {
        let (category, level): (String, i64) = serde_json::from_str(key)?;
        let severity = u8::try_from(level)
            .map_err(|_| StateKeyError::Severity(level))
            .and_then(Severity::try_from)?;
        Ok(Self { category, severity })
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.category, self.severity.level())
    }
}

/// Raw caller-side inputs from which a [`State`] is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInputs {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_text: Option<String>,
}

impl StateInputs {
    pub fn new(category: impl Into<String>, risk_text: Option<&str>) -> Self {
        Self {
            category: category.into(),
            risk_text: risk_text.map(str::to_owned),
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        determine_severity_level(self.risk_text.as_deref())
    }

    #[must_use]
    pub fn state(&self) -> State {
        State::new(self.category.clone(), self.severity())
    }
}
