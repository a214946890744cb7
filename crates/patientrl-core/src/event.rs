//! Outcome feedback records.
//!
//! An [`OutcomeEvent`] is what the external feedback channel (e.g. a
//! "did this help?" answer) emits once the outcome of an earlier decision is
//! known. One event drives exactly one Q-value update for one patient.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::state::StateInputs;

/// Delayed outcome of a decision taken for a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeEvent {
    /// Optional event id for de-duplication upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub patient_id: String,
    /// Category of the state in which `action` was taken.
    pub category: String,
    /// Risk assessment text of that state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_text: Option<String>,
    pub action: Action,
    /// Whether the chosen response worked for the patient.
    pub works: bool,
    /// Category of the follow-up state, if one was observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_risk_text: Option<String>,
    /// RFC 3339 timestamp of when the outcome was reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl OutcomeEvent {
    #[must_use]
    pub fn state_inputs(&self) -> StateInputs {
        StateInputs {
            category: self.category.clone(),
            risk_text: self.risk_text.clone(),
        }
    }

    /// Follow-up state inputs; `None` means a terminal transition.
    #[must_use]
    pub fn next_state_inputs(&self) -> Option<StateInputs> {
        self.next_category.as_ref().map(|category| StateInputs {
            category: category.clone(),
            risk_text: self.next_risk_text.clone(),
        })
    }
}
