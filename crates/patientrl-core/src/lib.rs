//! Core types for per-patient response-strategy learning.

pub mod action;
pub mod event;
pub mod reward;
pub mod severity;
pub mod state;

pub use action::{Action, ActionError};
pub use event::OutcomeEvent;
pub use reward::{calculate_reward, RewardTable};
pub use severity::{determine_severity_level, SeverityMarkers};
pub use state::{Severity, State, StateInputs, StateKeyError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one policy evaluation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub state: State,
    /// `true` when the action came from the random branch, either by
    /// exploration or because the state had no learned values yet.
    pub explored: bool,
    /// Learned values for `state`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_values: Option<[f64; Action::COUNT]>,
    pub why: String,
}

/// A learning policy over [`State`]s and [`Action`]s.
pub trait Policy {
    type Error;

    fn decide(&self, inputs: &StateInputs) -> Decision;
    /// Applies one transition and returns the new value of `(state, action)`.
    fn feedback(
        &mut self,
        inputs: &StateInputs,
        action: Action,
        reward: f64,
        next: Option<&StateInputs>,
    ) -> Result<f64, Self::Error>;
    /// Serializes the learned state. Fails rather than writing a lossy blob.
    fn snapshot(&self) -> Result<Value, Self::Error>;
    fn load(&mut self, snapshot: Value);
}
