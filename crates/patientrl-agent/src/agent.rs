//! Per-patient agent: a [`QLearner`] bound to a [`ModelStore`].

use patientrl_core::{Action, Decision, Policy, State, StateInputs};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::learner::QLearner;
use crate::snapshot::LoadReport;
use crate::store::ModelStore;

/// Whether a save reached the store.
///
/// A failed save is not an error for the caller: the in-memory table is
/// already updated and keeps serving decisions. The mismatch is reported
/// here so callers can see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Persistence {
    Saved,
    Unsaved { reason: String },
}

impl Persistence {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, Persistence::Saved)
    }
}

/// Outcome of one [`PatientAgent::update_model`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateReport {
    pub patient_id: String,
    pub state: State,
    pub action: Action,
    pub reward: f64,
    pub previous: f64,
    pub value: f64,
    pub persistence: Persistence,
}

pub struct PatientAgent {
    patient_id: String,
    learner: QLearner,
    store: Arc<dyn ModelStore>,
    /// Set once the registry has dropped this agent. A retired agent never
    /// writes to the store again, so it cannot overwrite its successor.
    retired: bool,
}

impl std::fmt::Debug for PatientAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatientAgent")
            .field("patient_id", &self.patient_id)
            .field("learner", &self.learner)
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}

impl PatientAgent {
    pub fn new(
        patient_id: impl Into<String>,
        config: &AgentConfig,
        store: Arc<dyn ModelStore>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            learner: QLearner::new(config),
            store,
            retired: false,
        }
    }

    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }

    #[must_use]
    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    #[must_use]
    pub fn learner(&self) -> &QLearner {
        &self.learner
    }

    /// Hydrates table and hyperparameters from the store. An unavailable
    /// store or unusable blob leaves the agent as constructed.
    pub async fn load_model(&mut self) -> LoadReport {
        match self.store.get(&self.patient_id).await {
            Ok(Some(blob)) => {
                let report = self.learner.restore(&blob);
                debug_event!(
                    "loaded model for {}: {} states, {} skipped",
                    self.patient_id,
                    report.states,
                    report.skipped_states
                );
                report
            }
            Ok(None) => LoadReport::default(),
            Err(e) => {
                warn_event!(
                    "could not load model for {}: {e}; starting with an empty table",
                    self.patient_id
                );
                LoadReport::default()
            }
        }
    }

    /// Writes the whole table and hyperparameters to the store.
    pub async fn save_model(&self) -> Persistence {
        if self.retired {
            return Persistence::Unsaved {
                reason: AgentError::Evicted(self.patient_id.clone()).to_string(),
            };
        }
        let blob = match self.learner.capture(Some(&self.patient_id)).to_value() {
            Ok(blob) => blob,
            Err(e) => {
                warn_event!("refusing to save model for {}: {e}", self.patient_id);
                return Persistence::Unsaved {
                    reason: e.to_string(),
                };
            }
        };
        match self.store.set(&self.patient_id, &blob).await {
            Ok(()) => Persistence::Saved,
            Err(e) => {
                warn_event!("could not save model for {}: {e}", self.patient_id);
                Persistence::Unsaved {
                    reason: e.to_string(),
                }
            }
        }
    }

    #[must_use]
    pub fn decide(&self, inputs: &StateInputs) -> Decision {
        self.learner.decide(inputs)
    }

    #[must_use]
    pub fn get_action(&self, category: &str, risk_text: Option<&str>) -> Action {
        self.decide(&StateInputs::new(category, risk_text)).action
    }

    /// Applies one transition and persists the whole table before
    /// returning. `next = None` is a terminal transition.
    pub async fn update_model(
        &mut self,
        inputs: &StateInputs,
        action: Action,
        reward: f64,
        next: Option<&StateInputs>,
    ) -> Result<UpdateReport> {
        if self.retired {
            return Err(AgentError::Evicted(self.patient_id.clone()));
        }
        let (previous, value) = self.learner.learn(inputs, action, reward, next)?;
        let persistence = self.save_model().await;
        Ok(UpdateReport {
            patient_id: self.patient_id.clone(),
            state: self.learner.state_of(inputs),
            action,
            reward,
            previous,
            value,
            persistence,
        })
    }

    /// Turns an observed outcome into a reward with the configured reward
    /// table and applies it.
    pub async fn record_outcome(
        &mut self,
        inputs: &StateInputs,
        action: Action,
        works: bool,
        next: Option<&StateInputs>,
    ) -> Result<UpdateReport> {
        let severity = self.learner.state_of(inputs).severity;
        let reward = self.learner.rewards.reward(works, severity);
        self.update_model(inputs, action, f64::from(reward), next)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Hyperparameters;
    use crate::store::MemoryStore;
    use patientrl_core::Severity;

    fn config(alpha: f64, gamma: f64, epsilon: f64) -> AgentConfig {
        AgentConfig {
            params: Hyperparameters::new(alpha, gamma, epsilon).unwrap(),
            ..AgentConfig::default()
        }
    }

    #[tokio::test]
    async fn update_persists_before_returning() {
        let store = Arc::new(MemoryStore::new());
        let mut agent = PatientAgent::new("p1", &config(0.5, 0.9, 0.0), store.clone());
        let inputs = StateInputs::new("general_advice", Some("⚠️"));

        let report = agent
            .update_model(&inputs, Action::ALL[0], -1.0, None)
            .await
            .unwrap();
        assert!(report.persistence.is_saved());
        assert!((report.value + 0.5).abs() < 1e-12);
        assert_eq!(report.state, State::new("general_advice", Severity::LessSevere));

        let blob = store.get("p1").await.unwrap().unwrap();
        assert_eq!(blob["table"]["[\"general_advice\",1]"]["0"], -0.5);
        assert_eq!(blob["patient_id"], "p1");
    }

    #[tokio::test]
    async fn outage_is_reported_not_raised() {
        let store = Arc::new(MemoryStore::new());
        store.set_available(false);
        let mut agent = PatientAgent::new("p1", &config(0.5, 0.9, 0.0), store.clone());

        let loaded = agent.load_model().await;
        assert!(!loaded.found);
        assert!(agent.learner().table().is_empty());

        let inputs = StateInputs::new("c", None);
        let report = agent
            .update_model(&inputs, Action::ALL[1], 3.0, None)
            .await
            .unwrap();
        assert!(matches!(report.persistence, Persistence::Unsaved { .. }));
        // The in-memory table is still updated.
        assert_eq!(agent.learner().table().value(&report.state, Action::ALL[1]), Some(1.5));
    }

    #[tokio::test]
    async fn record_outcome_uses_reward_table() {
        let store = Arc::new(MemoryStore::new());
        let mut agent = PatientAgent::new("p1", &config(1.0, 0.0, 0.0), store);

        let severe = StateInputs::new("c", Some("⚠️ ⚠️"));
        let r = agent.record_outcome(&severe, Action::ALL[0], false, None).await.unwrap();
        assert!((r.reward + 3.0).abs() < f64::EPSILON);

        let mild = StateInputs::new("c", Some("⚠️"));
        let r = agent.record_outcome(&mild, Action::ALL[0], false, None).await.unwrap();
        assert!((r.reward + 1.0).abs() < f64::EPSILON);

        let r = agent.record_outcome(&mild, Action::ALL[1], true, None).await.unwrap();
        assert!((r.reward - 3.0).abs() < f64::EPSILON);
        assert_eq!(agent.get_action("c", Some("⚠️")), Action::ALL[1]);
    }

    #[tokio::test]
    async fn diverging_update_is_an_error_and_the_store_keeps_the_last_good_table() {
        let store = Arc::new(MemoryStore::new());
        let mut agent = PatientAgent::new("p1", &config(1.0, 1.0, 0.0), store.clone());
        let inputs = StateInputs::new("c", None);

        let report = agent
            .update_model(&inputs, Action::ALL[0], 1e308, Some(&inputs))
            .await
            .unwrap();
        assert!(report.persistence.is_saved());

        let err = agent
            .update_model(&inputs, Action::ALL[0], 1e308, Some(&inputs))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NonFiniteValue { .. }), "{err}");

        let blob = store.get("p1").await.unwrap().unwrap();
        assert_eq!(blob["table"]["[\"c\",0]"]["0"], 1e308);
    }

    #[tokio::test]
    async fn retired_agent_neither_learns_nor_saves() {
        let store = Arc::new(MemoryStore::new());
        let mut agent = PatientAgent::new("p1", &config(0.5, 0.9, 0.0), store.clone());
        agent.retire();

        let inputs = StateInputs::new("c", None);
        let err = agent
            .update_model(&inputs, Action::ALL[1], 3.0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Evicted(ref id) if id == "p1"));
        assert!(agent.learner().table().is_empty());
        assert!(!agent.save_model().await.is_saved());
        assert!(store.get("p1").await.unwrap().is_none());
    }
}
