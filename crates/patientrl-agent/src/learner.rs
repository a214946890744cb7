//! ε-greedy tabular Q-learner.
//!
//! [`QLearner`] is the in-memory half of a patient agent: it owns the
//! Q-table and the hyperparameters and implements the [`Policy`] trait.
//! Persistence lives in [`crate::agent::PatientAgent`].

use patientrl_core::{Action, Decision, Policy, RewardTable, SeverityMarkers, State, StateInputs};
use rand::prelude::*;
use serde_json::Value;

use crate::config::{AgentConfig, Hyperparameters};
use crate::error::{AgentError, Result};
use crate::qtable::QTable;
use crate::snapshot::{self, LoadReport, ModelSnapshot};

#[derive(Debug, Clone)]
pub struct QLearner {
    pub params: Hyperparameters,
    pub rewards: RewardTable,
    markers: SeverityMarkers,
    table: QTable,
}

impl Default for QLearner {
    fn default() -> Self {
        Self::new(&AgentConfig::default())
    }
}

impl QLearner {
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            params: config.params,
            rewards: config.rewards,
            markers: config.markers.clone(),
            table: QTable::new(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut QTable {
        &mut self.table
    }

    /// Discretizes caller inputs with this learner's severity markers.
    #[must_use]
    pub fn state_of(&self, inputs: &StateInputs) -> State {
        State::new(
            inputs.category.clone(),
            self.markers.classify(inputs.risk_text.as_deref()),
        )
    }

    /// Epsilon-greedy selection with an injected random source.
    pub fn decide_with_rng<R: Rng + ?Sized>(&self, inputs: &StateInputs, rng: &mut R) -> Decision {
        let state = self.state_of(inputs);
        let q_values = self.table.values(&state).copied();

        if rng.gen::<f64>() < self.params.epsilon {
            return Decision {
                action: random_action(rng),
                state,
                explored: true,
                q_values,
                why: "explore ε".into(),
            };
        }

        match self.table.best_action(&state) {
            Some(action) => Decision {
                action,
                state,
                explored: false,
                q_values,
                why: "exploit learned values".into(),
            },
            None => Decision {
                action: random_action(rng),
                state,
                explored: true,
                q_values: None,
                why: "unseen state".into(),
            },
        }
    }

    /// Applies one TD(0) transition. Rejects non-finite rewards, and updates
    /// whose result would not be finite, before the table is touched.
    /// Returns the previous and updated value.
    pub fn learn(
        &mut self,
        inputs: &StateInputs,
        action: Action,
        reward: f64,
        next: Option<&StateInputs>,
    ) -> Result<(f64, f64)> {
        if !reward.is_finite() {
            return Err(AgentError::InvalidReward(reward));
        }
        let state = self.state_of(inputs);
        let next_state = next.map(|n| self.state_of(n));
        self.table
            .update(
                state.clone(),
                action,
                reward,
                next_state.as_ref(),
                self.params.alpha,
                self.params.gamma,
            )
            .ok_or_else(|| AgentError::NonFiniteValue {
                state: state.to_string(),
                action,
                reward,
            })
    }

    /// Replaces table and hyperparameters from a stored blob. A blob that is
    /// not an object leaves the learner untouched.
    pub fn restore(&mut self, blob: &Value) -> LoadReport {
        match snapshot::decode(blob, self.params) {
            Some(decoded) => {
                self.table = decoded.table;
                self.params = decoded.params;
                decoded.report
            }
            None => {
                warn_event!("stored model is not a JSON object; ignoring it");
                LoadReport {
                    found: true,
                    ..LoadReport::default()
                }
            }
        }
    }

    #[must_use]
    pub fn capture(&self, patient_id: Option<&str>) -> ModelSnapshot {
        ModelSnapshot::capture(patient_id, &self.table, &self.params)
    }
}

fn random_action<R: Rng + ?Sized>(rng: &mut R) -> Action {
    Action::ALL[rng.gen_range(0..Action::COUNT)]
}

impl Policy for QLearner {
    type Error = AgentError;

    fn decide(&self, inputs: &StateInputs) -> Decision {
        self.decide_with_rng(inputs, &mut thread_rng())
    }

    fn feedback(
        &mut self,
        inputs: &StateInputs,
        action: Action,
        reward: f64,
        next: Option<&StateInputs>,
    ) -> Result<f64> {
        self.learn(inputs, action, reward, next).map(|(_, v)| v)
    }

    fn snapshot(&self) -> Result<Value> {
        self.capture(None).to_value()
    }

    fn load(&mut self, snapshot: Value) {
        self.restore(&snapshot);
    }
}
