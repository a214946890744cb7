//! Tabular action-value storage and the TD(0) update rule.

use patientrl_core::{Action, State};
use std::collections::BTreeMap;

/// Per-state action values. The array guarantees that every known state
/// holds a value for every action.
pub type ActionValues = [f64; Action::COUNT];

/// Q-table mapping each visited [`State`] to its [`ActionValues`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    entries: BTreeMap<State, ActionValues>,
}

impl QTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn values(&self, state: &State) -> Option<&ActionValues> {
        self.entries.get(state)
    }

    #[must_use]
    pub fn value(&self, state: &State, action: Action) -> Option<f64> {
        self.entries.get(state).map(|v| v[action.index()])
    }

    /// Highest action value for `state`, or `None` if the state is unknown.
    #[must_use]
    pub fn max_value(&self, state: &State) -> Option<f64> {
        self.entries
            .get(state)
            .map(|v| v.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }

    /// Greedy action for `state`. Ties resolve to the lower action index.
    #[must_use]
    pub fn best_action(&self, state: &State) -> Option<Action> {
        let values = self.entries.get(state)?;
        let mut best = Action::ALL[0];
        for action in Action::ALL.into_iter().skip(1) {
            if values[action.index()] > values[best.index()] {
                best = action;
            }
        }
        Some(best)
    }

    /// Returns the values for `state`, inserting zeros on first touch.
    pub fn ensure(&mut self, state: State) -> &mut ActionValues {
        self.entries.entry(state).or_insert([0.0; Action::COUNT])
    }

    /// Overwrites one value, creating the state entry if needed.
    pub fn set(&mut self, state: State, action: Action, value: f64) {
        self.ensure(state)[action.index()] = value;
    }

    /// Applies `Q(s,a) <- Q(s,a) + alpha * (r + gamma * max_a' Q(s',a') - Q(s,a))`.
    ///
    /// An absent or unknown `next` contributes `0.0`. Returns the previous
    /// and the updated value, or `None` without writing anything if the
    /// updated value would not be finite.
    pub fn update(
        &mut self,
        state: State,
        action: Action,
        reward: f64,
        next: Option<&State>,
        alpha: f64,
        gamma: f64,
    ) -> Option<(f64, f64)> {
        let next_max_q = next.and_then(|s| self.max_value(s)).unwrap_or(0.0);
        let previous = self.value(&state, action).unwrap_or(0.0);
        let value = previous + alpha * (reward + gamma * next_max_q - previous);
        if !value.is_finite() {
            return None;
        }
        self.set(state, action, value);
        Some((previous, value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&State, &ActionValues)> {
        self.entries.iter()
    }
}
