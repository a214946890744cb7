//! JSON codec for persisted models.
//!
//! Layout of a stored blob:
//!
//! ```json
//! {
//!   "patient_id": "p-17",
//!   "table": { "[\"general_advice\",1]": { "0": -0.5, "1": 0.0 } },
//!   "alpha": 0.1, "gamma": 0.9, "epsilon": 0.2,
//!   "saved_at": "2026-01-04T12:00:00Z"
//! }
//! ```
//!
//! Decoding is lenient: malformed entries are dropped one by one and the
//! rest of the table still loads.

use patientrl_core::{Action, State};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::config::{check_unit, Hyperparameters};
use crate::error::{AgentError, Result};
use crate::qtable::QTable;

const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// Serialized form of one agent.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub table: BTreeMap<String, BTreeMap<String, f64>>,
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

impl ModelSnapshot {
    #[must_use]
    pub fn capture(patient_id: Option<&str>, table: &QTable, params: &Hyperparameters) -> Self {
        let table = table
            .iter()
            .map(|(state, values)| {
                let actions = Action::ALL
                    .iter()
                    .map(|a| (a.to_string(), values[a.index()]))
                    .collect();
                (state.to_key(), actions)
            })
            .collect();
        Self {
            patient_id: patient_id.map(str::to_owned),
            table,
            alpha: params.alpha,
            gamma: params.gamma,
            epsilon: params.epsilon,
            saved_at: Some(iso8601_now()),
        }
    }

    /// Renders the blob. A non-finite value would turn into `null` and load
    /// back as `0.0`, so it is an error here.
    pub fn to_value(&self) -> Result<Value> {
        for (key, values) in &self.table {
            if let Some((action, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
                return Err(AgentError::CorruptTable {
                    key: key.clone(),
                    action: action.clone(),
                });
            }
        }
        Ok(serde_json::to_value(self)?)
    }
}

/// Counters describing how much of a blob was usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Whether the store had a blob for the patient at all.
    pub found: bool,
    pub states: usize,
    pub skipped_states: usize,
    pub skipped_values: usize,
    pub params_restored: usize,
}

/// Result of decoding a blob.
#[derive(Debug, Default)]
pub struct Decoded {
    pub table: QTable,
    pub params: Hyperparameters,
    pub report: LoadReport,
}

/// Decodes `blob`, starting from `defaults` for any hyperparameter that is
/// absent or invalid. Returns `None` if the blob is not a JSON object.
#[must_use]
pub fn decode(blob: &Value, defaults: Hyperparameters) -> Option<Decoded> {
    let obj = blob.as_object()?;
    let mut out = Decoded {
        table: QTable::new(),
        params: defaults,
        report: LoadReport {
            found: true,
            ..LoadReport::default()
        },
    };

    match obj.get("table") {
        None | Some(Value::Null) => {}
        Some(Value::Object(entries)) => {
            for (key, entry) in entries {
                decode_entry(key, entry, &mut out);
            }
        }
        Some(other) => {
            warn_event!("model table is not an object ({other}); starting empty");
        }
    }

    for (name, slot) in [
        ("alpha", &mut out.params.alpha),
        ("gamma", &mut out.params.gamma),
        ("epsilon", &mut out.params.epsilon),
    ] {
        let Some(raw) = obj.get(name) else { continue };
        match raw.as_f64().map(|v| check_unit(name, v)) {
            Some(Ok(v)) => {
                *slot = v;
                out.report.params_restored += 1;
            }
            _ => warn_event!("ignoring stored {name}={raw}; keeping {}", *slot),
        }
    }

    out.report.states = out.table.len();
    Some(out)
}

fn decode_entry(key: &str, entry: &Value, out: &mut Decoded) {
    let state = match State::from_key(key) {
        Ok(state) => state,
        Err(e) => {
            warn_event!("skipping model entry {key:?}: {e}");
            out.report.skipped_states += 1;
            return;
        }
    };
    let Some(values) = entry.as_object() else {
        warn_event!("skipping model entry {key:?}: values are not an object");
        out.report.skipped_states += 1;
        return;
    };

    let slots = out.table.ensure(state);
    for (action_key, raw) in values {
        let action = match action_key.parse::<Action>() {
            Ok(a) => a,
            Err(e) => {
                warn_event!("skipping value {action_key:?} of {key}: {e}");
                out.report.skipped_values += 1;
                continue;
            }
        };
        match raw.as_f64().filter(|v| v.is_finite()) {
            Some(v) => slots[action.index()] = v,
            None => {
                warn_event!("skipping value {action_key:?} of {key}: {raw} is not a finite number");
                out.report.skipped_values += 1;
            }
        }
    }
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use patientrl_core::Severity;
    use serde_json::json;

    #[test]
    fn capture_then_decode_is_lossless() {
        let mut table = QTable::new();
        table.set(State::new("general_advice", Severity::LessSevere), Action::ALL[0], -0.75);
        table.set(State::new("diet, \"strict\"", Severity::Severe), Action::ALL[1], 0.125);
        let params = Hyperparameters::new(0.5, 0.8, 0.05).unwrap();

        let blob = ModelSnapshot::capture(Some("p1"), &table, &params)
            .to_value()
            .unwrap();
        assert_eq!(blob["patient_id"], "p1");
        assert!(blob["saved_at"].is_string());

        let decoded = decode(&blob, Hyperparameters::default()).unwrap();
        assert_eq!(decoded.table, table);
        assert_eq!(decoded.params, params);
        assert_eq!(decoded.report.states, 2);
        assert_eq!(decoded.report.params_restored, 3);
    }

    #[test]
    fn malformed_entries_are_skipped_individually() {
        let blob = json!({
            "table": {
                "[\"ok\",0]": {"0": 1.5, "1": -2.0},
                "('legacy', 1)": {"0": 9.0},
                "[\"bad_sev\",5]": {"0": 9.0},
                "[\"not_obj\",1]": 3,
                "[\"partial\",2]": {"1": 0.25, "2": 7.0, "0": "x"}
            }
        });
        let decoded = decode(&blob, Hyperparameters::default()).unwrap();

        assert_eq!(decoded.report.states, 2);
        assert_eq!(decoded.report.skipped_states, 3);
        assert_eq!(decoded.report.skipped_values, 2);
        let partial = State::new("partial", Severity::Severe);
        assert_eq!(decoded.table.values(&partial), Some(&[0.0, 0.25]));
        assert_eq!(
            decoded.table.values(&State::new("ok", Severity::None)),
            Some(&[1.5, -2.0])
        );
    }

    #[test]
    fn missing_or_invalid_params_keep_defaults() {
        let defaults = Hyperparameters::new(0.3, 0.7, 0.1).unwrap();
        let blob = json!({"table": {}, "alpha": 0.9, "gamma": "high", "epsilon": 4.0});
        let decoded = decode(&blob, defaults).unwrap();
        assert!((decoded.params.alpha - 0.9).abs() < f64::EPSILON);
        assert!((decoded.params.gamma - 0.7).abs() < f64::EPSILON);
        assert!((decoded.params.epsilon - 0.1).abs() < f64::EPSILON);
        assert_eq!(decoded.report.params_restored, 1);
    }

    #[test]
    fn non_object_blob_is_rejected() {
        assert!(decode(&json!([1, 2]), Hyperparameters::default()).is_none());
        let empty = decode(&json!({}), Hyperparameters::default()).unwrap();
        assert!(empty.table.is_empty());
        assert!(empty.report.found);
    }

    #[test]
    fn non_finite_value_fails_instead_of_writing_null() {
        let mut table = QTable::new();
        table.set(State::new("ok", Severity::None), Action::ALL[0], 1.0);
        table.set(State::new("broken", Severity::Severe), Action::ALL[1], f64::NAN);

        let err = ModelSnapshot::capture(None, &table, &Hyperparameters::default())
            .to_value()
            .unwrap_err();
        match err {
            AgentError::CorruptTable { key, action } => {
                assert_eq!(key, "[\"broken\",2]");
                assert_eq!(action, "1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
