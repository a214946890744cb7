use patientrl_core::{Action, Decision, Severity, State};

#[test]
fn decision_serializes_without_missing_q_values() {
    let decision = Decision {
        action: Action::ALL[1],
        state: State::new("general_advice", Severity::Severe),
        explored: true,
        q_values: None,
        why: "unseen state".into(),
    };
    let json = serde_json::to_value(&decision).expect("serialize decision");
    assert_eq!(json["action"], 1);
    assert_eq!(json["state"]["severity"], 2);
    assert!(json.get("q_values").is_none());

    let back: Decision = serde_json::from_value(json).expect("deserialize decision");
    assert_eq!(back, decision);
}
