//! End-to-end runs of the `patientrl` binary against a scratch store.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("patientrl_bin_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn patientrl(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("patientrl")
        .unwrap_or_else(|e| panic!("binary not built: {e}"));
    cmd.env_remove("PATIENTRL_CONFIG")
        .env("PATIENTRL_STORE_DIR", dir.join("models"));
    cmd
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output)
        .unwrap_or_else(|e| panic!("stdout is not JSON: {e}: {}", String::from_utf8_lossy(&output)))
}

#[test]
fn feedback_then_decide_uses_learned_values() {
    let dir = scratch("feedback");
    let config = dir.join("config.json");
    std::fs::write(&config, r#"{"alpha": 0.5, "gamma": 0.9, "epsilon": 0.0}"#)
        .unwrap_or_else(|e| panic!("write config: {e}"));

    let report = stdout_json(patientrl(&dir).args([
        "--config",
        config.to_str().unwrap_or_default(),
        "feedback",
        "--patient",
        "p-1",
        "--category",
        "general_advice",
        "--risk",
        "⚠️ one warning",
        "--action",
        "0",
        "--works",
        "false",
    ]));
    assert_eq!(report["reward"], -1.0);
    assert_eq!(report["value"], -0.5);
    assert_eq!(report["persistence"]["status"], "saved");
    assert!(dir.join("models").join("p-1.json").exists());

    // Stored epsilon is 0, so the greedy action is deterministic.
    let decision = stdout_json(patientrl(&dir).args([
        "decide",
        "--patient",
        "p-1",
        "--category",
        "general_advice",
        "--risk",
        "⚠️ one warning",
    ]));
    assert_eq!(decision["action"], 1);
    assert_eq!(decision["explored"], false);
    assert_eq!(decision["state"]["severity"], 1);
}

#[test]
fn update_accepts_raw_negative_reward() {
    let dir = scratch("update");
    let report = stdout_json(patientrl(&dir).args([
        "update",
        "--patient",
        "p-2",
        "--category",
        "diet",
        "--action",
        "1",
        "--reward",
        "-3",
        "--next-category",
        "diet",
        "--next-risk",
        "✅ stable",
    ]));
    // Default alpha 0.1.
    assert!((report["value"].as_f64().unwrap_or_default() + 0.3).abs() < 1e-9);

    let inspect = stdout_json(patientrl(&dir).args(["inspect", "--patient", "p-2"]));
    assert_eq!(inspect["states"].as_array().map(Vec::len), Some(1));
    assert_eq!(inspect["states"][0]["greedy"], 0);
    assert_eq!(inspect["alpha"], 0.1);
}

#[test]
fn replay_resumes_from_saved_cursor() {
    let dir = scratch("replay");
    let events = dir.join("events.jsonl");
    let state_file = dir.join("replay.state.json");
    std::fs::write(
        &events,
        r#"{"patient_id":"r","category":"c","action":1,"works":true}
{"patient_id":"r","category":"c","action":1,"works":true}"#,
    )
    .unwrap_or_else(|e| panic!("write events: {e}"));

    let run = || {
        let mut cmd = patientrl(&dir);
        cmd.args([
            "replay",
            "--path",
            events.to_str().unwrap_or_default(),
            "--state-file",
            state_file.to_str().unwrap_or_default(),
        ]);
        stdout_json(&mut cmd)
    };

    let first = run();
    assert_eq!(first["applied"], 2);
    assert_eq!(first["cursor"], 2);

    let second = run();
    assert_eq!(second["applied"], 0);
    assert_eq!(second["cursor"], 2);
}

#[test]
fn out_of_range_action_is_rejected() {
    let dir = scratch("bad_action");
    patientrl(&dir)
        .args([
            "feedback",
            "--patient",
            "p",
            "--category",
            "c",
            "--action",
            "2",
            "--works",
            "true",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("outside the action space"));
}
