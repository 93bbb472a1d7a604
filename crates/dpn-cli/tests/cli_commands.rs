use std::fs;
use std::process::Command;

use tempfile::TempDir;

const SOUND: &str = r#"{
    "name": "line",
    "places": [{ "id": "i", "tokens": 1 }, { "id": "o", "final": true }],
    "transitions": [{ "id": "t" }],
    "arcs": [{ "from": "i", "to": "t" }, { "from": "t", "to": "o" }]
}"#;

const REPAIRABLE: &str = r#"{
    "name": "chain",
    "variables": [{ "name": "x", "domain": "int", "initial": 0 }],
    "places": [{ "id": "i", "tokens": 1 }, { "id": "p" }, { "id": "o", "final": true }],
    "transitions": [
        { "id": "t1", "guard": "x_w >= 0" },
        { "id": "t2", "guard": "x_r < 3" }
    ],
    "arcs": [
        { "from": "i", "to": "t1" }, { "from": "t1", "to": "p" },
        { "from": "p", "to": "t2" }, { "from": "t2", "to": "o" }
    ]
}"#;

fn write_net(dir: &TempDir, name: &str, json: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, json).expect("failed to write net");
    path
}

fn dpnsound() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dpnsound"))
}

#[test]
fn check_reports_a_sound_net() {
    let dir = TempDir::new().unwrap();
    let net = write_net(&dir, "line.json", SOUND);
    let output = dpnsound()
        .arg("check")
        .arg(&net)
        .output()
        .expect("failed to execute dpnsound check");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("RESULT: SOUND"), "{stdout}");
}

#[test]
fn check_emits_json_and_signals_unsoundness() {
    let dir = TempDir::new().unwrap();
    let net = write_net(&dir, "chain.json", REPAIRABLE);
    let output = dpnsound()
        .args(["check", "--format", "json", "--policy", "tree"])
        .arg(&net)
        .output()
        .expect("failed to execute dpnsound check");
    assert_eq!(output.status.code(), Some(2));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["result"], "unsound");
    assert_eq!(value["outcome"]["state_space"]["policy"], "tree");
}

#[test]
fn repair_writes_the_repaired_net() {
    let dir = TempDir::new().unwrap();
    let net = write_net(&dir, "chain.json", REPAIRABLE);
    let out = dir.path().join("fixed").join("chain.json");
    let output = dpnsound()
        .arg("repair")
        .arg(&net)
        .arg("--out")
        .arg(&out)
        .output()
        .expect("failed to execute dpnsound repair");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("RESULT: REPAIRED"));

    let check = dpnsound()
        .arg("check")
        .arg(&out)
        .output()
        .expect("failed to execute dpnsound check");
    assert!(check.status.success());
}

#[test]
fn unknown_policy_is_an_error() {
    let dir = TempDir::new().unwrap();
    let net = write_net(&dir, "line.json", SOUND);
    let output = dpnsound()
        .args(["check", "--policy", "graph"])
        .arg(&net)
        .output()
        .expect("failed to execute dpnsound check");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_files_are_reported() {
    let dir = TempDir::new().unwrap();
    let output = dpnsound()
        .arg("check")
        .arg(dir.path().join("absent.json"))
        .output()
        .expect("failed to execute dpnsound check");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.json"));
}
