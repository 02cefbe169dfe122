//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_dayquest-cli"))
        .args(args)
        .env("DAYQUEST_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn status_json(home: &Path) -> serde_json::Value {
    let (code, stdout, _) = run_cli(home, &["status", "--json"]);
    assert_eq!(code, 0, "status failed");
    serde_json::from_str(&stdout).expect("status --json is not JSON")
}

#[test]
fn test_status_defaults() {
    let home = TempDir::new().unwrap();
    let state = status_json(home.path());
    assert_eq!(state["currentDay"], 1);
    assert_eq!(state["energy"], 100);
    assert_eq!(state["volume"], 0.5);
}

#[test]
fn test_status_text() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["status"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Energy: 100/100"));
    assert!(stdout.contains("d1-warmup"));
}

#[test]
fn test_completing_a_day_unlocks_the_next() {
    let home = TempDir::new().unwrap();
    for step in ["d1-warmup", "d1-explore", "d1-reflect"] {
        let (code, _, stderr) = run_cli(home.path(), &["step", "complete", "1", step]);
        assert_eq!(code, 0, "step complete failed: {stderr}");
    }
    let state = status_json(home.path());
    assert_eq!(state["completedDays"], serde_json::json!([1]));
    assert_eq!(state["currentDay"], 2);

    let (code, _, _) = run_cli(home.path(), &["step", "uncomplete", "d1-reflect"]);
    assert_eq!(code, 0);
    let state = status_json(home.path());
    assert_eq!(state["completedDays"], serde_json::json!([1]));
    assert!(state["completedSteps"].get("d1-reflect").is_none());
}

#[test]
fn test_unknown_step_fails() {
    let home = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["step", "complete", "1", "nope"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_enter_deducts_energy() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["step", "enter", "1", "d1-explore"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("entered d1-explore"));
    assert_eq!(status_json(home.path())["energy"], 85);

    let (code, _, _) = run_cli(home.path(), &["step", "enter", "3", "d3-polish"]);
    assert_ne!(code, 0, "locked day must be refused");
}

#[test]
fn test_energizer_offer_and_free_run() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["energizer", "offer", "--json"]);
    assert_eq!(code, 0);
    let offered: Vec<String> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(offered.len(), 3);

    let (code, stdout, _) = run_cli(home.path(), &["energizer", "run", "stretch", "--free"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("restored 0 energy"));
    let state = status_json(home.path());
    assert_eq!(state["usedEnergizers"], serde_json::json!(["stretch"]));
    assert_eq!(state["energy"], 100);
}

#[test]
fn test_day_reset_and_full_reset() {
    let home = TempDir::new().unwrap();
    run_cli(home.path(), &["day", "intro-seen", "1"]);
    run_cli(home.path(), &["step", "complete", "1", "d1-warmup"]);
    let (code, _, _) = run_cli(home.path(), &["day", "reset", "1"]);
    assert_eq!(code, 0);
    let state = status_json(home.path());
    assert_eq!(state["dayIntroSeen"]["1"], false);
    assert!(state["completedSteps"].get("d1-warmup").is_none());

    run_cli(home.path(), &["step", "enter", "1", "d1-warmup"]);
    let (code, _, _) = run_cli(home.path(), &["reset"]);
    assert_eq!(code, 0);
    assert_eq!(status_json(home.path())["energy"], 100);
}

#[test]
fn test_config_get_set() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["config", "get", "energy.low_threshold"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "20");

    let (code, _, _) = run_cli(home.path(), &["config", "set", "energy.low_threshold", "30"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(home.path(), &["config", "get", "energy.low_threshold"]);
    assert_eq!(stdout.trim(), "30");

    let (code, _, _) = run_cli(home.path(), &["config", "set", "energy.reward_min", "90"]);
    assert_ne!(code, 0, "reward_min above reward_max must be rejected");

    let (code, _, _) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
}

#[test]
fn test_sync_push_then_pull_on_another_device() {
    let shared = TempDir::new().unwrap();
    let shared_dir = shared.path().to_str().unwrap();
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();

    for home in [a.path(), b.path()] {
        run_cli(home, &["config", "set", "sync.remote_dir", shared_dir]);
        run_cli(home, &["config", "set", "sync.group_key", "class-a"]);
    }

    let (code, _, _) = run_cli(b.path(), &["sync", "pull"]);
    assert_eq!(code, 0);

    run_cli(a.path(), &["step", "complete", "1", "d1-warmup"]);
    let (code, stdout, stderr) = run_cli(a.path(), &["sync", "push"]);
    assert_eq!(code, 0, "push failed: {stderr}");
    assert!(stdout.contains("pushed to class-a"));
    assert!(shared.path().join("class-a.json").exists());

    let (code, stdout, _) = run_cli(b.path(), &["sync", "pull"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("merged"));
    let state = status_json(b.path());
    assert_eq!(state["completedSteps"]["d1-warmup"], true);

    let (code, stdout, _) = run_cli(b.path(), &["sync", "status", "--json"]);
    assert_eq!(code, 0);
    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["group_key"], "class-a");
    assert!(status["last_updated"].is_string());
}

#[test]
fn test_sync_without_group_fails() {
    let home = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["sync", "push"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("sync.remote_dir"));
}

#[test]
fn test_completions() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("dayquest-cli"));
}
