//! Integration tests: two devices following one group through a shared
//! in-memory remote, plus persistence across session restarts.

use std::sync::Arc;

use dayquest_core::{
    Catalog, EchoPolicy, EnergySettings, EntryDecision, Event, LocalPersistence, MemoryKv,
    MemoryRemote, ProgressState, RemoteStore, SaveStatus, Screen, Session, SessionSettings,
    SqliteKv, SyncError, SyncSettings,
};
use serde_json::json;
use tempfile::TempDir;

const GROUP: &str = "class-a";

fn settings(device: &str, policy: EchoPolicy) -> SessionSettings {
    SessionSettings {
        project_id: Some("workshop".into()),
        device_id: device.into(),
        fade_ms: 300,
        sync: SyncSettings {
            echo_policy: policy,
            echo_window_ms: 100,
            status_decay_ms: 3_000,
        },
        energy: EnergySettings::default(),
    }
}

fn device(remote: &MemoryRemote, name: &str, policy: EchoPolicy) -> Session {
    let mut session = Session::init(
        Arc::new(Catalog::builtin().unwrap()),
        LocalPersistence::new(Box::new(MemoryKv::new())),
        settings(name, policy),
    );
    session.join_group(Arc::new(remote.clone()), GROUP).unwrap();
    session.tick(0);
    session
}

fn completed(record: &serde_json::Value, step: &str) -> bool {
    record["completedSteps"][step] == json!(true)
}

#[test]
fn change_on_one_device_reaches_the_other() {
    let remote = MemoryRemote::new();
    let mut a = device(&remote, "dayquest-a", EchoPolicy::Window);
    let mut b = device(&remote, "dayquest-b", EchoPolicy::Window);

    a.complete_step(1, "d1-warmup", 100);
    assert_eq!(a.save_status(), SaveStatus::Saving);
    a.tick(110);
    assert_eq!(a.save_status(), SaveStatus::Saved);
    assert!(completed(&remote.record(GROUP).unwrap(), "d1-warmup"));

    b.tick(120);
    assert!(b.store().is_step_complete("d1-warmup"));
    assert!(b
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::RemoteMerged { .. })));

    // A's own push came back to it and was dropped.
    assert!(!a
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::RemoteMerged { .. })));

    a.tick(3_110);
    assert_eq!(a.save_status(), SaveStatus::Idle);
}

fn concurrent_edits_converge(policy: EchoPolicy) {
    let remote = MemoryRemote::new();
    let mut a = device(&remote, "dayquest-a", policy);
    let mut b = device(&remote, "dayquest-b", policy);

    // B pushes first; A pushes its own edit before it has seen B's.
    b.complete_step(1, "d1-warmup", 100);
    b.tick(105);
    a.complete_step(1, "d1-explore", 102);
    a.tick(110);
    b.tick(120);
    a.tick(5_000);
    b.tick(5_000);

    let record = remote.record(GROUP).unwrap();
    for step in ["d1-warmup", "d1-explore"] {
        assert_eq!(
            a.store().is_step_complete(step),
            b.store().is_step_complete(step),
            "{step} differs between devices"
        );
        assert_eq!(
            a.store().is_step_complete(step),
            completed(&record, step),
            "{step} differs from the shared record"
        );
    }
    assert_eq!(a.state().completed_steps, b.state().completed_steps);
    // The later push wins.
    assert!(a.store().is_step_complete("d1-explore"));
}

#[test]
fn concurrent_edits_converge_with_echo_window() {
    concurrent_edits_converge(EchoPolicy::Window);
}

#[test]
fn concurrent_edits_converge_with_versioned_echoes() {
    concurrent_edits_converge(EchoPolicy::Versioned);
}

#[test]
fn edit_inside_echo_window_is_not_pushed() {
    let remote = MemoryRemote::new();
    let mut a = device(&remote, "dayquest-a", EchoPolicy::Window);
    let mut b = device(&remote, "dayquest-b", EchoPolicy::Window);

    a.complete_step(1, "d1-warmup", 100);
    a.tick(100);
    b.tick(120);

    // Within 100 ms of the merge: saved locally, not pushed.
    b.complete_step(1, "d1-explore", 150);
    b.tick(160);
    assert!(b.store().is_step_complete("d1-explore"));
    assert!(!completed(&remote.record(GROUP).unwrap(), "d1-explore"));

    // After the window the next change pushes the full current record.
    b.tick(300);
    b.complete_step(1, "d1-reflect", 300);
    b.tick(310);
    let record = remote.record(GROUP).unwrap();
    assert!(completed(&record, "d1-explore"));
    assert!(completed(&record, "d1-reflect"));
    assert_eq!(record["completedDays"], json!([1]));
    assert_eq!(record["currentDay"], json!(2));

    a.tick(320);
    assert_eq!(a.state().completed_days, vec![1]);
    assert_eq!(a.state().current_day, 2);
}

#[test]
fn versioned_policy_pushes_right_after_a_merge() {
    let remote = MemoryRemote::new();
    let mut a = device(&remote, "dayquest-a", EchoPolicy::Versioned);
    let mut b = device(&remote, "dayquest-b", EchoPolicy::Versioned);

    a.complete_step(1, "d1-warmup", 100);
    a.tick(100);
    b.tick(110);
    b.complete_step(1, "d1-explore", 115);
    b.tick(120);
    assert!(completed(&remote.record(GROUP).unwrap(), "d1-explore"));

    a.tick(130);
    assert!(a.store().is_step_complete("d1-explore"));
}

#[test]
fn merge_keeps_local_volume() {
    let remote = MemoryRemote::new();
    let mut a = device(&remote, "dayquest-a", EchoPolicy::Window);
    a.set_volume(0.7);

    remote
        .push(GROUP, &json!({ "currentDay": 2, "energy": 40, "volume": 0.1 }))
        .unwrap();
    a.tick(50);
    assert_eq!(a.state().volume, 0.7);
    assert_eq!(a.state().current_day, 2);
    assert_eq!(a.state().energy, 40);
}

#[test]
fn malformed_remote_record_is_normalized() {
    let remote = MemoryRemote::new();
    let mut a = device(&remote, "dayquest-a", EchoPolicy::Window);

    remote
        .push(
            GROUP,
            &json!({
                "currentDay": "3",
                "energy": 250,
                "completedDays": "nope",
                "usedEnergizers": null,
                "completedSteps": { "d1-warmup": true },
            }),
        )
        .unwrap();
    a.tick(10);
    let state = a.state();
    assert_eq!(state.current_day, 3);
    assert_eq!(state.energy, 100);
    assert!(state.completed_days.is_empty());
    assert!(state.used_energizers.is_empty());
    assert!(a.store().is_step_complete("d1-warmup"));
}

#[test]
fn failed_force_save_reports_error_then_decays() {
    let remote = MemoryRemote::new();
    let mut a = device(&remote, "dayquest-a", EchoPolicy::Window);
    remote.set_fail_pushes(true);

    assert!(a.force_save(1_000).is_err());
    assert_eq!(a.save_status(), SaveStatus::Error);
    a.tick(3_999);
    assert_eq!(a.save_status(), SaveStatus::Error);
    a.tick(4_000);
    assert_eq!(a.save_status(), SaveStatus::Idle);

    remote.set_fail_pushes(false);
    a.force_save(5_000).unwrap();
    assert_eq!(a.save_status(), SaveStatus::Saved);
}

#[test]
fn leaving_the_group_stops_pushes() {
    let remote = MemoryRemote::new();
    let mut a = device(&remote, "dayquest-a", EchoPolicy::Window);
    assert_eq!(remote.subscriber_count(GROUP), 1);

    a.complete_step(1, "d1-warmup", 10);
    a.teardown();
    assert_eq!(remote.subscriber_count(GROUP), 0);
    assert!(a.group_key().is_none());

    a.complete_step(1, "d1-explore", 20);
    a.tick(30);
    a.tick(10_000);
    assert!(remote.record(GROUP).is_none());
    assert!(a.store().is_step_complete("d1-explore"));
    assert!(matches!(a.force_save(40), Err(SyncError::NotConnected)));
}

#[test]
fn energy_gate_diverts_below_threshold() {
    let remote = MemoryRemote::new();
    let mut a = device(&remote, "dayquest-a", EchoPolicy::Window);

    remote.push(GROUP, &json!({ "energy": 10 })).unwrap();
    a.tick(10);
    a.tick(200);
    assert_eq!(a.enter_step(1, "d1-warmup", 200), EntryDecision::Diverted);
    assert_eq!(a.state().energy, 10);
    assert!(a.gate().is_on_break());

    remote.push(GROUP, &json!({ "energy": 20 })).unwrap();
    a.tick(1_000);
    a.tick(2_000);
    assert_eq!(
        a.enter_step(1, "d1-warmup", 2_000),
        EntryDecision::Enter { cost: 10 }
    );
    assert_eq!(a.state().energy, 10);
}

#[test]
fn progress_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("dayquest.db");
    let catalog = Arc::new(Catalog::builtin().unwrap());

    {
        let mut session = Session::init(
            Arc::clone(&catalog),
            LocalPersistence::new(Box::new(SqliteKv::open(&db).unwrap())),
            settings("dayquest-a", EchoPolicy::Window),
        );
        session.complete_intro(0);
        session.complete_step(1, "d1-warmup", 0);
        session.set_volume(0.25);
        session.teardown();
    }

    let session = Session::init(
        catalog,
        LocalPersistence::new(Box::new(SqliteKv::open(&db).unwrap())),
        settings("dayquest-a", EchoPolicy::Window),
    );
    assert_eq!(session.screen(), &Screen::Map);
    assert!(session.store().is_step_complete("d1-warmup"));
    assert_eq!(session.state().volume, 0.25);
    assert_ne!(session.state(), &ProgressState::default());
}
