//! State machine and merge engine tests

use chrono::{DateTime, TimeZone, Utc};

use deployboard::deploy::fsm::{transition, FsmError, FsmSettings, Outcome, Signal};
use deployboard::deploy::signals::{SignalInbox, SignalSource};
use deployboard::deploy::simulator::{DemoSimulator, SimulatorOptions};
use deployboard::engine::merge::tick;
use deployboard::models::payload::normalize_listing;
use deployboard::models::record::{DeploymentRecord, DeploymentStatus, Source, StartedAt};
use deployboard::sources::fixture::demo_payloads;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn demo_records() -> Vec<DeploymentRecord> {
    Source::ALL
        .into_iter()
        .flat_map(|s| normalize_listing(s, demo_payloads(s)))
        .collect()
}

fn seeded_simulator(seed: u64) -> DemoSimulator {
    DemoSimulator::new(SimulatorOptions {
        seed: Some(seed),
        ..Default::default()
    })
}

#[test]
fn test_demo_tick_moves_only_running_and_pending() {
    let settings = FsmSettings::default();
    let records = demo_records();
    let inbox = SignalInbox::new();
    let sim = seeded_simulator(42);

    let (next, report) = tick(&settings, &records, &inbox, Some(&sim as &dyn SignalSource), now());
    assert_eq!(next.len(), records.len());
    assert_eq!(report.rejected, 0);

    for (before, after) in records.iter().zip(next.iter()) {
        assert_eq!(before.id, after.id);
        match before.status {
            DeploymentStatus::Success | DeploymentStatus::Failed => assert_eq!(before, after),
            DeploymentStatus::Running => {
                // 65 is below the completion threshold, so it must progress
                assert_eq!(after.status, DeploymentStatus::Running);
                let (b, a) = (before.progress.unwrap(), after.progress.unwrap());
                assert!(a > b && a < 100, "progress {} -> {}", b, a);
            }
            DeploymentStatus::Pending => {
                assert!(matches!(
                    after.status,
                    DeploymentStatus::Pending | DeploymentStatus::Running
                ));
            }
        }
    }
}

#[test]
fn test_many_ticks_keep_invariants_and_cardinality() {
    let settings = FsmSettings::default();
    let inbox = SignalInbox::new();
    let sim = seeded_simulator(3);
    let mut records = demo_records();
    let mut clock = now();

    for _ in 0..200 {
        clock += chrono::Duration::seconds(3);
        let before = records.clone();
        let (next, _) = tick(&settings, &records, &inbox, Some(&sim as &dyn SignalSource), clock);

        assert_eq!(next.len(), before.len());
        for (b, a) in before.iter().zip(next.iter()) {
            assert_eq!(b.id, a.id);
            assert!(a.check_invariants().is_ok(), "{:?}", a);
            if b.is_terminal() {
                assert_eq!(b, a);
            }
            if b.status == DeploymentStatus::Running && a.status == DeploymentStatus::Running {
                assert!(a.progress >= b.progress);
            }
        }
        records = next;
    }

    // with 200 ticks every demo deployment has finished
    assert!(records.iter().all(|r| r.is_terminal()));
}

#[test]
fn test_inbox_signal_beats_simulator() {
    let settings = FsmSettings::default();
    let records = demo_records();
    let inbox = SignalInbox::new();
    inbox.push(
        "jk-587",
        Signal::Completed {
            outcome: Outcome::Failed,
            duration: Some("7m 1s".to_string()),
        },
    );
    let sim = seeded_simulator(1);

    let (next, report) = tick(&settings, &records, &inbox, Some(&sim as &dyn SignalSource), now());
    let jenkins = next.iter().find(|r| r.id == "jk-587").unwrap();
    assert_eq!(jenkins.status, DeploymentStatus::Failed);
    assert_eq!(jenkins.progress, None);
    assert_eq!(jenkins.duration.as_deref(), Some("7m 1s"));
    assert!(report.completed >= 1);
    assert!(inbox.is_empty());
}

#[test]
fn test_no_signals_no_change() {
    let settings = FsmSettings::default();
    let records = demo_records();
    let inbox = SignalInbox::new();

    let (next, report) = tick(&settings, &records, &inbox, None, now());
    assert_eq!(next, records);
    assert!(!report.changed());
}

#[test]
fn test_terminal_rejects_every_signal() {
    let settings = FsmSettings::default();
    let records = demo_records();
    let done = records.iter().find(|r| r.id == "gh-1042").unwrap();

    for signal in [
        Signal::Started { started_at: None },
        Signal::Progress { delta: 10 },
        Signal::Completed { outcome: Outcome::Failed, duration: None },
    ] {
        let err = transition(&settings, done, &signal, now()).unwrap_err();
        assert!(matches!(err, FsmError::InvalidTransition { .. }));
    }
}

#[test]
fn test_started_then_completed_reports_elapsed() {
    let settings = FsmSettings::default();
    let records = demo_records();
    let queued = records.iter().find(|r| r.id == "gh-1043").unwrap();
    assert_eq!(queued.started_at, StartedAt::Queued);

    let running = transition(&settings, queued, &Signal::Started { started_at: None }, now()).unwrap();
    assert_eq!(running.progress, Some(0));

    let finished = transition(
        &settings,
        &running,
        &Signal::Completed { outcome: Outcome::Success, duration: None },
        now() + chrono::Duration::seconds(61),
    )
    .unwrap();
    assert_eq!(finished.duration.as_deref(), Some("1m 1s"));
}

#[test]
fn test_simulator_is_deterministic_with_seed() {
    let records = demo_records();
    let running = records.iter().find(|r| r.id == "jk-587").unwrap();

    let a = seeded_simulator(99);
    let b = seeded_simulator(99);
    for _ in 0..10 {
        assert_eq!(a.next_signal(running, now()), b.next_signal(running, now()));
    }
}
