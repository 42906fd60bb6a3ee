//! Aggregator and refresh coordinator tests

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use deployboard::aggregator::{Aggregator, AggregatorOptions, RefreshOutcome};
use deployboard::deploy::fsm::{Outcome, Signal};
use deployboard::errors::BoardError;
use deployboard::deploy::signals::SignalSource;
use deployboard::deploy::simulator::{DemoSimulator, SimulatorOptions};
use deployboard::models::record::{DeploymentStatus, Source};
use deployboard::models::snapshot::Connectivity;
use deployboard::sources::fixture::{demo_payloads, StaticSourceFetcher};
use deployboard::sources::SourceFetcher;

struct Board {
    aggregator: Arc<Aggregator>,
    github: Arc<StaticSourceFetcher>,
    jenkins: Arc<StaticSourceFetcher>,
    argocd: Arc<StaticSourceFetcher>,
}

fn board_with(
    delay: Duration,
    fallback: Option<Arc<dyn SignalSource>>,
    options: AggregatorOptions,
) -> Board {
    let make = |source| Arc::new(StaticSourceFetcher::new(source, demo_payloads(source)).with_delay(delay));
    let github = make(Source::Github);
    let jenkins = make(Source::Jenkins);
    let argocd = make(Source::Argocd);

    let fetchers: Vec<Arc<dyn SourceFetcher>> = vec![github.clone(), jenkins.clone(), argocd.clone()];
    let aggregator = Arc::new(Aggregator::new(options, fetchers, fallback));

    Board {
        aggregator,
        github,
        jenkins,
        argocd,
    }
}

fn board() -> Board {
    board_with(Duration::ZERO, None, AggregatorOptions::default())
}

fn ids(aggregator: &Aggregator) -> Vec<String> {
    aggregator.snapshot().records.iter().map(|r| r.id.clone()).collect()
}

#[tokio::test]
async fn test_refresh_replaces_set_with_upstream() {
    let board = board();
    assert_eq!(board.aggregator.request_refresh().await, RefreshOutcome::Ok);
    assert_eq!(board.aggregator.snapshot().len(), 4);

    // github drops gh-1043 and reports a new deployment
    board.github.set_payloads(vec![
        demo_payloads(Source::Github)[0].clone(),
        json!({
            "id": "gh-1044",
            "service": "search-service",
            "environment": "staging",
            "status": "running",
            "progress": 10,
            "branch": "main",
            "commit": "ffff000",
            "author": "li.wei",
            "startedAt": "just now"
        }),
    ]);

    assert_eq!(board.aggregator.request_refresh().await, RefreshOutcome::Ok);
    let snapshot = board.aggregator.snapshot();
    assert_eq!(snapshot.len(), 4);
    assert!(snapshot.contains("gh-1044"));
    assert!(!snapshot.contains("gh-1043"));
    assert_eq!(snapshot.connectivity, Connectivity::Online);
}

#[tokio::test]
async fn test_failed_source_keeps_its_records() {
    let board = board();
    board.aggregator.request_refresh().await;
    let before = board.aggregator.snapshot();

    // github reports gh-1043 as started, jenkins drops its deployment, argocd is down
    let mut github = demo_payloads(Source::Github);
    github[1]["status"] = json!("running");
    github[1]["progress"] = json!(30);
    github[1]["startedAt"] = json!("1 minute ago");
    board.github.set_payloads(github);
    board.jenkins.set_payloads(Vec::new());
    board.argocd.set_failure(Some("connection refused".to_string()));

    let outcome = board.aggregator.request_refresh().await;
    assert_eq!(outcome.failed_sources(), vec![Source::Argocd]);

    let after = board.aggregator.snapshot();
    let updated = after.get("gh-1043").unwrap();
    assert_eq!(updated.status, DeploymentStatus::Running);
    assert_eq!(updated.progress, Some(30));
    assert_eq!(after.get("gh-1042"), before.get("gh-1042"));
    assert_eq!(
        after.get("argo-payment-318"),
        before.get("argo-payment-318")
    );
    assert!(!after.contains("jk-587"));
    assert_eq!(after.len(), 3);
    assert!(after.connectivity.is_degraded());
}

#[tokio::test]
async fn test_every_source_failing_keeps_everything() {
    let board = board();
    board.aggregator.request_refresh().await;
    let before = ids(&board.aggregator);

    for fetcher in [&board.github, &board.jenkins, &board.argocd] {
        fetcher.set_failure(Some("down".to_string()));
    }

    let outcome = board.aggregator.request_refresh().await;
    assert_eq!(outcome.failed_sources().len(), 3);
    assert_eq!(ids(&board.aggregator), before);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_refresh_is_rejected() {
    let board = board_with(Duration::from_millis(200), None, AggregatorOptions::default());
    let generation = board.aggregator.snapshot().generation;

    let (first, second) = tokio::join!(board.aggregator.request_refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        board.aggregator.request_refresh().await
    });

    assert_eq!(first, RefreshOutcome::Ok);
    assert_eq!(second, RefreshOutcome::AlreadyInProgress);
    assert_eq!(board.aggregator.snapshot().generation, generation + 1);
    assert!(!board.aggregator.is_refreshing());

    // the guard is released, so a later refresh runs
    assert_eq!(board.aggregator.request_refresh().await, RefreshOutcome::Ok);
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_times_out() {
    let options = AggregatorOptions {
        fetch_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let board = board_with(Duration::from_millis(500), None, options);

    let outcome = board.aggregator.request_refresh().await;
    assert_eq!(outcome.failed_sources(), Source::ALL.to_vec());
    assert!(board.aggregator.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tick_during_refresh_is_not_lost() {
    let board = board_with(Duration::from_millis(200), None, AggregatorOptions::default());
    board.aggregator.request_refresh().await;
    let generation = board.aggregator.snapshot().generation;

    board.jenkins.set_failure(Some("stalled".to_string()));
    board.aggregator.push_signal("jk-587", Signal::Progress { delta: 5 }).unwrap();

    let (outcome, report) = tokio::join!(board.aggregator.request_refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(board.aggregator.is_refreshing());
        board.aggregator.tick()
    });
    assert_eq!(report.advanced, 1);
    assert_eq!(outcome.failed_sources(), vec![Source::Jenkins]);

    // jenkins failed, so the ticked record survives the commit
    let snapshot = board.aggregator.snapshot();
    assert_eq!(snapshot.get("jk-587").unwrap().progress, Some(70));
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot.generation, generation + 2);
}

#[tokio::test]
async fn test_ticks_never_change_cardinality() {
    let sim: Arc<dyn SignalSource> = Arc::new(DemoSimulator::new(SimulatorOptions {
        seed: Some(11),
        ..Default::default()
    }));
    let board = board_with(Duration::ZERO, Some(sim), AggregatorOptions::default());
    board.aggregator.request_refresh().await;
    let before = ids(&board.aggregator);

    for _ in 0..50 {
        board.aggregator.tick();
        assert_eq!(ids(&board.aggregator), before);
        for record in &board.aggregator.snapshot().records {
            assert!(record.check_invariants().is_ok(), "{:?}", record);
        }
    }

    let success = board.aggregator.snapshot().get("gh-1042").cloned().unwrap();
    assert_eq!(success.status, DeploymentStatus::Success);
    assert_eq!(success.duration.as_deref(), Some("4m 32s"));
}

#[tokio::test]
async fn test_signals_for_dropped_ids_are_discarded() {
    let board = board();
    board.aggregator.request_refresh().await;
    board
        .aggregator
        .push_signal("gh-1043", Signal::Started { started_at: None })
        .unwrap();

    board.github.set_payloads(Vec::new());
    board.aggregator.request_refresh().await;

    assert!(board.aggregator.inbox().is_empty());
    assert!(board
        .aggregator
        .push_signal("gh-1043", Signal::Started { started_at: None })
        .is_err());
}

#[tokio::test]
async fn test_readers_keep_their_snapshot() {
    let board = board();
    board.aggregator.request_refresh().await;
    let held = board.aggregator.snapshot();

    board.github.set_payloads(Vec::new());
    board.aggregator.request_refresh().await;

    assert_eq!(held.len(), 4);
    assert_eq!(board.aggregator.snapshot().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_refresh_commits_nothing() {
    let board = board_with(Duration::from_millis(500), None, AggregatorOptions::default());
    let generation = board.aggregator.snapshot().generation;

    let cancelled =
        tokio::time::timeout(Duration::from_millis(100), board.aggregator.request_refresh()).await;
    assert!(cancelled.is_err());
    assert_eq!(board.aggregator.snapshot().generation, generation);
    assert!(board.aggregator.snapshot().is_empty());
    assert!(!board.aggregator.is_refreshing());

    assert_eq!(board.aggregator.request_refresh().await, RefreshOutcome::Ok);
    assert_eq!(board.aggregator.snapshot().generation, generation + 1);
}

#[tokio::test]
async fn test_signals_for_finished_deployments_are_rejected() {
    let board = board();
    board.aggregator.request_refresh().await;

    for _ in 0..100 {
        let pushed = board.aggregator.push_signal(
            "gh-1042",
            Signal::Completed {
                outcome: Outcome::Failed,
                duration: None,
            },
        );
        assert!(matches!(pushed, Err(BoardError::Conflict(_))));
        board.aggregator.tick();
    }
    board.aggregator.request_refresh().await;

    assert_eq!(board.aggregator.inbox().pending_for("gh-1042"), 0);
    assert!(board.aggregator.inbox().is_empty());
}

#[tokio::test]
async fn test_leftover_signals_dropped_once_finished() {
    let board = board();
    board.aggregator.request_refresh().await;

    board
        .aggregator
        .push_signal(
            "jk-587",
            Signal::Completed {
                outcome: Outcome::Success,
                duration: None,
            },
        )
        .unwrap();
    board.aggregator.push_signal("jk-587", Signal::Progress { delta: 5 }).unwrap();
    assert_eq!(board.aggregator.inbox().pending_for("jk-587"), 2);

    board.aggregator.tick();
    let snapshot = board.aggregator.snapshot();
    assert_eq!(snapshot.get("jk-587").unwrap().status, DeploymentStatus::Success);
    assert_eq!(board.aggregator.inbox().pending_for("jk-587"), 0);
}
