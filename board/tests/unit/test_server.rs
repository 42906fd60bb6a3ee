//! HTTP API tests

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::Router;
use http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use deployboard::aggregator::{Aggregator, AggregatorOptions};
use deployboard::models::record::Source;
use deployboard::server::serve::router;
use deployboard::server::state::ServerState;
use deployboard::sources::fixture::{demo_payloads, StaticSourceFetcher};
use deployboard::sources::SourceFetcher;

fn fetchers(delay: Duration) -> (Vec<Arc<dyn SourceFetcher>>, Arc<StaticSourceFetcher>) {
    let argocd = Arc::new(
        StaticSourceFetcher::new(Source::Argocd, demo_payloads(Source::Argocd)).with_delay(delay),
    );
    let fetchers: Vec<Arc<dyn SourceFetcher>> = vec![
        Arc::new(StaticSourceFetcher::new(Source::Github, demo_payloads(Source::Github)).with_delay(delay)),
        Arc::new(StaticSourceFetcher::new(Source::Jenkins, demo_payloads(Source::Jenkins)).with_delay(delay)),
        argocd.clone(),
    ];
    (fetchers, argocd)
}

async fn seeded_app() -> (Router, Arc<Aggregator>, Arc<StaticSourceFetcher>) {
    let (fetchers, argocd) = fetchers(Duration::ZERO);
    let aggregator = Arc::new(Aggregator::new(AggregatorOptions::default(), fetchers, None));
    aggregator.request_refresh().await;
    let app = router(Arc::new(ServerState::new(aggregator.clone())));
    (app, aggregator, argocd)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (app, _, _) = seeded_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_list_and_filter() {
    let (app, _, _) = seeded_app().await;

    let (status, body) = send(&app, Method::GET, "/deployments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["connectivity"]["state"], "online");
    assert_eq!(body["deployments"][0]["id"], "gh-1042");
    assert_eq!(body["deployments"][0]["startedAt"], "2 hours ago");

    let (_, body) = send(&app, Method::GET, "/deployments?environment=production", None).await;
    assert_eq!(body["total"], 2);

    let (_, body) = send(&app, Method::GET, "/deployments?source=jenkins", None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["deployments"][0]["progress"], 65);

    let (status, _) = send(&app, Method::GET, "/deployments?source=travis", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_summary_and_single() {
    let (app, _, _) = seeded_app().await;

    let (_, summary) = send(&app, Method::GET, "/deployments/summary", None).await;
    assert_eq!(summary["total"], 4);
    assert_eq!(summary["pending"], 1);
    assert_eq!(summary["running"], 1);
    assert_eq!(summary["success"], 1);
    assert_eq!(summary["failed"], 1);

    let (status, record) = send(&app, Method::GET, "/deployments/argo-payment-318", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["duration"], "2m 15s");
    assert_eq!(record["source"], "argocd");

    let (status, body) = send(&app, Method::GET, "/deployments/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_refresh_reports_partial_failure() {
    let (app, _, argocd) = seeded_app().await;

    let (status, body) = send(&app, Method::POST, "/deployments/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ok");
    assert_eq!(body["total"], 4);

    argocd.set_failure(Some("503 from upstream".to_string()));
    let (status, body) = send(&app, Method::POST, "/deployments/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "partial-failure");
    assert_eq!(body["failedSources"][0]["source"], "argocd");
    assert_eq!(body["total"], 4);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_refresh_returns_conflict() {
    let (fetchers, _) = fetchers(Duration::from_millis(200));
    let aggregator = Arc::new(Aggregator::new(AggregatorOptions::default(), fetchers, None));
    let app = router(Arc::new(ServerState::new(aggregator)));

    let (first, second) = tokio::join!(
        send(&app, Method::POST, "/deployments/refresh", None),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            send(&app, Method::POST, "/deployments/refresh", None).await
        }
    );

    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::CONFLICT);
    assert_eq!(second.1["outcome"], "already-in-progress");
}

#[tokio::test]
async fn test_signal_endpoint() {
    let (app, aggregator, _) = seeded_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/deployments/jk-587/signals",
        Some(json!({ "type": "completed", "outcome": "success", "duration": "6m 0s" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], true);

    aggregator.tick();
    let (_, record) = send(&app, Method::GET, "/deployments/jk-587", None).await;
    assert_eq!(record["status"], "success");
    assert_eq!(record["duration"], "6m 0s");
    assert!(record.get("progress").map_or(true, Value::is_null));

    let (status, _) = send(
        &app,
        Method::POST,
        "/deployments/unknown/signals",
        Some(json!({ "type": "progress", "delta": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/deployments/jk-587/signals",
        Some(json!({ "type": "teleport" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // jk-587 finished on the tick above
    let (status, body) = send(
        &app,
        Method::POST,
        "/deployments/jk-587/signals",
        Some(json!({ "type": "progress", "delta": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("jk-587"));
}
