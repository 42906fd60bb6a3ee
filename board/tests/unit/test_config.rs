//! Settings and options tests

use std::time::Duration;

use tokio_test::assert_ok;

use deployboard::app::options::AppOptions;
use deployboard::config::settings::Settings;

#[tokio::test]
async fn test_settings_file_round_trip() {
    let path = std::env::temp_dir().join(format!("deployboard-{}.json", uuid::Uuid::new_v4()));
    assert_ok!(
        tokio::fs::write(&path, r#"{ "server": { "port": 9191 }, "refresh_interval_secs": 0 }"#).await
    );

    let settings = assert_ok!(Settings::load(&path).await);
    assert_eq!(settings.server.port, 9191);
    assert_eq!(settings.refresh_interval_secs, 0);

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn test_malformed_settings_file_is_an_error() {
    let path = std::env::temp_dir().join(format!("deployboard-{}.json", uuid::Uuid::new_v4()));
    assert_ok!(tokio::fs::write(&path, "{ not json").await);

    assert!(Settings::load(&path).await.is_err());
    let _ = tokio::fs::remove_file(&path).await;
}

#[test]
fn test_options_follow_settings() {
    let settings: Settings = serde_json::from_str(
        r#"{
            "tick_interval_ms": 1000,
            "fetch_timeout_ms": 250,
            "simulate": { "seed": 5 },
            "proxy": { "enabled": true, "target": "https://api.example.com", "port": 9000 }
        }"#,
    )
    .unwrap();
    assert_ok!(settings.validate());

    let options = AppOptions::from_settings(&settings);
    assert_eq!(options.ticker.interval, Duration::from_secs(1));
    assert_eq!(options.aggregator.fetch_timeout, Duration::from_millis(250));
    assert_eq!(options.simulator.map(|s| s.seed), Some(Some(5)));
    assert!(options.enable_proxy);
    assert_eq!(options.proxy.target, "https://api.example.com");
    assert_eq!(options.proxy.port, 9000);
    assert!(options.enable_refresher);
}
