//! CORS-forwarding reverse proxy.
//!
//! Lets browser pages reach APIs that do not send CORS headers. Every
//! request goes to one fixed upstream; nothing is cached or inspected.

pub mod forward;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use reqwest::Client;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;
use url::Url;

use crate::errors::BoardError;
use crate::proxy::forward::proxy_handler;

/// Proxy options
#[derive(Debug, Clone)]
pub struct Options {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Upstream base URL
    pub target: String,

    /// Bound on each upstream round trip
    pub timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            target: "http://127.0.0.1:9090".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// State shared by proxy requests
pub struct ProxyState {
    pub client: Client,
    pub target: Url,
}

impl ProxyState {
    pub fn new(target: &str, timeout: Duration) -> Result<Self, BoardError> {
        let client = Client::builder().timeout(timeout).build()?;
        let target = Url::parse(target)?;
        Ok(Self { client, target })
    }
}

/// Build the proxy router; every path and method lands in the fallback
pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the proxy server
pub async fn serve(
    options: &Options,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), BoardError>>, BoardError> {
    let state = Arc::new(ProxyState::new(&options.target, options.timeout)?);
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting proxy on {} -> {}", addr, options.target);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| BoardError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| BoardError::ServerError(e.to_string()))
    });

    Ok(handle)
}
