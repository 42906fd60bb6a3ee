//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::aggregator::{Aggregator, RefreshOutcome};
use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::BoardError;
use crate::proxy;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::{refresher, ticker};

/// Run the deployment board until `shutdown_signal` resolves
pub async fn run(
    version: String,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BoardError> {
    info!("Initializing deployboard {}...", version);

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start deployboard: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, BoardError> {
    let app_state = Arc::new(AppState::init(options)?);
    shutdown_manager.with_app_state(app_state.clone())?;

    if options.seed_on_start {
        seed(app_state.aggregator.as_ref()).await;
    }

    init_ticker_worker(
        options.ticker.clone(),
        app_state.aggregator.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    if options.enable_refresher {
        init_refresh_worker(
            options.refresher.clone(),
            app_state.aggregator.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    if options.enable_socket_server {
        init_socket_server(
            options,
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )
        .await?;
    }

    if options.enable_proxy {
        init_proxy(&options.proxy, shutdown_manager, shutdown_tx.subscribe()).await?;
    }

    Ok(app_state)
}

async fn seed(aggregator: &Aggregator) {
    info!("Seeding deployments from all sources...");
    match aggregator.request_refresh().await {
        RefreshOutcome::Ok => {
            info!("Seeded {} deployments", aggregator.snapshot().len());
        }
        RefreshOutcome::PartialFailure { failed_sources } => {
            for failure in failed_sources {
                warn!("Seed skipped {}: {}", failure.source, failure.reason);
            }
        }
        RefreshOutcome::AlreadyInProgress => {}
    }
}

fn init_ticker_worker(
    options: ticker::Options,
    aggregator: Arc<Aggregator>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BoardError> {
    info!("Initializing ticker worker...");

    let ticker_handle = tokio::spawn(async move {
        ticker::run(
            &options,
            aggregator.as_ref(),
            |wait| tokio::time::sleep(wait),
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_ticker_worker_handle(ticker_handle)
}

fn init_refresh_worker(
    options: refresher::Options,
    aggregator: Arc<Aggregator>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BoardError> {
    info!("Initializing refresh worker...");

    let refresh_handle = tokio::spawn(async move {
        refresher::run(
            &options,
            aggregator.as_ref(),
            |wait| tokio::time::sleep(wait),
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_refresh_worker_handle(refresh_handle)
}

async fn init_socket_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BoardError> {
    info!("Initializing socket server...");

    let server_state = Arc::new(ServerState::new(app_state.aggregator.clone()));
    let server_handle = serve(&options.server, server_state, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_socket_server_handle(server_handle)
}

async fn init_proxy(
    options: &proxy::Options,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BoardError> {
    info!("Initializing proxy...");

    let proxy_handle = proxy::serve(options, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_proxy_handle(proxy_handle)
}

// ================================= SHUTDOWN ==================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    ticker_worker_handle: Option<JoinHandle<()>>,
    refresh_worker_handle: Option<JoinHandle<()>>,
    socket_server_handle: Option<JoinHandle<Result<(), BoardError>>>,
    proxy_handle: Option<JoinHandle<Result<(), BoardError>>>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            ticker_worker_handle: None,
            refresh_worker_handle: None,
            socket_server_handle: None,
            proxy_handle: None,
        }
    }

    fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), BoardError> {
        if self.app_state.is_some() {
            return Err(BoardError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    fn with_ticker_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), BoardError> {
        if self.ticker_worker_handle.is_some() {
            return Err(BoardError::ShutdownError("ticker_handle already set".to_string()));
        }
        self.ticker_worker_handle = Some(handle);
        Ok(())
    }

    fn with_refresh_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), BoardError> {
        if self.refresh_worker_handle.is_some() {
            return Err(BoardError::ShutdownError("refresh_handle already set".to_string()));
        }
        self.refresh_worker_handle = Some(handle);
        Ok(())
    }

    fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), BoardError>>,
    ) -> Result<(), BoardError> {
        if self.socket_server_handle.is_some() {
            return Err(BoardError::ShutdownError("server_handle already set".to_string()));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    fn with_proxy_handle(
        &mut self,
        handle: JoinHandle<Result<(), BoardError>>,
    ) -> Result<(), BoardError> {
        if self.proxy_handle.is_some() {
            return Err(BoardError::ShutdownError("proxy_handle already set".to_string()));
        }
        self.proxy_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), BoardError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), BoardError> {
        info!("Shutting down deployboard...");

        // 1. Workers that write to the aggregator
        if let Some(handle) = self.refresh_worker_handle.take() {
            handle.await.map_err(|e| BoardError::ShutdownError(e.to_string()))?;
        }
        if let Some(handle) = self.ticker_worker_handle.take() {
            handle.await.map_err(|e| BoardError::ShutdownError(e.to_string()))?;
        }

        // 2. Servers
        if let Some(handle) = self.socket_server_handle.take() {
            handle.await.map_err(|e| BoardError::ShutdownError(e.to_string()))??;
        }
        if let Some(handle) = self.proxy_handle.take() {
            handle.await.map_err(|e| BoardError::ShutdownError(e.to_string()))??;
        }

        // 3. App state
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
