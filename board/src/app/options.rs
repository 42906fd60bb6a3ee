//! Application configuration options

use std::time::Duration;

use crate::aggregator::AggregatorOptions;
use crate::config::settings::{Settings, SourcesSettings};
use crate::deploy::simulator::SimulatorOptions;
use crate::proxy;
use crate::workers::{refresher, ticker};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Aggregator configuration
    pub aggregator: AggregatorOptions,

    /// Upstream listing URLs
    pub sources: SourcesSettings,

    /// Demo simulator; `None` leaves records idle without upstream signals
    pub simulator: Option<SimulatorOptions>,

    /// Run one refresh before the workers start
    pub seed_on_start: bool,

    /// Enable local HTTP server
    pub enable_socket_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Ticker worker options
    pub ticker: ticker::Options,

    /// Enable periodic refreshes
    pub enable_refresher: bool,

    /// Refresh worker options
    pub refresher: refresher::Options,

    /// Enable the CORS-forwarding proxy
    pub enable_proxy: bool,

    /// Proxy options
    pub proxy: proxy::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            aggregator: AggregatorOptions::default(),
            sources: SourcesSettings::default(),
            simulator: Some(SimulatorOptions::default()),
            seed_on_start: true,
            enable_socket_server: true,
            server: ServerOptions::default(),
            ticker: ticker::Options::default(),
            enable_refresher: true,
            refresher: refresher::Options::default(),
            enable_proxy: false,
            proxy: proxy::Options::default(),
        }
    }
}

impl AppOptions {
    /// Build options from a validated settings file
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();

        let simulator = settings.simulate.enabled.then(|| SimulatorOptions {
            seed: settings.simulate.seed,
            ..Default::default()
        });

        let proxy = proxy::Options {
            host: settings.proxy.host.clone(),
            port: settings.proxy.port,
            target: settings.proxy.target.clone().unwrap_or(defaults.proxy.target.clone()),
            timeout: Duration::from_secs(settings.proxy.timeout_secs),
        };

        Self {
            aggregator: AggregatorOptions {
                fetch_timeout: Duration::from_millis(settings.fetch_timeout_ms),
                ..Default::default()
            },
            sources: settings.sources.clone(),
            simulator,
            seed_on_start: settings.seed_on_start,
            enable_socket_server: settings.server.enabled,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            ticker: ticker::Options {
                interval: Duration::from_millis(settings.tick_interval_ms),
            },
            enable_refresher: settings.refresh_interval_secs > 0,
            refresher: refresher::Options {
                interval: Duration::from_secs(settings.refresh_interval_secs),
                ..Default::default()
            },
            enable_proxy: settings.proxy.enabled,
            proxy,
            ..defaults
        }
    }
}

/// Lifecycle options for the board
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
