//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::aggregator::Aggregator;
use crate::app::options::AppOptions;
use crate::deploy::signals::SignalSource;
use crate::deploy::simulator::DemoSimulator;
use crate::errors::BoardError;
use crate::models::record::Source;
use crate::sources::fixture::{demo_payloads, StaticSourceFetcher};
use crate::sources::http::HttpSourceFetcher;
use crate::sources::SourceFetcher;

/// Main application state
pub struct AppState {
    /// Deployment aggregator shared by workers and the HTTP server
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    /// Initialize application state
    pub fn init(options: &AppOptions) -> Result<Self, BoardError> {
        info!("Initializing application state...");

        let fetchers = build_fetchers(options)?;

        let fallback = options.simulator.clone().map(|sim_options| {
            info!("Demo simulator enabled");
            Arc::new(DemoSimulator::new(sim_options)) as Arc<dyn SignalSource>
        });

        let aggregator = Arc::new(Aggregator::new(
            options.aggregator.clone(),
            fetchers,
            fallback,
        ));

        Ok(Self { aggregator })
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), BoardError> {
        info!(
            "Shutting down application state ({} deployments tracked)...",
            self.aggregator.snapshot().len()
        );
        Ok(())
    }
}

/// One fetcher per source: HTTP when a URL is configured, demo listing otherwise
fn build_fetchers(options: &AppOptions) -> Result<Vec<Arc<dyn SourceFetcher>>, BoardError> {
    let mut fetchers: Vec<Arc<dyn SourceFetcher>> = Vec::with_capacity(Source::ALL.len());

    for source in Source::ALL {
        match options.sources.url_for(source) {
            Some(url) => {
                info!("Fetching {} deployments from {}", source, url);
                let fetcher =
                    HttpSourceFetcher::new(source, url, options.aggregator.fetch_timeout)?;
                fetchers.push(Arc::new(fetcher));
            }
            None => {
                info!("No URL configured for {}, serving demo listing", source);
                fetchers.push(Arc::new(StaticSourceFetcher::new(source, demo_payloads(source))));
            }
        }
    }

    Ok(fetchers)
}
