//! The aggregator owns the tracked set and publishes it as snapshots.
//!
//! Writers (ticks and refresh commits) run a synchronous read-modify-write
//! inside the watch channel's `send_modify`, so every publish is a single
//! swap of an `Arc<Snapshot>` and readers never see a half-built set.
//! Upstream fetches happen before that point and hold no lock.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::outcome::{RefreshOutcome, SourceFailure};
use crate::deploy::fsm::{FsmSettings, Signal};
use crate::deploy::signals::{SignalInbox, SignalSource};
use crate::engine::merge::{self, TickReport};
use crate::engine::reconcile::{reconcile, SourceListing};
use crate::errors::BoardError;
use crate::models::payload::normalize_listing;
use crate::models::record::{DeploymentRecord, Source};
use crate::models::snapshot::{Connectivity, Snapshot};
use crate::sources::SourceFetcher;

/// Aggregator options
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// State machine settings
    pub fsm: FsmSettings,

    /// Upper bound on each upstream fetch
    pub fetch_timeout: Duration,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            fsm: FsmSettings::default(),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

/// Deployment status aggregator
pub struct Aggregator {
    options: AggregatorOptions,
    fetchers: Vec<Arc<dyn SourceFetcher>>,
    inbox: Arc<SignalInbox>,
    fallback: Option<Arc<dyn SignalSource>>,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    refresh_in_flight: AtomicBool,
}

impl Aggregator {
    /// Create an aggregator with an empty tracked set.
    ///
    /// At most one fetcher per source is kept. `fallback` is consulted by
    /// ticks when the inbox holds nothing for a record.
    pub fn new(
        options: AggregatorOptions,
        fetchers: Vec<Arc<dyn SourceFetcher>>,
        fallback: Option<Arc<dyn SignalSource>>,
    ) -> Self {
        let mut seen = HashSet::new();
        let fetchers = fetchers
            .into_iter()
            .filter(|f| {
                let first = seen.insert(f.source());
                if !first {
                    warn!("Ignoring duplicate fetcher for {}", f.source());
                }
                first
            })
            .collect();

        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::empty(Utc::now())));

        Self {
            options,
            fetchers,
            inbox: Arc::new(SignalInbox::new()),
            fallback,
            snapshot_tx,
            refresh_in_flight: AtomicBool::new(false),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Inbox for authoritative signals
    pub fn inbox(&self) -> Arc<SignalInbox> {
        self.inbox.clone()
    }

    /// Sources with a configured fetcher
    pub fn sources(&self) -> Vec<Source> {
        self.fetchers.iter().map(|f| f.source()).collect()
    }

    /// Whether a refresh is currently running
    pub fn is_refreshing(&self) -> bool {
        self.refresh_in_flight.load(Ordering::Acquire)
    }

    /// Queue an authoritative signal for a tracked, unfinished deployment.
    ///
    /// The check and the enqueue run under the publish lock, so a refresh
    /// cannot drop the id in between.
    pub fn push_signal(&self, id: &str, signal: Signal) -> Result<(), BoardError> {
        let mut result = Ok(());

        self.snapshot_tx.send_if_modified(|current| {
            result = match current.get(id) {
                None => Err(BoardError::NotFound(format!("deployment {}", id))),
                Some(record) if record.is_terminal() => Err(BoardError::Conflict(format!(
                    "deployment {} already {}",
                    id, record.status
                ))),
                Some(_) => {
                    debug!("Queued {:?} for deployment {}", signal, id);
                    self.inbox.push(id, signal);
                    Ok(())
                }
            };
            false
        });

        result
    }

    /// Run one merge tick and publish the result
    pub fn tick(&self) -> TickReport {
        let now = Utc::now();
        let mut report = TickReport::default();

        self.snapshot_tx.send_modify(|current| {
            let (records, tick_report) = merge::tick(
                &self.options.fsm,
                &current.records,
                self.inbox.as_ref(),
                self.fallback.as_deref(),
                now,
            );
            report = tick_report;

            self.inbox.retain_ids(&open_ids(&records));

            *current = Arc::new(Snapshot {
                records,
                last_updated: now,
                last_refreshed: current.last_refreshed,
                connectivity: current.connectivity.clone(),
                generation: current.generation + 1,
            });
        });

        if report.changed() || report.rejected > 0 {
            debug!(
                "Tick: {} advanced, {} completed, {} rejected",
                report.advanced, report.completed, report.rejected
            );
        }
        report
    }

    /// Resynchronize the tracked set with every upstream source.
    ///
    /// Returns `AlreadyInProgress` at once if another refresh is running.
    /// Dropping the returned future before it completes commits nothing.
    pub async fn request_refresh(&self) -> RefreshOutcome {
        let Some(_guard) = RefreshGuard::acquire(&self.refresh_in_flight) else {
            debug!("Refresh already in progress, rejecting request");
            return RefreshOutcome::AlreadyInProgress;
        };

        let refresh_id = Uuid::new_v4();
        info!(%refresh_id, "Refreshing {} sources...", self.fetchers.len());

        let listings = self.fetch_all().await;
        let now = Utc::now();
        let mut failed_sources = Vec::new();

        self.snapshot_tx.send_modify(|current| {
            let result = reconcile(&current.records, &listings);

            self.inbox.retain_ids(&open_ids(&result.records));

            info!(
                %refresh_id,
                "Reconciled: {} added, {} replaced, {} removed, {} sources failed",
                result.added.len(),
                result.replaced,
                result.removed.len(),
                result.failed_sources.len()
            );

            failed_sources = result
                .failed_sources
                .into_iter()
                .map(|(source, reason)| SourceFailure { source, reason })
                .collect();

            let connectivity = if failed_sources.is_empty() {
                Connectivity::Online
            } else {
                Connectivity::Degraded {
                    failed_sources: failed_sources.iter().map(|f| f.source).collect(),
                }
            };

            *current = Arc::new(Snapshot {
                records: result.records,
                last_updated: now,
                last_refreshed: Some(now),
                connectivity,
                generation: current.generation + 1,
            });
        });

        if failed_sources.is_empty() {
            RefreshOutcome::Ok
        } else {
            RefreshOutcome::PartialFailure { failed_sources }
        }
    }

    async fn fetch_all(&self) -> BTreeMap<Source, SourceListing> {
        let timeout = self.options.fetch_timeout;

        let fetches = self.fetchers.iter().map(|fetcher| async move {
            let source = fetcher.source();
            let listing = match tokio::time::timeout(timeout, fetcher.fetch()).await {
                Ok(Ok(payloads)) => SourceListing::Fetched(normalize_listing(source, payloads)),
                Ok(Err(e)) => {
                    warn!("Fetching {} failed: {}", source, e);
                    SourceListing::Failed(e.to_string())
                }
                Err(_) => {
                    let e = BoardError::Timeout(source);
                    warn!("{}", e);
                    SourceListing::Failed(e.to_string())
                }
            };
            (source, listing)
        });

        join_all(fetches).await.into_iter().collect()
    }
}

/// Ids that can still take a signal
fn open_ids(records: &[DeploymentRecord]) -> HashSet<&str> {
    records
        .iter()
        .filter(|r| !r.is_terminal())
        .map(|r| r.id.as_str())
        .collect()
}

/// Marks a refresh as in flight until dropped
struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
