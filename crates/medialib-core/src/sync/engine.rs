use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, AssetGateway};
use crate::models::{Asset, Resource, SearchQuery, SharedCollection};

/// Upper bound on listing pages fetched in one pass
pub const MAX_LISTING_PAGES: usize = 20;

/// Newly observed assets from one successful pass
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUpdate {
    pub new_assets: Vec<Asset>,
    pub synced_at: DateTime<Utc>,
}

/// State shared with the spawned sync task
struct Shared {
    gateway: Arc<dyn AssetGateway>,
    collection: SharedCollection,
    query: SearchQuery,
    updates: mpsc::UnboundedSender<SyncUpdate>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    /// Passes currently waiting on the gateway. Manual and background passes
    /// may overlap.
    in_flight: AtomicUsize,
}

/// Counts one pass as in flight for as long as it lives
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Shared {
    /// Fetch every page of the listing. The response cache is deliberately
    /// not consulted: a sync pass wants the current remote state.
    async fn fetch_listing(&self) -> Result<Vec<Resource>, ApiError> {
        let mut query = self.query.clone();
        let mut resources = Vec::new();

        for page in 0..MAX_LISTING_PAGES {
            let response = self.gateway.search(&query).await?;
            debug!(page, count = response.resources.len(), "Listing page fetched");
            resources.extend(response.resources);

            match response.next_cursor {
                Some(cursor) if !cursor.is_empty() => query.cursor = Some(cursor),
                _ => return Ok(resources),
            }
        }

        warn!(pages = MAX_LISTING_PAGES, "Listing truncated at page limit");
        Ok(resources)
    }

    async fn run_pass(&self) -> Result<Vec<Asset>, ApiError> {
        let fetched = {
            let _in_flight = InFlight::enter(&self.in_flight);
            self.fetch_listing().await
        };

        let incoming: Vec<Asset> = fetched?.iter().map(Resource::to_asset).collect();
        let observed = incoming.len();

        // Diff and append under one write lock so ids stay unique even if a
        // delete or another pass interleaves.
        let added = self.collection.write().await.append_new(incoming);

        let synced_at = Utc::now();
        *self.last_sync.write().unwrap_or_else(PoisonError::into_inner) = Some(synced_at);
        info!(observed, added = added.len(), "Sync pass complete");

        if !added.is_empty() {
            let update = SyncUpdate {
                new_assets: added.clone(),
                synced_at,
            };
            if self.updates.send(update).is_err() {
                error!("Failed to send sync update - receiver dropped");
            }
        }
        Ok(added)
    }
}

/// Handle of the running sync task
struct SyncTask {
    handle: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
}

/// Polls the gateway and merges new assets into the shared collection.
///
/// One instance per view, started on mount and stopped on unmount.
pub struct SyncEngine {
    shared: Arc<Shared>,
    task: Option<SyncTask>,
    updates_rx: Option<mpsc::UnboundedReceiver<SyncUpdate>>,
}

impl SyncEngine {
    pub fn new(gateway: Arc<dyn AssetGateway>, collection: SharedCollection, query: SearchQuery) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                gateway,
                collection,
                query,
                updates: tx,
                last_sync: RwLock::new(None),
                in_flight: AtomicUsize::new(0),
            }),
            task: None,
            updates_rx: Some(rx),
        }
    }

    /// Take the update receiver. There is one receiver per engine.
    pub fn take_updates(&mut self) -> Option<mpsc::UnboundedReceiver<SyncUpdate>> {
        self.updates_rx.take()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    /// True while at least one pass is waiting on the gateway
    pub fn is_syncing(&self) -> bool {
        self.shared.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.shared.last_sync.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start polling: one pass right away, then one every `interval`.
    /// Does nothing if already running. Must be called within a tokio runtime.
    pub fn start_auto_sync(&mut self, interval: Duration) {
        if self.is_running() {
            debug!("Auto sync already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(Self::run_loop(shared, interval, stop_rx));

        info!(interval_secs = interval.as_secs(), "Auto sync started");
        self.task = Some(SyncTask { handle, stop_tx });
    }

    /// Stop scheduling passes. Safe to call when already stopped. A pass that
    /// is already in flight finishes and its results are still merged.
    pub fn stop_auto_sync(&mut self) {
        if let Some(task) = self.task.take() {
            // The task may have exited already; nothing to do then
            let _ = task.stop_tx.send(true);
            info!("Auto sync stopped");
        }
    }

    /// User-initiated pass. Unlike background passes, errors are returned.
    pub async fn sync_now(&self) -> Result<Vec<Asset>, ApiError> {
        self.shared.run_pass().await
    }

    async fn run_loop(shared: Arc<Shared>, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    // Runs to completion even if a stop arrives meanwhile
                    if let Err(e) = shared.run_pass().await {
                        warn!(error = %e, "Background sync pass failed, retrying next tick");
                    }
                }
            }
        }
        debug!("Sync task exited");
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.stop_auto_sync();
    }
}
