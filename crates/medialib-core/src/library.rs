//! Controller for one library view.
//!
//! `MediaLibrary` owns the state a view needs (collection, selection, filter
//! pipeline, render window, search debouncer, response cache and sync
//! engine) and exposes the operations the UI layer drives. It is not a
//! global: create one per view and drop it on unmount.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::{ApiError, AssetGateway};
use crate::cache::{cache_key, ResponseCache};
use crate::filter::{DateRange, FilterCriteria, FilterPipeline, SortDirection, SortKey};
use crate::models::{Asset, AssetCollection, MetadataEdit, Resource, SearchQuery, SearchResponse, SharedCollection};
use crate::render::{RenderWindow, ScrollMetrics};
use crate::selection::{BulkAction, BulkOperations, BulkOutcome, Downloader, SelectionSet};
use crate::sync::{SyncEngine, SyncUpdate};
use crate::timing::{Debouncer, SEARCH_DEBOUNCE};

/// Snapshot handed to the renderer
#[derive(Debug, Clone)]
pub struct LibraryView {
    pub filtered: Arc<Vec<Asset>>,
    pub visible_count: usize,
}

impl LibraryView {
    /// The assets to materialize
    pub fn displayed(&self) -> &[Asset] {
        &self.filtered[..self.visible_count.min(self.filtered.len())]
    }

    pub fn total(&self) -> usize {
        self.filtered.len()
    }

    pub fn has_more(&self) -> bool {
        self.visible_count < self.filtered.len()
    }
}

pub struct MediaLibrary {
    gateway: Arc<dyn AssetGateway>,
    collection: SharedCollection,
    selection: SelectionSet,
    criteria: FilterCriteria,
    pipeline: FilterPipeline,
    window: RenderWindow,
    search: Debouncer<String>,
    cache: ResponseCache,
    sync: SyncEngine,
    sync_interval: Duration,
    updates_rx: Option<mpsc::UnboundedReceiver<SyncUpdate>>,
    bulk: BulkOperations,
}

impl MediaLibrary {
    /// `listing` is the query the sync engine polls; `sync_interval` is used
    /// by `start_sync`.
    pub fn new(
        gateway: Arc<dyn AssetGateway>,
        downloader: Arc<dyn Downloader>,
        cache: ResponseCache,
        listing: SearchQuery,
        sync_interval: Duration,
    ) -> Self {
        let collection = AssetCollection::new().into_shared();
        let mut sync = SyncEngine::new(Arc::clone(&gateway), Arc::clone(&collection), listing);
        let updates_rx = sync.take_updates();

        Self {
            bulk: BulkOperations::new(Arc::clone(&gateway), downloader),
            gateway,
            collection,
            selection: SelectionSet::new(),
            criteria: FilterCriteria::default(),
            pipeline: FilterPipeline::new(),
            window: RenderWindow::new(),
            search: Debouncer::new(SEARCH_DEBOUNCE),
            cache,
            sync,
            sync_interval,
            updates_rx,
        }
    }

    pub fn collection(&self) -> &SharedCollection {
        &self.collection
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Number of times the filtered view has been recomputed
    pub fn filter_recomputations(&self) -> u64 {
        self.pipeline.recompute_count()
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Begin auto sync (view mounted). Idempotent.
    pub fn start_sync(&mut self) {
        self.sync.start_auto_sync(self.sync_interval);
    }

    /// Stop auto sync (view unmounted). Idempotent.
    pub fn stop_sync(&mut self) {
        self.sync.stop_auto_sync();
    }

    pub fn is_auto_syncing(&self) -> bool {
        self.sync.is_running()
    }

    /// Manual sync. Returns the newly merged assets; errors are surfaced.
    /// The same assets are also reported by the next `poll`.
    pub async fn sync_now(&mut self) -> Result<Vec<Asset>, ApiError> {
        let added = self.sync.sync_now().await?;
        self.refresh().await;
        Ok(added)
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.sync.last_sync_time()
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.is_syncing()
    }

    fn drain_updates(&mut self) -> Vec<Asset> {
        let mut arrived = Vec::new();
        if let Some(rx) = self.updates_rx.as_mut() {
            while let Ok(update) = rx.try_recv() {
                debug!(count = update.new_assets.len(), "Sync update received");
                arrived.extend(update.new_assets);
            }
        }
        arrived
    }

    /// Called once per UI loop iteration: applies pending sync updates, a due
    /// search term and a throttled scroll position. Returns the assets that
    /// arrived since the last poll.
    pub async fn poll(&mut self, now: Instant) -> Vec<Asset> {
        let arrived = self.drain_updates();

        if let Some(term) = self.search.poll(now) {
            debug!(search = %term, "Applying search term");
            self.criteria.search = term;
            self.window.reset();
        }

        // Memoized: only recomputes if the collection or criteria changed
        let len = self.refresh().await.len();
        self.window.poll_trailing(len, now);
        arrived
    }

    /// Sleep until the pending search term is due. Pending forever when no
    /// term is waiting.
    pub async fn search_ready(&self) {
        self.search.ready().await
    }

    // ------------------------------------------------------------------
    // Filtering and rendering
    // ------------------------------------------------------------------

    /// Queue a new search term. Applied by `poll` once typing settles.
    pub fn set_search_term(&mut self, term: impl Into<String>, now: Instant) {
        self.search.push(term.into(), now);
    }

    pub fn set_date_range(&mut self, range: DateRange) {
        if self.criteria.date_range != range {
            self.criteria.date_range = range;
            self.window.reset();
        }
    }

    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        if self.criteria.sort_key != key || self.criteria.direction != direction {
            self.criteria.sort_key = key;
            self.criteria.direction = direction;
            self.window.reset();
        }
    }

    /// Column-header style sort toggle
    pub fn toggle_sort(&mut self, key: SortKey) {
        self.criteria.toggle_sort(key);
        self.window.reset();
    }

    /// Run the pipeline if its inputs changed and re-fit the window
    async fn refresh(&mut self) -> Arc<Vec<Asset>> {
        let collection = Arc::clone(&self.collection);
        let assets = collection.read().await;
        let filtered = self.pipeline.run(&assets, &self.criteria, Utc::now());
        self.window.reclamp(filtered.len());
        filtered
    }

    pub async fn view(&mut self) -> LibraryView {
        let filtered = self.refresh().await;
        LibraryView {
            filtered,
            visible_count: self.window.visible_count(),
        }
    }

    /// Returns true if more items became visible
    pub async fn on_scroll(&mut self, metrics: ScrollMetrics, now: Instant) -> bool {
        let len = self.refresh().await.len();
        self.window.on_scroll(metrics, len, now)
    }

    pub async fn load_more(&mut self) -> bool {
        let len = self.refresh().await.len();
        self.window.load_more(len)
    }

    // ------------------------------------------------------------------
    // Selection and bulk operations
    // ------------------------------------------------------------------

    /// Toggle an asset's selection. Unknown ids are ignored and stay unselected.
    pub async fn toggle_selection(&mut self, id: &str) -> bool {
        if !self.collection.read().await.contains(id) {
            return false;
        }
        self.selection.toggle(id)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Select every currently displayed asset
    pub async fn select_all_visible(&mut self) {
        let view = self.view().await;
        self.selection.select_all(view.displayed().iter().map(|a| a.id.clone()));
    }

    /// Apply `action` to the current selection.
    ///
    /// On a precondition error nothing changes, the selection included.
    pub async fn apply_bulk(&mut self, action: BulkAction) -> Result<BulkOutcome, ApiError> {
        let ids = self.selection.ids().to_vec();
        let outcome = self.bulk.apply(action, &ids, &self.collection).await?;
        self.after_bulk(action).await;
        info!(?action, affected = outcome.affected, "Bulk action applied");
        Ok(outcome)
    }

    /// Delete a single asset, selected or not
    pub async fn delete_asset(&mut self, id: &str) -> Result<BulkOutcome, ApiError> {
        let ids = vec![id.to_string()];
        let outcome = self.bulk.apply(BulkAction::Delete, &ids, &self.collection).await?;
        self.after_bulk(BulkAction::Delete).await;
        Ok(outcome)
    }

    async fn after_bulk(&mut self, action: BulkAction) {
        if action == BulkAction::Delete {
            let collection = Arc::clone(&self.collection);
            let assets = collection.read().await;
            self.selection.retain(|id| assets.contains(id));
        }
        self.refresh().await;
    }

    // ------------------------------------------------------------------
    // Listing through the cache
    // ------------------------------------------------------------------

    /// User-triggered listing. Served from the response cache when a fresh
    /// entry exists, otherwise fetched and cached. Listed assets that are not
    /// known yet are merged into the collection.
    pub async fn browse(&mut self, query: &SearchQuery) -> Result<SearchResponse, ApiError> {
        let key = cache_key(query);
        let response = match self.cache.get::<SearchResponse>(&key) {
            Some(cached) => {
                debug!(cache = %key, "Listing served from cache");
                cached
            }
            None => {
                let fetched = self.gateway.search(query).await?;
                self.cache.put(&key, &fetched);
                fetched
            }
        };

        let incoming: Vec<Asset> = response.resources.iter().map(Resource::to_asset).collect();
        self.collection.write().await.append_new(incoming);
        self.refresh().await;
        Ok(response)
    }

    pub fn clear_cache(&self) -> anyhow::Result<()> {
        self.cache.clear()
    }

    // ------------------------------------------------------------------
    // Single-asset edits
    // ------------------------------------------------------------------

    /// Add a finished upload. Returns false if the id is already known.
    pub async fn add_uploaded(&mut self, asset: Asset) -> bool {
        let inserted = self.collection.write().await.insert(asset);
        if inserted {
            self.refresh().await;
        }
        inserted
    }

    pub async fn edit_metadata(&mut self, id: &str, edit: MetadataEdit) -> bool {
        let edited = self.collection.write().await.apply_edit(id, edit);
        if edited {
            self.refresh().await;
        }
        edited
    }

    /// Returns the new favorite state, or None for an unknown id
    pub async fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let mut assets = self.collection.write().await;
        let asset = assets.get_mut(id)?;
        asset.flags.favorite = !asset.flags.favorite;
        Some(asset.flags.favorite)
    }

    pub async fn toggle_featured(&mut self, id: &str) -> Option<bool> {
        let mut assets = self.collection.write().await;
        let asset = assets.get_mut(id)?;
        asset.flags.featured = !asset.flags.featured;
        Some(asset.flags.featured)
    }
}
