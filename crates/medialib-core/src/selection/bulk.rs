use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::download::{DownloadItem, Downloader};
use crate::api::{ApiError, AssetGateway};
use crate::models::{AssetCollection, AssetFlags, SharedCollection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Favorite,
    Archive,
    Download,
    Delete,
}

impl BulkAction {
    pub fn past_tense(&self) -> &'static str {
        match self {
            BulkAction::Favorite => "Favorited",
            BulkAction::Archive => "Archived",
            BulkAction::Download => "Downloading",
            BulkAction::Delete => "Deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkStatus {
    Completed,
    /// The gateway confirmed some ids and reported the rest as not found.
    /// Treated as a normal result.
    Partial { not_found: Vec<String> },
    /// The remote call failed. Local changes were still applied.
    Failed { message: String },
}

/// Completion signal of a bulk operation, for the UI to render a toast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub action: BulkAction,
    pub affected: usize,
    pub status: BulkStatus,
}

impl BulkOutcome {
    fn completed(action: BulkAction, affected: usize) -> Self {
        Self {
            action,
            affected,
            status: BulkStatus::Completed,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, BulkStatus::Failed { .. })
    }

    pub fn toast_message(&self) -> String {
        let noun = if self.affected == 1 { "asset" } else { "assets" };
        match &self.status {
            BulkStatus::Completed => {
                format!("{} {} {}", self.action.past_tense(), self.affected, noun)
            }
            BulkStatus::Partial { not_found } if not_found.is_empty() => {
                format!("{} {} {}", self.action.past_tense(), self.affected, noun)
            }
            BulkStatus::Partial { not_found } => format!(
                "{} {} {} ({} already gone from the store)",
                self.action.past_tense(),
                self.affected,
                noun,
                not_found.len()
            ),
            BulkStatus::Failed { message } => message.clone(),
        }
    }
}

/// Applies bulk actions to a set of asset ids.
pub struct BulkOperations {
    gateway: Arc<dyn AssetGateway>,
    downloader: Arc<dyn Downloader>,
}

impl BulkOperations {
    pub fn new(gateway: Arc<dyn AssetGateway>, downloader: Arc<dyn Downloader>) -> Self {
        Self { gateway, downloader }
    }

    /// Run `action` over `ids`. Ids not present in the collection are ignored.
    ///
    /// Only a precondition failure (missing credential) is returned as an
    /// error; in that case nothing was changed.
    pub async fn apply(
        &self,
        action: BulkAction,
        ids: &[String],
        collection: &SharedCollection,
    ) -> Result<BulkOutcome, ApiError> {
        match action {
            BulkAction::Favorite => {
                let mut assets = collection.write().await;
                Ok(Self::mark(action, ids, &mut assets, |f| f.favorite = true))
            }
            BulkAction::Archive => {
                let mut assets = collection.write().await;
                Ok(Self::mark(action, ids, &mut assets, |f| f.archived = true))
            }
            BulkAction::Download => {
                let assets = collection.read().await;
                Ok(self.download(ids, &assets))
            }
            BulkAction::Delete => self.delete(ids, collection).await,
        }
    }

    fn mark(
        action: BulkAction,
        ids: &[String],
        assets: &mut AssetCollection,
        set: impl Fn(&mut AssetFlags),
    ) -> BulkOutcome {
        let mut affected = 0;
        for id in ids {
            if let Some(asset) = assets.get_mut(id) {
                set(&mut asset.flags);
                affected += 1;
            }
        }
        debug!(?action, affected, "Flags updated");
        BulkOutcome::completed(action, affected)
    }

    fn download(&self, ids: &[String], assets: &AssetCollection) -> BulkOutcome {
        let items: Vec<DownloadItem> = ids
            .iter()
            .filter_map(|id| assets.get(id))
            .map(DownloadItem::from)
            .collect();
        let affected = items.len();
        self.downloader.start(items);
        BulkOutcome::completed(BulkAction::Download, affected)
    }

    /// Delete `ids` remotely in one batch and locally in every case.
    ///
    /// Assets without a remote id are removed without a remote call. The
    /// local removal covers every targeted asset whatever the gateway
    /// confirmed; if the gateway call fails outright the outcome is `Failed`
    /// so the UI can say the asset may come back on the next sync.
    async fn delete(&self, ids: &[String], collection: &SharedCollection) -> Result<BulkOutcome, ApiError> {
        let (targets, remote_ids) = {
            let assets = collection.read().await;
            let mut seen = HashSet::new();
            let targets: Vec<String> = ids
                .iter()
                .filter(|id| assets.contains(id) && seen.insert(id.as_str()))
                .cloned()
                .collect();
            let remote_ids: Vec<String> = targets
                .iter()
                .filter_map(|id| assets.get(id))
                .filter(|a| !a.is_local_only())
                .filter_map(|a| a.remote_id.clone())
                .collect();
            (targets, remote_ids)
        };

        if targets.is_empty() {
            return Ok(BulkOutcome::completed(BulkAction::Delete, 0));
        }

        let status = if remote_ids.is_empty() {
            debug!(count = targets.len(), "Deleting local-only assets");
            BulkStatus::Completed
        } else {
            match self.gateway.batch_delete(&remote_ids).await {
                Ok(resp) if resp.is_partial() => {
                    info!(
                        confirmed = resp.confirmed_count(),
                        not_found = resp.not_found.len(),
                        "Batch delete partially confirmed"
                    );
                    BulkStatus::Partial {
                        not_found: resp.not_found,
                    }
                }
                Ok(resp) => {
                    info!(confirmed = resp.confirmed_count(), "Batch delete confirmed");
                    BulkStatus::Completed
                }
                Err(e) if e.is_precondition() => return Err(e),
                Err(e) => {
                    warn!(error = %e, count = remote_ids.len(), "Remote delete failed, removing locally anyway");
                    BulkStatus::Failed {
                        message: format!(
                            "Removed locally, but remote deletion failed ({}). The asset may reappear after the next sync.",
                            e
                        ),
                    }
                }
            }
        };

        let removed = collection.write().await.remove_ids(&targets);
        Ok(BulkOutcome {
            action: BulkAction::Delete,
            affected: removed.len(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::RwLock;

    use crate::models::{Asset, BatchDeleteResponse, SearchQuery, SearchResponse};

    #[derive(Default)]
    struct FakeGateway {
        calls: Mutex<Vec<Vec<String>>>,
        not_found: Vec<String>,
        fail: Option<fn() -> ApiError>,
    }

    #[async_trait]
    impl AssetGateway for FakeGateway {
        async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, ApiError> {
            Ok(SearchResponse::default())
        }

        async fn batch_delete(&self, remote_ids: &[String]) -> Result<BatchDeleteResponse, ApiError> {
            self.calls.lock().unwrap().push(remote_ids.to_vec());
            if let Some(fail) = self.fail {
                return Err(fail());
            }
            let deleted: BTreeMap<String, String> = remote_ids
                .iter()
                .map(|id| {
                    let status = if self.not_found.contains(id) { "not_found" } else { "deleted" };
                    (id.clone(), status.to_string())
                })
                .collect();
            Ok(BatchDeleteResponse {
                deleted,
                not_found: Vec::new(),
                partial: false,
            }
            .normalize())
        }
    }

    #[derive(Default)]
    struct RecordingDownloader {
        started: Mutex<Vec<DownloadItem>>,
    }

    impl Downloader for RecordingDownloader {
        fn start(&self, items: Vec<DownloadItem>) {
            self.started.lock().unwrap().extend(items);
        }
    }

    fn remote(id: &str) -> Asset {
        Asset::local(id, format!("https://cdn.example.com/{id}.png"), format!("{id}.png"))
            .with_remote_id(format!("portfolios/{id}"))
    }

    fn shared(assets: Vec<Asset>) -> SharedCollection {
        Arc::new(RwLock::new(AssetCollection::from_assets(assets)))
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn ops(gateway: Arc<FakeGateway>) -> BulkOperations {
        BulkOperations::new(gateway, Arc::new(RecordingDownloader::default()))
    }

    #[tokio::test]
    async fn test_partial_delete_removes_every_target_with_one_call() {
        let gateway = Arc::new(FakeGateway {
            not_found: vec!["portfolios/c".to_string()],
            ..Default::default()
        });
        let collection = shared(vec![remote("a"), remote("b"), remote("c"), remote("keep")]);

        let outcome = ops(gateway.clone())
            .apply(BulkAction::Delete, &ids(&["a", "b", "c"]), &collection)
            .await
            .unwrap();

        assert_eq!(outcome.affected, 3);
        assert_eq!(
            outcome.status,
            BulkStatus::Partial {
                not_found: vec!["portfolios/c".to_string()]
            }
        );
        assert_eq!(gateway.calls.lock().unwrap().len(), 1);
        assert_eq!(gateway.calls.lock().unwrap()[0].len(), 3);

        let remaining = collection.read().await;
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains("keep"));
    }

    #[tokio::test]
    async fn test_total_failure_still_removes_locally_and_reports() {
        let gateway = Arc::new(FakeGateway {
            fail: Some(|| ApiError::ServerError("boom".to_string())),
            ..Default::default()
        });
        let collection = shared(vec![remote("a"), remote("b")]);

        let outcome = ops(gateway)
            .apply(BulkAction::Delete, &ids(&["a", "b"]), &collection)
            .await
            .unwrap();

        assert!(outcome.is_failure());
        assert_eq!(outcome.affected, 2);
        assert!(outcome.toast_message().contains("may reappear"));
        assert!(collection.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_changes_nothing() {
        let gateway = Arc::new(FakeGateway {
            fail: Some(|| ApiError::MissingCredential),
            ..Default::default()
        });
        let collection = shared(vec![remote("a")]);

        let err = ops(gateway)
            .apply(BulkAction::Delete, &ids(&["a"]), &collection)
            .await
            .unwrap_err();

        assert!(err.is_precondition());
        assert_eq!(collection.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_local_only_assets_skip_the_gateway() {
        let gateway = Arc::new(FakeGateway::default());
        let local = Asset::local("draft", "blob:1", "draft.png");
        let collection = shared(vec![local, remote("a")]);

        let outcome = ops(gateway.clone())
            .apply(BulkAction::Delete, &ids(&["draft"]), &collection)
            .await
            .unwrap();
        assert_eq!(outcome.status, BulkStatus::Completed);
        assert!(gateway.calls.lock().unwrap().is_empty());

        // Mixed: only the remote id is sent
        collection.write().await.insert(Asset::local("draft2", "blob:2", "d2.png"));
        ops(gateway.clone())
            .apply(BulkAction::Delete, &ids(&["draft2", "a"]), &collection)
            .await
            .unwrap();
        assert_eq!(gateway.calls.lock().unwrap()[0], vec!["portfolios/a".to_string()]);
        assert!(collection.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_favorite_and_archive_are_local() {
        let gateway = Arc::new(FakeGateway::default());
        let collection = shared(vec![remote("a"), remote("b")]);
        let ops = ops(gateway.clone());

        let fav = ops
            .apply(BulkAction::Favorite, &ids(&["a", "missing"]), &collection)
            .await
            .unwrap();
        ops.apply(BulkAction::Archive, &ids(&["a", "b"]), &collection)
            .await
            .unwrap();

        assert_eq!(fav.affected, 1);
        assert_eq!(fav.toast_message(), "Favorited 1 asset");
        let assets = collection.read().await;
        assert!(assets.get("a").unwrap().flags.favorite);
        assert!(!assets.get("b").unwrap().flags.favorite);
        assert!(assets.get("b").unwrap().flags.archived);
        assert!(gateway.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_partial_toast_names_only_real_misses() {
        let outcome = BulkOutcome {
            action: BulkAction::Delete,
            affected: 2,
            status: BulkStatus::Partial { not_found: Vec::new() },
        };
        assert_eq!(outcome.toast_message(), "Deleted 2 assets");

        let outcome = BulkOutcome {
            status: BulkStatus::Partial {
                not_found: vec!["portfolios/c".to_string()],
            },
            ..outcome
        };
        assert_eq!(outcome.toast_message(), "Deleted 2 assets (1 already gone from the store)");
    }

    #[tokio::test]
    async fn test_download_hands_every_selected_asset_to_downloader() {
        let downloader = Arc::new(RecordingDownloader::default());
        let ops = BulkOperations::new(Arc::new(FakeGateway::default()), downloader.clone());
        let collection = shared(vec![remote("a"), remote("b")]);

        let outcome = ops
            .apply(BulkAction::Download, &ids(&["b", "a"]), &collection)
            .await
            .unwrap();

        assert_eq!(outcome.affected, 2);
        let started = downloader.started.lock().unwrap();
        assert_eq!(started[0].asset_id, "b");
        assert_eq!(started[1].url, "https://cdn.example.com/a.png");
    }
}
