use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::models::Asset;

/// Maximum concurrent downloads.
/// Keeps a large selection from opening hundreds of connections at once.
const MAX_CONCURRENT_DOWNLOADS: usize = 4;

/// Per-file download timeout in seconds
const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub asset_id: String,
    pub url: String,
    pub filename: String,
}

impl From<&Asset> for DownloadItem {
    fn from(asset: &Asset) -> Self {
        Self {
            asset_id: asset.id.clone(),
            url: asset.url.clone(),
            filename: asset.filename.clone(),
        }
    }
}

/// Client-side retrieval of asset files.
///
/// `start` returns immediately; each item succeeds or fails on its own and
/// failures are only logged.
pub trait Downloader: Send + Sync {
    fn start(&self, items: Vec<DownloadItem>);
}

/// Keep only characters that are safe in a file name
fn safe_filename(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

/// Streams files into a directory over HTTP
#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
    target_dir: PathBuf,
}

impl HttpDownloader {
    pub fn new(target_dir: PathBuf) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, target_dir })
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Download one item and return where it was written
    pub async fn download_one(&self, item: &DownloadItem) -> Result<PathBuf> {
        let response = self
            .client
            .get(&item.url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", item.url))?
            .error_for_status()
            .with_context(|| format!("Download refused for {}", item.url))?;

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", item.url))?;

        tokio::fs::create_dir_all(&self.target_dir).await?;
        let path = self
            .target_dir
            .join(safe_filename(&item.filename, &item.asset_id));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

impl Downloader for HttpDownloader {
    fn start(&self, items: Vec<DownloadItem>) {
        if items.is_empty() {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            let total = items.len();
            stream::iter(items)
                .for_each_concurrent(MAX_CONCURRENT_DOWNLOADS, |item| {
                    let this = this.clone();
                    async move {
                        match this.download_one(&item).await {
                            Ok(path) => debug!(asset = %item.asset_id, path = %path.display(), "Downloaded"),
                            Err(e) => warn!(asset = %item.asset_id, error = %e, "Download failed"),
                        }
                    }
                })
                .await;
            info!(count = total, "Download batch finished");
        });
    }
}
