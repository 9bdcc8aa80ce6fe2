use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::CacheStore;
use crate::models::SearchQuery;

/// Entries older than this are never served.
pub const CACHE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self::new_at(data, Utc::now())
    }

    pub fn new_at(data: T, cached_at: DateTime<Utc>) -> Self {
        Self { data, cached_at }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Includes negative ages from clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }

    /// Stale strictly after the TTL; an entry exactly TTL old is still served.
    pub fn is_stale_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.cached_at > ttl
    }
}

/// Canonical cache key for a listing query.
///
/// Every field takes part, so queries that differ only in page size or cursor
/// never share an entry. The expression is length-prefixed so a '|' inside it
/// cannot make two different queries produce the same key.
pub fn cache_key(query: &SearchQuery) -> String {
    format!(
        "search|{}:{}|{}|{}",
        query.expression.len(),
        query.expression,
        query.max_results,
        query.cursor.as_deref().unwrap_or("")
    )
}

pub struct ResponseCache {
    store: Box<dyn CacheStore>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self {
            store,
            ttl: Duration::minutes(CACHE_TTL_MINUTES),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    /// Look up `key` as of `now`. Missing, unreadable, corrupt and stale
    /// entries are all a miss.
    pub fn get_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let contents = match self.store.read(key) {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                debug!(cache = key, error = %e, "Failed to read cache entry");
                return None;
            }
        };

        let cached: CachedData<T> = match serde_json::from_str(&contents) {
            Ok(cached) => cached,
            Err(e) => {
                debug!(cache = key, error = %e, "Failed to parse cache entry");
                return None;
            }
        };

        if cached.is_stale_at(now, self.ttl) {
            debug!(cache = key, age = %cached.age_display(), "Cache entry expired");
            return None;
        }
        Some(cached.data)
    }

    pub fn put<T: Serialize>(&self, key: &str, response: &T) {
        self.put_at(key, response, Utc::now())
    }

    /// Store `response` under `key`. Never fails: the cache is an
    /// optimization, so write errors are logged and dropped.
    pub fn put_at<T: Serialize>(&self, key: &str, response: &T, now: DateTime<Utc>) {
        let cached = CachedData::new_at(response, now);
        let contents = match serde_json::to_string(&cached) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(cache = key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };
        if let Err(e) = self.store.write(key, &contents) {
            warn!(cache = key, error = %e, "Failed to write cache entry");
        }
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        self.store.clear()
    }
}

// ============================================================================
// Tests
// ============================================================================
