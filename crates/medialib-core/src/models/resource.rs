// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::title_from_filename;
use super::{Asset, AssetFlags, Dimensions};

/// Status string the gateway reports for ids it could not find.
pub const STATUS_NOT_FOUND: &str = "not_found";

/// Parameters of a listing/search call. Also the source of the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub expression: String,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none", rename = "next_cursor")]
    pub cursor: Option<String>,
}

impl SearchQuery {
    pub fn new(expression: impl Into<String>, max_results: u32) -> Self {
        Self {
            expression: expression.into(),
            max_results,
            cursor: None,
        }
    }

    /// Query for everything inside a folder
    pub fn folder(folder: &str, max_results: u32) -> Self {
        Self::new(format!("folder:{}", folder), max_results)
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceContext {
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
}

/// An asset as the gateway describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub asset_id: Option<String>,
    pub public_id: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub secure_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: Option<ResourceContext>,
}

impl Resource {
    /// Local id for this resource: the gateway's asset id when it has one,
    /// otherwise its public id.
    pub fn local_id(&self) -> String {
        self.asset_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.public_id.clone())
    }

    fn context_value(&self, key: &str) -> String {
        self.context
            .as_ref()
            .and_then(|c| c.custom.get(key))
            .cloned()
            .unwrap_or_default()
    }

    fn display_filename(&self) -> String {
        let base = self
            .filename
            .clone()
            .unwrap_or_else(|| self.public_id.rsplit('/').next().unwrap_or_default().to_string());
        match &self.format {
            Some(ext) if !ext.is_empty() && !base.ends_with(&format!(".{}", ext)) => {
                format!("{}.{}", base, ext)
            }
            _ => base,
        }
    }

    fn mime_type(&self) -> String {
        let kind = self.resource_type.as_deref().unwrap_or("image");
        match self.format.as_deref() {
            Some("jpg") => format!("{}/jpeg", kind),
            Some("svg") => "image/svg+xml".to_string(),
            Some(ext) if !ext.is_empty() => format!("{}/{}", kind, ext),
            _ => format!("{}/*", kind),
        }
    }

    pub fn to_asset(&self) -> Asset {
        let filename = self.display_filename();
        let dimensions = match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Dimensions { width, height }),
            _ => None,
        };
        Asset {
            id: self.local_id(),
            remote_id: Some(self.public_id.clone()),
            url: self
                .secure_url
                .clone()
                .or_else(|| self.url.clone())
                .unwrap_or_default(),
            title: title_from_filename(&filename),
            filename,
            byte_size: self.bytes,
            mime_type: self.mime_type(),
            dimensions,
            uploaded_at: self.created_at,
            alt_text: self.context_value("alt"),
            caption: self.context_value("caption"),
            description: String::new(),
            tags: self.tags.iter().cloned().collect::<BTreeSet<_>>(),
            flags: AssetFlags::default(),
        }
    }
}

/// Result of a batch delete.
///
/// The gateway reports a status per requested id in `deleted`; ids it could
/// not find carry the `not_found` status. `normalize` moves those into
/// `not_found` so callers only have to look in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchDeleteResponse {
    #[serde(default)]
    pub deleted: BTreeMap<String, String>,
    #[serde(default)]
    pub not_found: Vec<String>,
    #[serde(default)]
    pub partial: bool,
}

impl BatchDeleteResponse {
    pub fn normalize(mut self) -> Self {
        let missing: Vec<String> = self
            .deleted
            .iter()
            .filter(|(_, status)| status.as_str() == STATUS_NOT_FOUND)
            .map(|(id, _)| id.clone())
            .collect();
        for id in missing {
            self.deleted.remove(&id);
            if !self.not_found.contains(&id) {
                self.not_found.push(id);
            }
        }
        self
    }

    pub fn confirmed_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn is_partial(&self) -> bool {
        self.partial || !self.not_found.is_empty()
    }
}
