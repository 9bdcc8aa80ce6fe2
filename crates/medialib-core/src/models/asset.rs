use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn display(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Local-only flags. These are not mirrored to the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFlags {
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub remote_id: Option<String>,
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub byte_size: u64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    pub uploaded_at: DateTime<Utc>,

    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub flags: AssetFlags,
}

impl Asset {
    /// Create an asset that exists only locally (e.g. a finished upload that
    /// the gateway has not reported yet).
    pub fn local(id: impl Into<String>, url: impl Into<String>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            id: id.into(),
            remote_id: None,
            url: url.into(),
            title: title_from_filename(&filename),
            filename,
            byte_size: 0,
            mime_type: String::new(),
            dimensions: None,
            uploaded_at: Utc::now(),
            alt_text: String::new(),
            caption: String::new(),
            description: String::new(),
            tags: BTreeSet::new(),
            flags: AssetFlags::default(),
        }
    }

    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    pub fn is_local_only(&self) -> bool {
        self.remote_id.as_deref().map(str::is_empty).unwrap_or(true)
    }

    /// Short media type label derived from the MIME type ("image/png" -> "PNG")
    pub fn type_label(&self) -> String {
        self.mime_type
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_uppercase())
            .unwrap_or_else(|| "FILE".to_string())
    }
}

/// Turn "summer_beach-2024.jpg" into "summer beach 2024".
pub fn title_from_filename(filename: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    };
    stem.replace(['_', '-'], " ").trim().to_string()
}

/// A set of optional metadata replacements. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetadataEdit {
    pub title: Option<String>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub description: Option<String>,
    pub tags: Option<BTreeSet<String>>,
}

impl MetadataEdit {
    pub fn apply(self, asset: &mut Asset) {
        if let Some(title) = self.title {
            asset.title = title;
        }
        if let Some(alt_text) = self.alt_text {
            asset.alt_text = alt_text;
        }
        if let Some(caption) = self.caption {
            asset.caption = caption;
        }
        if let Some(description) = self.description {
            asset.description = description;
        }
        if let Some(tags) = self.tags {
            asset.tags = tags;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_filename() {
        assert_eq!(title_from_filename("summer_beach-2024.jpg"), "summer beach 2024");
        assert_eq!(title_from_filename("noext"), "noext");
        assert_eq!(title_from_filename(".hidden"), ".hidden");
    }

    #[test]
    fn test_local_asset_has_no_remote_id() {
        let asset = Asset::local("a1", "https://cdn.example.com/a1.png", "a1.png");
        assert!(asset.is_local_only());
        assert!(!asset.clone().with_remote_id("portfolios/a1").is_local_only());
        assert!(asset.with_remote_id("").is_local_only());
    }

    #[test]
    fn test_type_label() {
        let mut asset = Asset::local("a1", "u", "a1.png");
        assert_eq!(asset.type_label(), "FILE");
        asset.mime_type = "image/webp".to_string();
        assert_eq!(asset.type_label(), "WEBP");
    }

    #[test]
    fn test_metadata_edit_only_touches_set_fields() {
        let mut asset = Asset::local("a1", "u", "a1.png");
        asset.caption = "keep me".to_string();

        MetadataEdit {
            title: Some("Hero".to_string()),
            tags: Some(["cover".to_string()].into_iter().collect()),
            ..Default::default()
        }
        .apply(&mut asset);

        assert_eq!(asset.title, "Hero");
        assert_eq!(asset.caption, "keep me");
        assert!(asset.tags.contains("cover"));
    }

    #[test]
    fn test_asset_serde_uses_camel_case() {
        let asset = Asset::local("a1", "u", "a1.png").with_remote_id("r1");
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["remoteId"], "r1");
        assert!(json.get("altText").is_some());

        let back: Asset = serde_json::from_value(json).unwrap();
        assert_eq!(back, asset);
    }
}
