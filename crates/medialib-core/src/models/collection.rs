use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{Asset, MetadataEdit};

/// The collection as shared between the controller and the sync task.
/// Each merge and each removal happens under a single write lock.
pub type SharedCollection = Arc<RwLock<AssetCollection>>;

/// Insertion-ordered asset set with an id index.
///
/// Ids are unique at all times. Every mutation bumps `version`, which the
/// filter pipeline uses to decide whether it has to recompute.
#[derive(Debug, Clone, Default)]
pub struct AssetCollection {
    assets: Vec<Asset>,
    index: HashMap<String, usize>,
    version: u64,
}

impl AssetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection, dropping later duplicates of an id.
    pub fn from_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        let mut collection = Self::new();
        collection.append_new(assets);
        collection
    }

    pub fn into_shared(self) -> SharedCollection {
        Arc::new(RwLock::new(self))
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.index.get(id).map(|&i| &self.assets[i])
    }

    /// Mutable access to one asset. Counts as a mutation.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Asset> {
        let idx = *self.index.get(id)?;
        self.bump();
        Some(&mut self.assets[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn as_slice(&self) -> &[Asset] {
        &self.assets
    }

    pub fn ids(&self) -> HashSet<String> {
        self.index.keys().cloned().collect()
    }

    /// Insert a single asset. Returns false (and leaves the set untouched) if
    /// the id is already present.
    pub fn insert(&mut self, asset: Asset) -> bool {
        if self.index.contains_key(&asset.id) {
            return false;
        }
        self.index.insert(asset.id.clone(), self.assets.len());
        self.assets.push(asset);
        self.bump();
        true
    }

    /// Append every asset whose id is not yet present, in the given order.
    /// Existing assets are never overwritten. Returns the assets that were added.
    pub fn append_new(&mut self, incoming: impl IntoIterator<Item = Asset>) -> Vec<Asset> {
        let mut added = Vec::new();
        for asset in incoming {
            if self.index.contains_key(&asset.id) {
                continue;
            }
            self.index.insert(asset.id.clone(), self.assets.len());
            added.push(asset.clone());
            self.assets.push(asset);
        }
        if !added.is_empty() {
            self.bump();
        }
        added
    }

    /// Remove every asset whose id is in `ids`, preserving the order of the rest.
    /// Returns the removed assets.
    pub fn remove_ids<S: AsRef<str>>(&mut self, ids: &[S]) -> Vec<Asset> {
        let targets: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
        if !targets.iter().any(|id| self.index.contains_key(*id)) {
            return Vec::new();
        }

        let (removed, kept): (Vec<Asset>, Vec<Asset>) = std::mem::take(&mut self.assets)
            .into_iter()
            .partition(|a| targets.contains(a.id.as_str()));
        self.assets = kept;
        self.reindex();
        self.bump();
        removed
    }

    pub fn apply_edit(&mut self, id: &str, edit: MetadataEdit) -> bool {
        match self.get_mut(id) {
            Some(asset) => {
                edit.apply(asset);
                true
            }
            None => false,
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .assets
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}
