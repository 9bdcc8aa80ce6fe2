use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};

/// Raw key-value storage behind the response cache
pub trait CacheStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, contents: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Map an arbitrary key to a file-name-safe string.
/// Alphanumerics, '-' and '.' pass through; every other byte becomes `_XX`.
/// The mapping is injective, so distinct keys never share a file.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{:02x}", b));
        }
    }
    out
}

pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", encode_key(key)))
    }
}

impl CacheStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.cache_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", key))?;
        Ok(Some(contents))
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        std::fs::write(self.cache_path(key), contents)
            .with_context(|| format!("Failed to write cache file: {}", key))
    }

    fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory cache lock poisoned"))?;
        entries.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory cache lock poisoned"))?
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key_is_file_safe_and_distinct() {
        assert_eq!(encode_key("folder:portfolios"), "folder_3aportfolios");
        assert_ne!(encode_key("a:b"), encode_key("a_b"));
        assert!(!encode_key("x/../../etc").contains('/'));
    }

    #[test]
    fn test_file_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("cache")).unwrap();

        assert_eq!(store.read("folder:portfolios").unwrap(), None);
        store.write("folder:portfolios", "{}").unwrap();
        assert_eq!(store.read("folder:portfolios").unwrap().as_deref(), Some("{}"));

        store.clear().unwrap();
        assert_eq!(store.read("folder:portfolios").unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.write("k", "v").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("v"));
        store.clear().unwrap();
        assert_eq!(store.read("k").unwrap(), None);
    }
}
