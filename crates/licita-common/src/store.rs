//! Key-value storage
//!
//! The client keeps its state in two string-valued stores: a session-scoped
//! one (cleared on logout) and a persistent local one (activity log, drafts,
//! submission history). Values are JSON documents.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::{LicitaError, Result};

/// Well-known keys
pub mod keys {
    /// Session blob (session store)
    pub const SESSION: &str = "session";
    /// Access log array (local store)
    pub const ACTIVITY_LOG: &str = "activity_log";
    /// In-progress proposal draft (local store)
    pub const DRAFT: &str = "draft_in_progress";
    /// Submitted proposals history (local store)
    pub const SUBMISSIONS: &str = "submitted_proposals";
}

/// Named string slots with get/set/remove/clear semantics
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: String) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Typed JSON access on top of any store
pub trait JsonStoreExt: KeyValueStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, serde_json::to_string(value)?)
    }
}

impl<S: KeyValueStore + ?Sized> JsonStoreExt for S {}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-lifetime store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// Store persisted as a single JSON object on disk.
///
/// Every mutation rewrites the file through a temporary sibling and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            BTreeMap::new()
        };
        debug!("Opened store {:?} with {} keys", path, entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy and keeps it only once it is on disk.
    /// `change` returns whether anything changed.
    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<()> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        if change(&mut next) {
            self.persist(&next)?;
            *entries = next;
        }
        Ok(())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let data = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            LicitaError::Storage(format!("failed to replace {:?}: {}", self.path, e))
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
            true
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.update(|entries| {
            entries.clear();
            true
        })
    }
}

// ============================================================================
// Storage pair
// ============================================================================

/// The session-scoped and persistent stores used by the client
#[derive(Clone)]
pub struct BrowserStorage {
    pub session: Arc<dyn KeyValueStore>,
    pub local: Arc<dyn KeyValueStore>,
}

impl BrowserStorage {
    pub fn new(session: Arc<dyn KeyValueStore>, local: Arc<dyn KeyValueStore>) -> Self {
        Self { session, local }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Opens `session.json` and `local.json` under `dir`
    pub fn open_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let session = FileStore::open(dir.join("session.json"))?;
        let local = FileStore::open(dir.join("local.json"))?;
        Ok(Self::new(Arc::new(session), Arc::new(local)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_basic_ops() {
        let store = MemoryStore::new();
        store.set("a", "1".to_string()).unwrap();
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("b", "2".to_string()).unwrap();
        store.set("c", "3".to_string()).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        store.set_json("list", &vec![1, 2, 3]).unwrap();
        let back: Option<Vec<i32>> = store.get_json("list").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        store.set("broken", "{not json".to_string()).unwrap();
        assert!(store.get_json::<Vec<i32>>("broken").is_err());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("local.json");
        {
            let store = FileStore::open(&path).expect("Failed to open store");
            store.set("draft", "{}".to_string()).unwrap();
            store.set("other", "x".to_string()).unwrap();
            store.remove("other").unwrap();
        }

        let reopened = FileStore::open(&path).expect("Failed to reopen store");
        assert_eq!(reopened.get("draft").unwrap(), Some("{}".to_string()));
        assert_eq!(reopened.get("other").unwrap(), None);
    }

    #[test]
    fn test_failed_write_leaves_entries_untouched() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("local.json");
        let store = FileStore::open(&path).expect("Failed to open store");
        store.set("draft", "old".to_string()).unwrap();

        // A directory in the way of the temporary file makes every write fail
        std::fs::create_dir(path.with_extension("tmp")).unwrap();
        assert!(store.set("draft", "new".to_string()).is_err());
        assert!(store.remove("draft").is_err());
        assert!(store.clear().is_err());
        assert_eq!(store.get("draft").unwrap(), Some("old".to_string()));

        let reopened = FileStore::open(&path).expect("Failed to reopen store");
        assert_eq!(reopened.get("draft").unwrap(), Some("old".to_string()));
    }

    #[test]
    fn test_browser_storage_keeps_stores_apart() {
        let dir = tempdir().expect("Failed to create temp dir");
        let storage = BrowserStorage::open_dir(dir.path()).unwrap();
        storage.session.set(keys::SESSION, "s".to_string()).unwrap();
        storage.local.set(keys::DRAFT, "d".to_string()).unwrap();

        storage.session.clear().unwrap();
        assert_eq!(storage.session.get(keys::SESSION).unwrap(), None);
        assert_eq!(storage.local.get(keys::DRAFT).unwrap(), Some("d".to_string()));
    }
}
