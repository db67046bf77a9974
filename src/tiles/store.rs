//! Persistent key-value store collaborator
//!
//! The cache mirrors its entries into any [`TileStore`] under the
//! [`STORE_NAMESPACE`] prefix, one JSON-encoded [`StoredEntry`] per tile. The
//! store is optional infrastructure: every interaction is best-effort.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::constants::STORE_NAMESPACE;
use crate::core::geo::TileKey;
use crate::{Result, TileError};

/// Async string key-value store, as provided by the host platform
#[async_trait]
pub trait TileStore: Send + Sync {
    async fn get_all_keys(&self) -> Result<Vec<String>>;

    /// Values for `keys`, in order; `None` where a key is absent
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>>;

    async fn set_item(&self, key: &str, value: String) -> Result<()>;

    async fn remove_item(&self, key: &str) -> Result<()>;

    async fn multi_remove(&self, keys: &[String]) -> Result<()>;
}

/// Serialized form of a cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub payload: Vec<u8>,
    pub size_bytes: usize,
    pub created_at: u64,
    pub last_accessed_at: u64,
    pub access_count: u64,
    pub priority: f64,
}

impl StoredEntry {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entry: StoredEntry = serde_json::from_str(json)?;
        if entry.size_bytes != entry.payload.len() {
            return Err(TileError::Store(format!(
                "stored entry claims {} bytes but holds {}",
                entry.size_bytes,
                entry.payload.len()
            )));
        }
        Ok(entry)
    }
}

/// Store key for a tile
pub fn store_key(key: &TileKey) -> String {
    format!("{}{}", STORE_NAMESPACE, key)
}

/// Tile key encoded in a store key, if it belongs to our namespace
pub fn parse_store_key(store_key: &str) -> Option<std::result::Result<TileKey, TileError>> {
    store_key
        .strip_prefix(STORE_NAMESPACE)
        .map(|suffix| suffix.parse())
}

/// Operations queued by the cache for its persistence task
#[derive(Debug)]
pub(crate) enum StoreOp {
    Put { key: String, value: String },
    Remove(Vec<String>),
    Clear,
    Flush(tokio::sync::oneshot::Sender<()>),
}

/// In-process store for runtimes without platform storage, and for tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items
            .lock()
            .map(|items| items.contains_key(key))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| TileError::Store("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl TileStore for MemoryStore {
    async fn get_all_keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<(String, Option<String>)>> {
        let items = self.lock()?;
        Ok(keys
            .iter()
            .map(|key| (key.clone(), items.get(key).cloned()))
            .collect())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let mut items = self.lock()?;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}
