use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use easel_types::AssetKey;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;
use crate::names::validate_slot_name;
use crate::record::BlobRecord;
use crate::traits::{BlobStore, SlotStore};

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. An optional byte quota models the
/// storage limits a browser imposes; `put` beyond it fails with
/// [`StoreError::QuotaExceeded`].
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<AssetKey, BlobRecord>>,
    quota: Option<u64>,
}

impl InMemoryBlobStore {
    /// Create a new empty store without a quota.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            quota: None,
        }
    }

    /// Create a new empty store holding at most `quota` bytes.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Remove all blobs from the store.
    pub fn clear(&self) {
        self.blobs.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bytes: &[u8]) -> StoreResult<AssetKey> {
        let key = ContentHasher::ASSET.hash(bytes);
        let mut map = self.blobs.write().expect("lock poisoned");
        if map.contains_key(&key) {
            return Ok(key);
        }
        if let Some(quota) = self.quota {
            let used: u64 = map.values().map(BlobRecord::size).sum();
            let needed = bytes.len() as u64;
            if used + needed > quota {
                return Err(StoreError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }
        map.insert(key, BlobRecord::new(bytes.to_vec()));
        debug!(key = %key.short_hex(), size = bytes.len(), "blob stored");
        Ok(key)
    }

    async fn get(&self, key: &AssetKey) -> StoreResult<Option<BlobRecord>> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    async fn delete(&self, key: &AssetKey) -> StoreResult<bool> {
        let mut map = self.blobs.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    async fn contains(&self, key: &AssetKey) -> StoreResult<bool> {
        Ok(self.blobs.read().expect("lock poisoned").contains_key(key))
    }

    async fn keys(&self) -> StoreResult<Vec<AssetKey>> {
        let map = self.blobs.read().expect("lock poisoned");
        let mut keys: Vec<AssetKey> = map.keys().copied().collect();
        keys.sort();
        Ok(keys)
    }

    async fn total_bytes(&self) -> StoreResult<u64> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.values().map(BlobRecord::size).sum())
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .field("quota", &self.quota)
            .finish()
    }
}

/// In-memory slot store.
///
/// Besides tests, this backs session-scoped state: a fresh instance per
/// browser session, shared across reloads within it.
#[derive(Debug, Default)]
pub struct InMemorySlotStore {
    slots: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemorySlotStore {
    /// Create a new empty slot store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots currently stored.
    pub fn len(&self) -> usize {
        self.slots.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no slots are stored.
    pub fn is_empty(&self) -> bool {
        self.slots.read().expect("lock poisoned").is_empty()
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn read_slot(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_slot_name(name)?;
        Ok(self.slots.read().expect("lock poisoned").get(name).cloned())
    }

    async fn write_slot(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        validate_slot_name(name)?;
        self.slots
            .write()
            .expect("lock poisoned")
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete_slot(&self, name: &str) -> StoreResult<bool> {
        validate_slot_name(name)?;
        Ok(self
            .slots
            .write()
            .expect("lock poisoned")
            .remove(name)
            .is_some())
    }

    async fn list_slots(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let slots = self.slots.read().expect("lock poisoned");
        Ok(slots
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}
