use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use easel_types::{AssetKey, EphemeralHandle};
use tracing::debug;

const HANDLE_PREFIX: &str = "blob:easel/";

struct Entry {
    bytes: Arc<Vec<u8>>,
    key: Option<AssetKey>,
}

#[derive(Default)]
struct Handles {
    entries: HashMap<EphemeralHandle, Entry>,
    by_key: HashMap<AssetKey, EphemeralHandle>,
}

impl Handles {
    fn forget(&mut self, handle: &EphemeralHandle) -> bool {
        let Some(entry) = self.entries.remove(handle) else {
            return false;
        };
        if let Some(key) = entry.key {
            if self.by_key.get(&key) == Some(handle) {
                self.by_key.remove(&key);
            }
        }
        true
    }
}

/// Session-local registry of revocable handles to in-memory bytes.
///
/// This is the Rust side of what a browser exposes as object URLs: the
/// rendering engine displays an image through its handle, the handle stops
/// resolving once revoked, and nothing survives the registry being dropped
/// (a reload). When a handle is minted for bytes that already have a
/// durable key, the key is remembered so stabilization can skip re-hashing
/// and materialization can reuse the live handle instead of minting another.
pub struct EphemeralRegistry {
    inner: RwLock<Handles>,
}

impl EphemeralRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Handles::default()),
        }
    }

    fn next_handle() -> EphemeralHandle {
        let raw = format!("{HANDLE_PREFIX}{}", uuid::Uuid::now_v7());
        EphemeralHandle::new(raw).expect("generated handles carry the blob: prefix")
    }

    fn insert(&self, bytes: Vec<u8>, key: Option<AssetKey>) -> EphemeralHandle {
        let handle = Self::next_handle();
        let size = bytes.len();
        let mut inner = self.inner.write().expect("lock poisoned");
        if let Some(key) = key {
            inner.by_key.insert(key, handle.clone());
        }
        inner.entries.insert(
            handle.clone(),
            Entry {
                bytes: Arc::new(bytes),
                key,
            },
        );
        drop(inner);
        debug!(handle = %handle, size, "ephemeral handle minted");
        handle
    }

    /// Mint a handle for freshly produced bytes.
    pub fn mint(&self, bytes: Vec<u8>) -> EphemeralHandle {
        self.insert(bytes, None)
    }

    /// Mint a handle for bytes already stored under `key`.
    pub fn mint_for_key(&self, key: AssetKey, bytes: Vec<u8>) -> EphemeralHandle {
        self.insert(bytes, Some(key))
    }

    /// The bytes behind a live handle.
    pub fn resolve(&self, handle: &EphemeralHandle) -> Option<Arc<Vec<u8>>> {
        let inner = self.inner.read().expect("lock poisoned");
        inner.entries.get(handle).map(|entry| Arc::clone(&entry.bytes))
    }

    /// The durable key known for a live handle, if any.
    pub fn known_key(&self, handle: &EphemeralHandle) -> Option<AssetKey> {
        let inner = self.inner.read().expect("lock poisoned");
        inner.entries.get(handle).and_then(|entry| entry.key)
    }

    /// A live handle already showing the bytes stored under `key`.
    pub fn handle_for_key(&self, key: &AssetKey) -> Option<EphemeralHandle> {
        self.inner
            .read()
            .expect("lock poisoned")
            .by_key
            .get(key)
            .cloned()
    }

    /// Live handles whose bytes are known to be stored, with their keys.
    pub fn keyed_handles(&self) -> Vec<(EphemeralHandle, AssetKey)> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .entries
            .iter()
            .filter_map(|(handle, entry)| entry.key.map(|key| (handle.clone(), key)))
            .collect()
    }

    /// Record that a live handle's bytes are stored under `key`.
    pub fn remember_key(&self, handle: &EphemeralHandle, key: AssetKey) {
        let mut inner = self.inner.write().expect("lock poisoned");
        if let Some(entry) = inner.entries.get_mut(handle) {
            entry.key = Some(key);
            inner.by_key.entry(key).or_insert_with(|| handle.clone());
        }
    }

    /// Revoke a handle. Returns `true` if it was live.
    pub fn revoke(&self, handle: &EphemeralHandle) -> bool {
        self.inner.write().expect("lock poisoned").forget(handle)
    }

    /// Revoke every handle, as a page reload would. Returns how many were live.
    pub fn revoke_all(&self) -> usize {
        let mut inner = self.inner.write().expect("lock poisoned");
        let count = inner.entries.len();
        inner.entries.clear();
        inner.by_key.clear();
        count
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EphemeralRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EphemeralRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralRegistry")
            .field("live_handles", &self.len())
            .finish()
    }
}
