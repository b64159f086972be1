use async_trait::async_trait;
use easel_types::AssetKey;

use crate::error::StoreResult;
use crate::record::BlobRecord;

/// Content-addressed binary asset store.
///
/// All implementations must satisfy these invariants:
/// - `put` is idempotent: identical bytes always yield the same key and are
///   stored once.
/// - `get` of an unknown key returns `Ok(None)`; only backend failures are
///   errors.
/// - Storage-full and I/O failures on `put` are reported, never swallowed.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their content key.
    async fn put(&self, bytes: &[u8]) -> StoreResult<AssetKey>;

    /// Fetch a record by key.
    async fn get(&self, key: &AssetKey) -> StoreResult<Option<BlobRecord>>;

    /// Delete a blob. Returns `true` if it existed.
    ///
    /// Deleting a blob that a persisted snapshot still references leaves that
    /// reference to resolve as empty.
    async fn delete(&self, key: &AssetKey) -> StoreResult<bool>;

    /// Check whether a blob is present.
    async fn contains(&self, key: &AssetKey) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Every stored key, sorted.
    async fn keys(&self) -> StoreResult<Vec<AssetKey>>;

    /// Total bytes across all stored blobs.
    async fn total_bytes(&self) -> StoreResult<u64>;
}

/// Storage for named documents.
///
/// Slot names are `/`-separated paths such as `catalog/index` or
/// `shadow/<id>`; see [`crate::names::validate_slot_name`]. Values are opaque
/// bytes.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Read a slot. Returns `Ok(None)` if it does not exist.
    async fn read_slot(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Create or replace a slot.
    async fn write_slot(&self, name: &str, data: &[u8]) -> StoreResult<()>;

    /// Delete a slot. Returns `true` if it existed.
    async fn delete_slot(&self, name: &str) -> StoreResult<bool>;

    /// List slot names starting with `prefix`, sorted. Pass `""` for all.
    async fn list_slots(&self, prefix: &str) -> StoreResult<Vec<String>>;
}
