//! Filesystem-backed stores.
//!
//! Blob layout (fan-out on the first byte of the key):
//! ```text
//! <root>/<2 hex>/<64 hex>
//! <root>/tmp/<uuid>          in-flight writes, renamed into place
//! ```
//!
//! Slot layout: the slot name is the relative path, with a `.slot` suffix
//! so `catalog` and `catalog/index` can coexist.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use easel_types::AssetKey;
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;
use crate::names::validate_slot_name;
use crate::record::BlobRecord;
use crate::traits::{BlobStore, SlotStore};

const SLOT_EXTENSION: &str = "slot";
const SLOT_SUFFIX: &str = ".slot";
const TMP_DIR: &str = "tmp";

/// Write `data` to `path` atomically: temp file in `tmp_dir`, then rename.
async fn write_atomic(tmp_dir: &Path, path: &Path, data: &[u8]) -> StoreResult<()> {
    fs::create_dir_all(tmp_dir).await?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_dir.join(uuid::Uuid::now_v7().to_string());
    fs::write(&tmp, data).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_optional(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Run a directory scan off the async executor.
async fn scan<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))?
}

// ---------------------------------------------------------------------------
// Blobs
// ---------------------------------------------------------------------------

/// Blob store keeping one file per blob under a root directory.
///
/// Reads re-digest the file and fail with [`StoreError::HashMismatch`] if
/// the bytes on disk no longer match their key.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    quota: Option<u64>,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, quota: None })
    }

    /// Refuse writes that would take the store past `quota` bytes.
    pub fn with_quota(mut self, quota: u64) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &AssetKey) -> PathBuf {
        let hex = key.to_hex();
        self.root.join(&hex[..2]).join(hex)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: &[u8]) -> StoreResult<AssetKey> {
        let key = ContentHasher::ASSET.hash(bytes);
        let path = self.blob_path(&key);
        if fs::try_exists(&path).await? {
            return Ok(key);
        }
        if let Some(quota) = self.quota {
            let used = self.total_bytes().await?;
            let needed = bytes.len() as u64;
            if used + needed > quota {
                return Err(StoreError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }
        write_atomic(&self.root.join(TMP_DIR), &path, bytes).await?;
        debug!(key = %key.short_hex(), size = bytes.len(), "blob written");
        Ok(key)
    }

    async fn get(&self, key: &AssetKey) -> StoreResult<Option<BlobRecord>> {
        let path = self.blob_path(key);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(None);
        };
        let computed = ContentHasher::ASSET.hash(&bytes);
        if computed != *key {
            return Err(StoreError::HashMismatch {
                key: *key,
                computed,
            });
        }
        let created_at = fs::metadata(&path)
            .await?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Some(BlobRecord {
            key: *key,
            bytes,
            created_at,
        }))
    }

    async fn delete(&self, key: &AssetKey) -> StoreResult<bool> {
        remove_optional(&self.blob_path(key)).await
    }

    async fn contains(&self, key: &AssetKey) -> StoreResult<bool> {
        Ok(fs::try_exists(self.blob_path(key)).await?)
    }

    async fn keys(&self) -> StoreResult<Vec<AssetKey>> {
        let root = self.root.clone();
        scan(move || {
            let mut keys = Vec::new();
            let fan_out = WalkDir::new(&root)
                .min_depth(2)
                .max_depth(2)
                .into_iter()
                .filter_entry(|e| e.depth() != 1 || e.file_name().len() == 2);
            for entry in fan_out {
                let entry = entry.map_err(|e| StoreError::Io(io::Error::other(e)))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                match AssetKey::from_hex(&name) {
                    Ok(key) => keys.push(key),
                    Err(_) => warn!(path = %entry.path().display(), "ignoring stray file in blob store"),
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
    }

    async fn total_bytes(&self) -> StoreResult<u64> {
        let mut total = 0;
        for key in self.keys().await? {
            total += fs::metadata(self.blob_path(&key)).await?.len();
        }
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Slot store keeping one file per slot under a root directory.
#[derive(Clone, Debug)]
pub struct FsSlotStore {
    root: PathBuf,
}

impl FsSlotStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, name: &str) -> StoreResult<PathBuf> {
        validate_slot_name(name)?;
        let (dir, file) = name.rsplit_once('/').unwrap_or(("", name));
        let mut path = self.root.clone();
        path.extend(dir.split('/').filter(|segment| !segment.is_empty()));
        path.push(format!("{file}.{SLOT_EXTENSION}"));
        Ok(path)
    }
}

#[async_trait]
impl SlotStore for FsSlotStore {
    async fn read_slot(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        read_optional(&self.slot_path(name)?).await
    }

    async fn write_slot(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.slot_path(name)?;
        write_atomic(&self.root.join(".tmp"), &path, data).await
    }

    async fn delete_slot(&self, name: &str) -> StoreResult<bool> {
        remove_optional(&self.slot_path(name)?).await
    }

    async fn list_slots(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        scan(move || {
            let mut names = Vec::new();
            for entry in WalkDir::new(&root).min_depth(1) {
                let entry = entry.map_err(|e| StoreError::Io(io::Error::other(e)))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let joined = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                let Some(name) = joined.strip_suffix(SLOT_SUFFIX) else {
                    continue;
                };
                if name.starts_with(&prefix) && validate_slot_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
            names.sort();
            Ok(names)
        })
        .await
    }
}
