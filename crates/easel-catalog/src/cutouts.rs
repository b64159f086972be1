use std::sync::Arc;

use chrono::Utc;
use easel_store::{BlobStore, SlotStore};
use easel_types::{AssetKey, Cutout};
use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult};

/// Prefix of the slots holding cutout metadata.
pub const CUTOUT_PREFIX: &str = "cutouts/";

fn cutout_slot(id: &str) -> String {
    format!("{CUTOUT_PREFIX}{id}")
}

/// Library of named derived assets, such as background-removal results.
///
/// Each cutout is a metadata slot pointing at a blob. Deleting a cutout
/// removes the metadata only; the blob goes once garbage collection finds
/// nothing else referencing it.
pub struct CutoutLibrary {
    blobs: Arc<dyn BlobStore>,
    slots: Arc<dyn SlotStore>,
}

impl CutoutLibrary {
    pub fn new(blobs: Arc<dyn BlobStore>, slots: Arc<dyn SlotStore>) -> Self {
        Self { blobs, slots }
    }

    /// Store `bytes` and record them under `name`.
    pub async fn add(&self, name: &str, bytes: &[u8]) -> CatalogResult<Cutout> {
        let key = self.blobs.put(bytes).await?;
        let cutout = Cutout {
            id: uuid::Uuid::now_v7().to_string(),
            name: name.to_string(),
            key,
            created_at: Utc::now(),
        };
        let data =
            serde_json::to_vec(&cutout).map_err(|e| CatalogError::Serialization(e.to_string()))?;
        self.slots.write_slot(&cutout_slot(&cutout.id), &data).await?;
        debug!(id = %cutout.id, key = %key.short_hex(), "cutout added");
        Ok(cutout)
    }

    pub async fn get(&self, id: &str) -> CatalogResult<Option<Cutout>> {
        let slot = cutout_slot(id);
        match self.slots.read_slot(&slot).await? {
            Some(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| CatalogError::malformed(&slot, e)),
            None => Ok(None),
        }
    }

    /// Every cutout, newest first. Unreadable records are skipped.
    pub async fn list(&self) -> CatalogResult<Vec<Cutout>> {
        let mut cutouts = Vec::new();
        for slot in self.slots.list_slots(CUTOUT_PREFIX).await? {
            let Some(id) = slot.strip_prefix(CUTOUT_PREFIX) else {
                continue;
            };
            match self.get(id).await {
                Ok(Some(cutout)) => cutouts.push(cutout),
                Ok(None) => {}
                Err(error) => warn!(%slot, %error, "cutout record skipped"),
            }
        }
        cutouts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(cutouts)
    }

    /// Remove the record for `id`. Returns `true` if it existed.
    pub async fn delete(&self, id: &str) -> CatalogResult<bool> {
        Ok(self.slots.delete_slot(&cutout_slot(id)).await?)
    }

    /// The image bytes of cutout `id`, if both record and blob exist.
    pub async fn bytes(&self, id: &str) -> CatalogResult<Option<Vec<u8>>> {
        let Some(cutout) = self.get(id).await? else {
            return Ok(None);
        };
        Ok(self.blobs.get(&cutout.key).await?.map(|record| record.bytes))
    }

    /// Keys of every recorded cutout.
    pub async fn keys(&self) -> CatalogResult<Vec<AssetKey>> {
        Ok(self.list().await?.into_iter().map(|c| c.key).collect())
    }
}

impl std::fmt::Debug for CutoutLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CutoutLibrary").finish_non_exhaustive()
    }
}
