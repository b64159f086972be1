use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use easel_resolve::Resolver;
use easel_store::SlotStore;
use easel_types::{AssetKey, CatalogItem, Snapshot};
use tracing::{debug, info, warn};

use crate::error::{CatalogError, CatalogResult};

/// Slot holding the JSON array of every catalog item.
pub const INDEX_SLOT: &str = "catalog/index";

/// Prefix of the slots holding shadow payloads.
pub const SHADOW_PREFIX: &str = "shadow/";

/// Slot name of the shadow payload for `id`.
pub fn shadow_slot(id: &str) -> String {
    format!("{SHADOW_PREFIX}{id}")
}

/// User-facing metadata for a save.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemMeta {
    pub name: String,
    pub category: String,
    pub thumbnail: Option<String>,
}

impl ItemMeta {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            thumbnail: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

/// Index of saved designs plus their shadow payloads.
///
/// Tracks which item is "active" in the running session: a plain save
/// overwrites the active item in place, a save with `force_new` always
/// creates a new one.
pub struct Catalog {
    slots: Arc<dyn SlotStore>,
    resolver: Arc<Resolver>,
    active: Mutex<Option<String>>,
    index_lock: tokio::sync::Mutex<()>,
}

impl Catalog {
    pub fn new(slots: Arc<dyn SlotStore>, resolver: Arc<Resolver>) -> Self {
        Self {
            slots,
            resolver,
            active: Mutex::new(None),
            index_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    // -- index ---------------------------------------------------------------

    pub(crate) async fn read_index(&self) -> CatalogResult<Vec<CatalogItem>> {
        match self.slots.read_slot(INDEX_SLOT).await? {
            Some(data) => {
                serde_json::from_slice(&data).map_err(|e| CatalogError::malformed(INDEX_SLOT, e))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn write_index(&self, items: &[CatalogItem]) -> CatalogResult<()> {
        let data =
            serde_json::to_vec(items).map_err(|e| CatalogError::Serialization(e.to_string()))?;
        self.slots.write_slot(INDEX_SLOT, &data).await?;
        Ok(())
    }

    /// Every item, most recently updated first.
    pub async fn list(&self) -> CatalogResult<Vec<CatalogItem>> {
        let mut items = self.read_index().await?;
        items.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(items)
    }

    pub async fn get(&self, id: &str) -> CatalogResult<Option<CatalogItem>> {
        Ok(self.read_index().await?.into_iter().find(|item| item.id == id))
    }

    pub async fn contains(&self, id: &str) -> CatalogResult<bool> {
        Ok(self.get(id).await?.is_some())
    }

    // -- active pointer ------------------------------------------------------

    /// Id of the item the session is editing, if any.
    pub fn active(&self) -> Option<String> {
        self.active.lock().expect("lock poisoned").clone()
    }

    pub fn set_active(&self, id: Option<String>) {
        *self.active.lock().expect("lock poisoned") = id;
    }

    pub fn clear_active(&self) {
        self.set_active(None);
    }

    // -- save / open ---------------------------------------------------------

    /// Save `snapshot` under `meta`.
    ///
    /// The snapshot is stabilized first, then the shadow payload is written,
    /// then the index. A failure at any step before the index write leaves
    /// the listing unchanged. The saved item becomes active.
    pub async fn save(
        &self,
        meta: ItemMeta,
        snapshot: &Snapshot,
        force_new: bool,
    ) -> CatalogResult<CatalogItem> {
        let (stable, report) = self.resolver.stabilize(snapshot).await?;
        if !report.is_clean() {
            warn!(blanked = report.blanked(), "saving with unresolvable references");
        }

        let _guard = self.index_lock.lock().await;
        let mut items = self.read_index().await?;
        let target = if force_new { None } else { self.active() };
        let existing = target.and_then(|id| items.iter().position(|item| item.id == id));

        let item = match existing {
            Some(index) => {
                let item = &mut items[index];
                item.name = meta.name;
                item.category = meta.category;
                item.thumbnail = meta.thumbnail;
                item.updated_at = Utc::now();
                item.clone()
            }
            None => {
                let item = CatalogItem::new(
                    uuid::Uuid::now_v7().to_string(),
                    meta.name,
                    meta.category,
                    meta.thumbnail,
                );
                items.push(item.clone());
                item
            }
        };

        self.write_payload(&item.id, &stable).await?;
        self.write_index(&items).await?;
        self.set_active(Some(item.id.clone()));

        info!(
            id = %item.id,
            name = %item.name,
            created = existing.is_none(),
            "design saved"
        );
        Ok(item)
    }

    /// Load the payload of `id` and make it the active item.
    ///
    /// The returned snapshot still holds durable references.
    pub async fn open(&self, id: &str) -> CatalogResult<Snapshot> {
        if !self.contains(id).await? {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        let snapshot = self
            .load_payload(id)
            .await?
            .ok_or_else(|| CatalogError::MissingPayload(id.to_string()))?;
        self.set_active(Some(id.to_string()));
        debug!(id, nodes = snapshot.node_count(), "design opened");
        Ok(snapshot)
    }

    /// Read a shadow payload without touching the active pointer.
    pub async fn load_payload(&self, id: &str) -> CatalogResult<Option<Snapshot>> {
        let slot = shadow_slot(id);
        match self.slots.read_slot(&slot).await? {
            Some(data) => Snapshot::from_json(&data)
                .map(Some)
                .map_err(|e| CatalogError::malformed(&slot, e)),
            None => Ok(None),
        }
    }

    async fn write_payload(&self, id: &str, stable: &Snapshot) -> CatalogResult<()> {
        let data = stable
            .to_json()
            .map_err(|e| CatalogError::Serialization(e.to_string()))?;
        self.slots.write_slot(&shadow_slot(id), &data).await?;
        Ok(())
    }

    /// Add `item` with an already stabilized payload, keeping its id.
    /// Returns `false` without writing if the id is taken.
    pub(crate) async fn insert(&self, item: CatalogItem, stable: &Snapshot) -> CatalogResult<bool> {
        let _guard = self.index_lock.lock().await;
        let mut items = self.read_index().await?;
        if items.iter().any(|existing| existing.id == item.id) {
            return Ok(false);
        }
        self.write_payload(&item.id, stable).await?;
        items.push(item);
        self.write_index(&items).await?;
        Ok(true)
    }

    // -- edits ---------------------------------------------------------------

    pub async fn rename(&self, id: &str, name: &str) -> CatalogResult<CatalogItem> {
        let _guard = self.index_lock.lock().await;
        let mut items = self.read_index().await?;
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        item.name = name.to_string();
        item.updated_at = Utc::now();
        let renamed = item.clone();
        self.write_index(&items).await?;
        Ok(renamed)
    }

    /// Remove `id` from the listing and drop its payload.
    ///
    /// Returns `false` if no such item was listed. A payload that fails to
    /// delete is left for [`Catalog::prune_orphans`].
    pub async fn delete(&self, id: &str) -> CatalogResult<bool> {
        let _guard = self.index_lock.lock().await;
        let mut items = self.read_index().await?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(false);
        }
        self.write_index(&items).await?;

        if self.active().as_deref() == Some(id) {
            self.clear_active();
        }
        if let Err(error) = self.slots.delete_slot(&shadow_slot(id)).await {
            warn!(id, %error, "shadow payload left behind");
        }
        info!(id, "design deleted");
        Ok(true)
    }

    /// Delete shadow payloads no listed item points at. Returns their ids.
    pub async fn prune_orphans(&self) -> CatalogResult<Vec<String>> {
        let _guard = self.index_lock.lock().await;
        let listed: BTreeSet<String> = self
            .read_index()
            .await?
            .into_iter()
            .map(|item| item.id)
            .collect();

        let mut pruned = Vec::new();
        for slot in self.slots.list_slots(SHADOW_PREFIX).await? {
            let Some(id) = slot.strip_prefix(SHADOW_PREFIX) else {
                continue;
            };
            if !listed.contains(id) && self.slots.delete_slot(&slot).await? {
                pruned.push(id.to_string());
            }
        }
        if !pruned.is_empty() {
            info!(count = pruned.len(), "orphan payloads pruned");
        }
        Ok(pruned)
    }

    /// Durable keys referenced by any listed item's payload.
    ///
    /// Unreadable payloads are skipped with a warning.
    pub async fn referenced_keys(&self) -> CatalogResult<BTreeSet<AssetKey>> {
        let mut keys = BTreeSet::new();
        for item in self.read_index().await? {
            match self.load_payload(&item.id).await {
                Ok(Some(snapshot)) => keys.extend(snapshot.durable_keys()),
                Ok(None) => {}
                Err(error) => warn!(id = %item.id, %error, "payload skipped"),
            }
        }
        Ok(keys)
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}
