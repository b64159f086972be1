//! Portable export files.
//!
//! A portable document is a JSON array of items, each carrying its catalog
//! metadata and a fully embedded snapshot under `json`:
//!
//! ```text
//! [ { "id", "name", "category", "thumbnail", "json": Snapshot }, ... ]
//! ```
//!
//! The same array may be wrapped in a compressed container:
//!
//! ```text
//! b"EZL1" | zstd frame of the JSON array
//! ```
//!
//! [`PortableDocument::decode`] accepts either form.

use chrono::Utc;
use easel_types::{CatalogItem, Snapshot};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::{CatalogError, CatalogResult};

/// Leading bytes of a compressed portable document.
pub const CONTAINER_MAGIC: &[u8; 4] = b"EZL1";

const COMPRESSION_LEVEL: i32 = 3;

/// One exported design.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortableItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// The design itself, with every asset embedded.
    pub json: Snapshot,
}

/// A set of exported designs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortableDocument {
    pub items: Vec<PortableItem>,
}

impl PortableDocument {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Plain JSON encoding.
    pub fn to_json(&self) -> CatalogResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CatalogError::Serialization(e.to_string()))
    }

    /// Compressed container encoding.
    pub fn to_compressed(&self) -> CatalogResult<Vec<u8>> {
        let json = self.to_json()?;
        let compressed = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)
            .map_err(|e| CatalogError::CompressionFailed(e.to_string()))?;
        let mut out = Vec::with_capacity(CONTAINER_MAGIC.len() + compressed.len());
        out.extend_from_slice(CONTAINER_MAGIC);
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    /// Decode either encoding.
    pub fn decode(data: &[u8]) -> CatalogResult<Self> {
        if let Some(frame) = data.strip_prefix(CONTAINER_MAGIC.as_slice()) {
            let json = zstd::decode_all(frame)
                .map_err(|e| CatalogError::DecompressionFailed(e.to_string()))?;
            return Self::from_json(&json);
        }
        match data.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'[') => Self::from_json(data),
            _ => Err(CatalogError::InvalidMagic {
                expected: "EZL1 container or JSON array".into(),
                actual: hex_prefix(data),
            }),
        }
    }

    fn from_json(data: &[u8]) -> CatalogResult<Self> {
        serde_json::from_slice(data).map_err(|e| CatalogError::Serialization(e.to_string()))
    }
}

fn hex_prefix(data: &[u8]) -> String {
    data.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

/// Outcome of [`Catalog::import`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<String>,
    /// Ids already present in the catalog, left untouched.
    pub skipped: Vec<String>,
    /// References that could not be decoded and were blanked.
    pub blanked: usize,
}

impl Catalog {
    /// Export the items named in `ids`, or every item when `ids` is `None`.
    ///
    /// Each payload is embedded so the document needs no storage to load.
    /// Unknown ids are an error; items whose payload is gone are skipped.
    pub async fn export(&self, ids: Option<&[String]>) -> CatalogResult<PortableDocument> {
        let listed = self.list().await?;
        let chosen: Vec<CatalogItem> = match ids {
            None => listed,
            Some(ids) => ids
                .iter()
                .map(|id| {
                    listed
                        .iter()
                        .find(|item| &item.id == id)
                        .cloned()
                        .ok_or_else(|| CatalogError::NotFound(id.clone()))
                })
                .collect::<CatalogResult<_>>()?,
        };

        let mut document = PortableDocument::default();
        for item in chosen {
            let Some(payload) = self.load_payload(&item.id).await? else {
                warn!(id = %item.id, "export skipped item without payload");
                continue;
            };
            let (embedded, report) = self.resolver().embed(&payload).await;
            if !report.is_clean() {
                warn!(id = %item.id, blanked = report.blanked(), "export blanked missing assets");
            }
            document.items.push(PortableItem {
                id: item.id,
                name: item.name,
                category: item.category,
                thumbnail: item.thumbnail,
                json: embedded,
            });
        }
        info!(items = document.len(), "catalog exported");
        Ok(document)
    }

    /// Import every item of `document` whose id is not already listed.
    ///
    /// Embedded assets are moved into the blob store. Running the same
    /// import twice changes nothing the second time. The active item is
    /// left as it was.
    pub async fn import(&self, document: &PortableDocument) -> CatalogResult<ImportReport> {
        let mut report = ImportReport::default();
        for portable in &document.items {
            if self.contains(&portable.id).await? {
                report.skipped.push(portable.id.clone());
                continue;
            }
            let (stable, resolved) = self.resolver().stabilize(&portable.json).await?;
            report.blanked += resolved.blanked();

            let now = Utc::now();
            let item = CatalogItem {
                id: portable.id.clone(),
                name: portable.name.clone(),
                category: portable.category.clone(),
                thumbnail: portable.thumbnail.clone(),
                created_at: now,
                updated_at: now,
            };
            if self.insert(item, &stable).await? {
                report.imported.push(portable.id.clone());
            } else {
                report.skipped.push(portable.id.clone());
            }
        }
        info!(
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "catalog imported"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{shadow_slot, ItemMeta};
    use easel_resolve::Resolver;
    use easel_store::{
        BlobStore, EphemeralRegistry, InMemoryBlobStore, InMemorySlotStore, SlotStore,
    };
    use easel_types::{AssetRef, SceneNode};

    struct Workspace {
        blobs: Arc<InMemoryBlobStore>,
        slots: Arc<InMemorySlotStore>,
        catalog: Catalog,
    }

    fn workspace() -> Workspace {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let slots = Arc::new(InMemorySlotStore::new());
        let resolver = Arc::new(Resolver::new(
            blobs.clone(),
            Arc::new(EphemeralRegistry::new()),
        ));
        Workspace {
            catalog: Catalog::new(slots.clone(), resolver),
            blobs,
            slots,
        }
    }

    fn png() -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        bytes.extend_from_slice(b"photo body");
        bytes
    }

    async fn seeded() -> (Workspace, CatalogItem) {
        let ws = workspace();
        let mut snapshot = Snapshot::blank(600, 400);
        snapshot
            .objects
            .push(SceneNode::image("photo", AssetRef::embedded(png())));
        snapshot.objects.push(SceneNode::text("title", "Hello"));
        let item = ws
            .catalog
            .save(
                ItemMeta::new("Flyer", "events").with_thumbnail("data:image/png;base64,AA=="),
                &snapshot,
                false,
            )
            .await
            .unwrap();
        (ws, item)
    }

    #[tokio::test]
    async fn export_embeds_every_asset() {
        let (ws, item) = seeded().await;
        let document = ws.catalog.export(None).await.unwrap();

        assert_eq!(document.len(), 1);
        let exported = &document.items[0];
        assert_eq!(exported.id, item.id);
        assert_eq!(exported.category, "events");
        assert!(exported.thumbnail.is_some());
        assert!(exported.json.is_self_contained());
        match exported.json.objects[0].src.as_ref().unwrap() {
            AssetRef::Embedded { media_type, bytes } => {
                assert_eq!(media_type, "image/png");
                assert_eq!(bytes, &png());
            }
            other => panic!("expected embedded asset, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn export_unknown_id_fails() {
        let (ws, _) = seeded().await;
        let err = ws
            .catalog
            .export(Some(&["missing".to_string()][..]))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn export_survives_wipe_and_import() {
        let (ws, item) = seeded().await;
        let original = ws.catalog.open(&item.id).await.unwrap();
        let file = ws.catalog.export(None).await.unwrap().to_json().unwrap();

        let fresh = workspace();
        let document = PortableDocument::decode(&file).unwrap();
        let report = fresh.catalog.import(&document).await.unwrap();

        assert_eq!(report.imported, vec![item.id.clone()]);
        assert!(report.skipped.is_empty());
        assert_eq!(fresh.catalog.open(&item.id).await.unwrap(), original);
        let key = original.durable_keys()[0];
        assert_eq!(fresh.blobs.get(&key).await.unwrap().unwrap().bytes, png());
        assert_eq!(fresh.catalog.get(&item.id).await.unwrap().unwrap().name, "Flyer");
    }

    #[tokio::test]
    async fn import_is_idempotent_by_id() {
        let (ws, item) = seeded().await;
        let document = ws.catalog.export(None).await.unwrap();

        let report = ws.catalog.import(&document).await.unwrap();

        assert!(report.imported.is_empty());
        assert_eq!(report.skipped, vec![item.id]);
        assert_eq!(ws.catalog.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn import_keeps_active_pointer() {
        let (ws, item) = seeded().await;
        let document = ws.catalog.export(None).await.unwrap();
        let other = workspace();
        other.catalog.import(&document).await.unwrap();
        assert_eq!(other.catalog.active(), None);
        assert!(other
            .slots
            .read_slot(&shadow_slot(&item.id))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn compressed_container_round_trips() {
        let (ws, _) = seeded().await;
        let document = ws.catalog.export(None).await.unwrap();

        let packed = document.to_compressed().unwrap();
        assert_eq!(&packed[..4], CONTAINER_MAGIC);
        assert_eq!(PortableDocument::decode(&packed).unwrap(), document);
    }

    #[test]
    fn plain_json_is_an_array_of_items() {
        let document = PortableDocument {
            items: vec![PortableItem {
                id: "a".into(),
                name: "A".into(),
                category: String::new(),
                thumbnail: None,
                json: Snapshot::blank(10, 10),
            }],
        };
        let value: serde_json::Value =
            serde_json::from_slice(&document.to_json().unwrap()).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["json"]["width"], 10);
    }

    #[test]
    fn decode_rejects_unknown_input() {
        let err = PortableDocument::decode(b"PK\x03\x04zip").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidMagic { actual, .. } if actual == "504b0304"));
        assert!(matches!(
            PortableDocument::decode(b"[{\"id\": 1}]").unwrap_err(),
            CatalogError::Serialization(_)
        ));
    }
}
