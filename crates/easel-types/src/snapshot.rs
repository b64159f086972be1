use serde::{Deserialize, Serialize};

use crate::asset::AssetRef;
use crate::error::TypeError;
use crate::key::AssetKey;
use crate::node::{AssetSlot, SceneNode, SlotRole};

/// Current snapshot document version.
pub const SNAPSHOT_VERSION: u32 = 1;

fn current_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Immutable serialization of a whole canvas at one point in time.
///
/// Snapshots are never mutated once handed out: every rewriting pass works
/// on a clone. Canvas dimensions are stored so a design restores with its own
/// layout regardless of the current viewport or zoom.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default = "current_version")]
    pub version: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub objects: Vec<SceneNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<Box<SceneNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_image: Option<Box<SceneNode>>,
}

impl Snapshot {
    /// An empty canvas with a white background.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            width,
            height,
            objects: Vec::new(),
            background_color: Some("#ffffff".into()),
            background_image: None,
            overlay_image: None,
        }
    }

    /// Mutable slots for every asset reference, in document order:
    /// background image, objects, overlay image.
    pub fn asset_slots_mut(&mut self) -> Vec<AssetSlot<'_>> {
        let mut slots = Vec::new();
        let Snapshot {
            objects,
            background_image,
            overlay_image,
            ..
        } = self;
        if let Some(bg) = background_image.as_deref_mut() {
            bg.collect_slots(&mut slots);
        }
        for node in objects.iter_mut() {
            node.collect_slots(&mut slots);
        }
        if let Some(overlay) = overlay_image.as_deref_mut() {
            overlay.collect_slots(&mut slots);
        }
        slots
    }

    /// Visit every asset reference read-only, in the same order as
    /// [`Snapshot::asset_slots_mut`].
    pub fn visit_refs<F>(&self, mut f: F)
    where
        F: FnMut(&SceneNode, SlotRole, &AssetRef),
    {
        if let Some(bg) = &self.background_image {
            bg.visit_refs(&mut f);
        }
        for node in &self.objects {
            node.visit_refs(&mut f);
        }
        if let Some(overlay) = &self.overlay_image {
            overlay.visit_refs(&mut f);
        }
    }

    /// Every durable key referenced by this snapshot, deduplicated and sorted.
    pub fn durable_keys(&self) -> Vec<AssetKey> {
        let mut keys = Vec::new();
        self.visit_refs(|_, _, reference| {
            if let Some(key) = reference.durable_key() {
                keys.push(*key);
            }
        });
        keys.sort();
        keys.dedup();
        keys
    }

    /// Returns `true` if any reference is a session-local handle.
    pub fn has_ephemeral(&self) -> bool {
        let mut found = false;
        self.visit_refs(|_, _, reference| found |= reference.is_ephemeral());
        found
    }

    /// Returns `true` if the snapshot depends on no external storage: every
    /// reference is embedded or empty.
    pub fn is_self_contained(&self) -> bool {
        let mut contained = true;
        self.visit_refs(|_, _, reference| {
            contained &= reference.is_embedded() || reference.is_empty();
        });
        contained
    }

    /// Total number of nodes, including nested children and clip masks.
    pub fn node_count(&self) -> usize {
        self.objects.iter().map(SceneNode::subtree_len).sum::<usize>()
            + self.background_image.as_ref().map_or(0, |n| n.subtree_len())
            + self.overlay_image.as_ref().map_or(0, |n| n.subtree_len())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_json(data: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
