use easel_types::{AssetKey, SlotRole};

/// A session handle that no longer resolved during a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnresolvedSlot {
    pub node_id: String,
    pub role: SlotRole,
}

/// A durable key with no blob behind it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingAsset {
    pub node_id: String,
    pub role: SlotRole,
    pub key: AssetKey,
}

/// Outcome of one resolver pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// References rewritten into the pass's target form.
    pub rewritten: usize,
    /// Revoked or foreign session handles, now empty.
    pub unresolved: Vec<UnresolvedSlot>,
    /// Durable keys absent from the blob store, now empty.
    pub missing: Vec<MissingAsset>,
}

impl ResolveReport {
    /// Returns `true` if every reference resolved.
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty() && self.missing.is_empty()
    }

    /// Number of references that were blanked.
    pub fn blanked(&self) -> usize {
        self.unresolved.len() + self.missing.len()
    }

    pub(crate) fn note_unresolved(&mut self, node_id: &str, role: SlotRole) {
        self.unresolved.push(UnresolvedSlot {
            node_id: node_id.to_string(),
            role,
        });
    }

    pub(crate) fn note_missing(&mut self, node_id: &str, role: SlotRole, key: AssetKey) {
        self.missing.push(MissingAsset {
            node_id: node_id.to_string(),
            role,
            key,
        });
    }
}
