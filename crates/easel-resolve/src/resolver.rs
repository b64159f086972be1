use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use easel_store::{BlobStore, EphemeralRegistry};
use easel_types::{AssetKey, AssetRef, EphemeralHandle, Snapshot};
use tracing::{debug, warn};

use crate::error::ResolveResult;
use crate::report::ResolveReport;

/// What a pass does to one slot.
enum Step {
    Keep,
    Rewrite(AssetRef),
    Blank,
}

impl Step {
    fn apply(self, reference: &mut AssetRef, report: &mut ResolveReport) {
        match self {
            Step::Keep => {}
            Step::Rewrite(next) => {
                *reference = next;
                report.rewritten += 1;
            }
            Step::Blank => *reference = AssetRef::Empty,
        }
    }
}

/// Moves asset references between their ephemeral, durable and embedded
/// forms.
///
/// Holds the blob store that durable keys resolve against and the registry
/// that session handles resolve against.
pub struct Resolver {
    blobs: Arc<dyn BlobStore>,
    handles: Arc<EphemeralRegistry>,
}

impl Resolver {
    pub fn new(blobs: Arc<dyn BlobStore>, handles: Arc<EphemeralRegistry>) -> Self {
        Self { blobs, handles }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn handles(&self) -> &Arc<EphemeralRegistry> {
        &self.handles
    }

    /// Rewrite every session handle and inline payload into a durable key.
    ///
    /// Bytes are written to the blob store as needed. Durable and empty
    /// references are left alone, so the pass is idempotent. A handle that
    /// no longer resolves is blanked and reported; a storage failure aborts
    /// the pass.
    pub async fn stabilize(&self, snapshot: &Snapshot) -> ResolveResult<(Snapshot, ResolveReport)> {
        let mut stable = snapshot.clone();
        let mut report = ResolveReport::default();

        for slot in stable.asset_slots_mut() {
            let step = match &*slot.reference {
                AssetRef::Ephemeral(handle) => match self.durable_key_for(handle).await? {
                    Some(key) => Step::Rewrite(AssetRef::Durable(key)),
                    None => {
                        warn!(
                            node = slot.node_id,
                            role = ?slot.role,
                            handle = %handle,
                            "session handle no longer resolves"
                        );
                        report.note_unresolved(slot.node_id, slot.role);
                        Step::Blank
                    }
                },
                AssetRef::Embedded { bytes, .. } => {
                    Step::Rewrite(AssetRef::Durable(self.blobs.put(bytes).await?))
                }
                AssetRef::Durable(_) | AssetRef::Empty => Step::Keep,
            };
            step.apply(slot.reference, &mut report);
        }

        debug!(
            rewritten = report.rewritten,
            unresolved = report.unresolved.len(),
            "snapshot stabilized"
        );
        Ok((stable, report))
    }

    /// Rewrite every durable key into a fresh session handle.
    ///
    /// Each distinct key is read once per pass. Keys with no blob behind
    /// them are blanked and reported. Inline payloads stay inline.
    pub async fn materialize(&self, snapshot: &Snapshot) -> (Snapshot, ResolveReport) {
        let mut live = snapshot.clone();
        let mut report = ResolveReport::default();
        let mut minted: HashMap<AssetKey, Option<EphemeralHandle>> = HashMap::new();

        for slot in live.asset_slots_mut() {
            let step = match &*slot.reference {
                AssetRef::Durable(key) => {
                    let key = *key;
                    let handle = match minted.get(&key) {
                        Some(handle) => handle.clone(),
                        None => {
                            let handle = match self.handles.handle_for_key(&key) {
                                Some(live) => Some(live),
                                None => self
                                    .fetch(&key)
                                    .await
                                    .map(|bytes| self.handles.mint_for_key(key, bytes)),
                            };
                            minted.insert(key, handle.clone());
                            handle
                        }
                    };
                    match handle {
                        Some(handle) => Step::Rewrite(AssetRef::Ephemeral(handle)),
                        None => {
                            warn!(node = slot.node_id, key = %key.short_hex(), "asset missing from blob store");
                            report.note_missing(slot.node_id, slot.role, key);
                            Step::Blank
                        }
                    }
                }
                AssetRef::Ephemeral(handle) if self.handles.resolve(handle).is_none() => {
                    warn!(node = slot.node_id, handle = %handle, "session handle no longer resolves");
                    report.note_unresolved(slot.node_id, slot.role);
                    Step::Blank
                }
                _ => Step::Keep,
            };
            step.apply(slot.reference, &mut report);
        }

        debug!(
            rewritten = report.rewritten,
            missing = report.missing.len(),
            "snapshot materialized"
        );
        (live, report)
    }

    /// Rewrite every durable key and live session handle into inline data.
    ///
    /// The result depends on no storage at all. Unresolvable references are
    /// blanked and reported.
    pub async fn embed(&self, snapshot: &Snapshot) -> (Snapshot, ResolveReport) {
        let mut portable = snapshot.clone();
        let mut report = ResolveReport::default();
        let mut fetched: HashMap<AssetKey, Option<AssetRef>> = HashMap::new();

        for slot in portable.asset_slots_mut() {
            let step = match &*slot.reference {
                AssetRef::Durable(key) => {
                    let key = *key;
                    let embedded = match fetched.get(&key) {
                        Some(embedded) => embedded.clone(),
                        None => {
                            let embedded = self.fetch(&key).await.map(AssetRef::embedded);
                            fetched.insert(key, embedded.clone());
                            embedded
                        }
                    };
                    match embedded {
                        Some(embedded) => Step::Rewrite(embedded),
                        None => {
                            warn!(node = slot.node_id, key = %key.short_hex(), "asset missing from blob store");
                            report.note_missing(slot.node_id, slot.role, key);
                            Step::Blank
                        }
                    }
                }
                AssetRef::Ephemeral(handle) => match self.handles.resolve(handle) {
                    Some(bytes) => Step::Rewrite(AssetRef::embedded(bytes.to_vec())),
                    None => {
                        warn!(node = slot.node_id, handle = %handle, "session handle no longer resolves");
                        report.note_unresolved(slot.node_id, slot.role);
                        Step::Blank
                    }
                },
                AssetRef::Embedded { .. } | AssetRef::Empty => Step::Keep,
            };
            step.apply(slot.reference, &mut report);
        }

        debug!(
            rewritten = report.rewritten,
            blanked = report.blanked(),
            "snapshot embedded"
        );
        (portable, report)
    }

    async fn durable_key_for(&self, handle: &EphemeralHandle) -> ResolveResult<Option<AssetKey>> {
        if let Some(key) = self.handles.known_key(handle) {
            if self.blobs.contains(&key).await? {
                return Ok(Some(key));
            }
            debug!(key = %key.short_hex(), handle = %handle, "known blob was removed, storing again");
        }
        let Some(bytes) = self.handles.resolve(handle) else {
            return Ok(None);
        };
        let key = self.blobs.put(&bytes).await?;
        self.handles.remember_key(handle, key);
        Ok(Some(key))
    }

    async fn fetch(&self, key: &AssetKey) -> Option<Vec<u8>> {
        match self.blobs.get(key).await {
            Ok(record) => record.map(|record| record.bytes),
            Err(error) => {
                warn!(key = %key.short_hex(), %error, "blob read failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("handles", &self.handles)
            .finish_non_exhaustive()
    }
}

/// Every durable key referenced by any of `snapshots`.
pub fn referenced_keys<'a, I>(snapshots: I) -> BTreeSet<AssetKey>
where
    I: IntoIterator<Item = &'a Snapshot>,
{
    snapshots
        .into_iter()
        .flat_map(Snapshot::durable_keys)
        .collect()
}
