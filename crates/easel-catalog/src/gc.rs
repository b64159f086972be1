use std::collections::BTreeSet;

use easel_store::BlobStore;
use easel_types::AssetKey;
use tracing::{debug, info};

use crate::error::CatalogResult;

/// Outcome of a garbage collection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Blobs examined.
    pub scanned: usize,
    /// Blobs kept because a root references them.
    pub retained: usize,
    /// Blobs deleted.
    pub removed: Vec<AssetKey>,
    /// Bytes released by the deletions.
    pub freed_bytes: u64,
}

/// Delete every blob whose key is not in `roots`.
///
/// The caller gathers `roots` from everything that may still resolve a
/// durable key: catalog payloads, the autosave slot, in-memory history and
/// cutouts. Blobs written concurrently with a pass are only safe if their
/// keys are already in `roots`.
pub async fn collect_garbage(
    blobs: &dyn BlobStore,
    roots: &BTreeSet<AssetKey>,
) -> CatalogResult<GcReport> {
    let mut report = GcReport::default();
    for key in blobs.keys().await? {
        report.scanned += 1;
        if roots.contains(&key) {
            report.retained += 1;
            continue;
        }
        let size = blobs.get(&key).await?.map_or(0, |record| record.size());
        if blobs.delete(&key).await? {
            debug!(key = %key.short_hex(), size, "unreferenced blob deleted");
            report.removed.push(key);
            report.freed_bytes += size;
        }
    }
    info!(
        scanned = report.scanned,
        removed = report.removed.len(),
        freed_bytes = report.freed_bytes,
        "garbage collection finished"
    );
    Ok(report)
}
