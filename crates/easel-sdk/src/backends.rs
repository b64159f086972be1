use std::path::Path;
use std::sync::Arc;

use easel_store::{
    BlobStore, FsBlobStore, FsSlotStore, InMemoryBlobStore, InMemorySlotStore, SlotStore,
    StoreResult,
};
use tracing::debug;

use crate::config::EditorConfig;

/// Directory under the storage root holding blobs.
pub const BLOBS_DIR: &str = "blobs";

/// Directory under the storage root holding slots.
pub const SLOTS_DIR: &str = "slots";

/// The storage an editor runs on.
///
/// `slots` outlives sessions (catalog, payloads, autosave, cutouts);
/// `session` lives exactly as long as one session and is shared across
/// reloads within it.
#[derive(Clone)]
pub struct Backends {
    pub blobs: Arc<dyn BlobStore>,
    pub slots: Arc<dyn SlotStore>,
    pub session: Arc<dyn SlotStore>,
}

impl Backends {
    /// Everything in memory.
    pub fn in_memory(config: &EditorConfig) -> Self {
        let blobs = match config.blob_quota_bytes {
            Some(quota) => InMemoryBlobStore::with_quota(quota),
            None => InMemoryBlobStore::new(),
        };
        Self {
            blobs: Arc::new(blobs),
            slots: Arc::new(InMemorySlotStore::new()),
            session: Arc::new(InMemorySlotStore::new()),
        }
    }

    /// Blobs and slots under `root`; session state in memory.
    pub async fn on_disk(root: &Path, config: &EditorConfig) -> StoreResult<Self> {
        let mut blobs = FsBlobStore::open(root.join(BLOBS_DIR)).await?;
        if let Some(quota) = config.blob_quota_bytes {
            blobs = blobs.with_quota(quota);
        }
        let slots = FsSlotStore::open(root.join(SLOTS_DIR)).await?;
        debug!(root = %root.display(), "opened on-disk stores");
        Ok(Self {
            blobs: Arc::new(blobs),
            slots: Arc::new(slots),
            session: Arc::new(InMemorySlotStore::new()),
        })
    }

    /// On disk when the config names a storage root, else in memory.
    pub async fn from_config(config: &EditorConfig) -> StoreResult<Self> {
        match &config.storage_root {
            Some(root) => Self::on_disk(root, config).await,
            None => Ok(Self::in_memory(config)),
        }
    }

    /// Replace the session store, e.g. to carry it across a reload.
    pub fn with_session(mut self, session: Arc<dyn SlotStore>) -> Self {
        self.session = session;
        self
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}
