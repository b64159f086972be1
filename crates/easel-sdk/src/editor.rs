use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use easel_autosave::{AutosaveOutcome, AutosaveScheduler, SessionMarker, SessionStart};
use easel_catalog::{
    collect_garbage, Catalog, CutoutLibrary, GcReport, ImportReport, ItemMeta, PortableDocument,
};
use easel_history::{BusyFlag, HistoryStack, PushOutcome};
use easel_resolve::{referenced_keys, Resolver};
use easel_scene::capture;
use easel_store::{BlobStore, EphemeralRegistry};
use easel_types::{AssetRef, CatalogItem, Cutout, EphemeralHandle, SceneNode, Snapshot};
use tracing::{debug, info, warn};

use crate::backends::Backends;
use crate::config::EditorConfig;
use crate::error::{EditorError, EditorResult};
use crate::host::SceneHost;

/// Result of [`Editor::commit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new history entry was recorded. `evicted` is set when the oldest
    /// entry fell off the bounded history.
    Pushed { evicted: bool },
    /// The scene matched the current entry; nothing was recorded.
    Unchanged,
    /// A load, undo or redo was in flight; the change came from it.
    Suppressed,
}

#[derive(Clone, Copy, Debug)]
enum Direction {
    Back,
    Forward,
}

/// The editor's persistence side: history, autosave, catalog and assets.
///
/// The rendering engine is passed to each call that reads or replaces the
/// live scene, so one editor can drive any [`SceneHost`].
pub struct Editor {
    config: EditorConfig,
    blobs: Arc<dyn BlobStore>,
    handles: Arc<EphemeralRegistry>,
    resolver: Arc<Resolver>,
    history: Mutex<HistoryStack>,
    busy: BusyFlag,
    autosave: AutosaveScheduler,
    session: SessionMarker,
    catalog: Catalog,
    cutouts: CutoutLibrary,
}

impl Editor {
    pub fn new(config: EditorConfig, backends: Backends) -> Self {
        let handles = Arc::new(EphemeralRegistry::new());
        let resolver = Arc::new(Resolver::new(
            Arc::clone(&backends.blobs),
            Arc::clone(&handles),
        ));
        let busy = BusyFlag::new();
        let autosave = AutosaveScheduler::new(
            Arc::clone(&resolver),
            Arc::clone(&backends.slots),
            busy.clone(),
            config.autosave_debounce(),
        );
        Self {
            history: Mutex::new(HistoryStack::with_limit(config.max_history)),
            session: SessionMarker::new(backends.session),
            catalog: Catalog::new(Arc::clone(&backends.slots), Arc::clone(&resolver)),
            cutouts: CutoutLibrary::new(Arc::clone(&backends.blobs), backends.slots),
            blobs: backends.blobs,
            config,
            handles,
            resolver,
            busy,
            autosave,
        }
    }

    /// Build an editor on the stores named by `config`.
    pub async fn from_config(config: EditorConfig) -> EditorResult<Self> {
        let backends = Backends::from_config(&config).await?;
        Ok(Self::new(config, backends))
    }

    // ---- Session ----

    /// Bring `host` to its start-up scene.
    ///
    /// A fresh session starts blank. A reload within a running session
    /// restores the autosave slot, falling back to blank when it is absent
    /// or unreadable.
    pub async fn start(&self, host: &dyn SceneHost) -> EditorResult<SessionStart> {
        let start = self.session.begin().await?;
        let restored = match start {
            SessionStart::Fresh => None,
            SessionStart::Reload => match self.autosave.restore().await {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    warn!(%error, "autosave unreadable, starting blank");
                    None
                }
            },
        };
        let restored_autosave = restored.is_some();
        let snapshot = restored.unwrap_or_else(|| self.blank());
        self.replace_document(host, snapshot).await?;
        info!(?start, restored_autosave, "editor started");
        Ok(start)
    }

    /// End the session so the next start is fresh. Pending autosave is
    /// written first.
    pub async fn end_session(&self) -> EditorResult<()> {
        self.flush_autosave().await?;
        self.session.end().await?;
        Ok(())
    }

    // ---- History ----

    /// Record the host's current scene as a history entry.
    ///
    /// The busy flag is held from capture to push, so a commit never
    /// interleaves with a load, undo or redo. On a storage failure nothing
    /// is recorded and the live scene is left as it is.
    pub async fn commit(&self, host: &dyn SceneHost) -> EditorResult<CommitOutcome> {
        let Some(_guard) = self.busy.try_enter() else {
            debug!("commit suppressed during history operation");
            return Ok(CommitOutcome::Suppressed);
        };
        let snapshot = capture(&host.scene());
        let (stable, report) = self.resolver.stabilize(&snapshot).await?;
        if !report.is_clean() {
            warn!(blanked = report.blanked(), "commit blanked unresolvable references");
        }

        let outcome = self.lock_history().push(stable.clone());
        match outcome {
            PushOutcome::Unchanged => Ok(CommitOutcome::Unchanged),
            PushOutcome::Pushed { evicted, .. } => {
                self.autosave.schedule(stable);
                Ok(CommitOutcome::Pushed { evicted })
            }
        }
    }

    pub async fn undo(&self, host: &dyn SceneHost) -> EditorResult<()> {
        self.step(host, Direction::Back).await
    }

    pub async fn redo(&self, host: &dyn SceneHost) -> EditorResult<()> {
        self.step(host, Direction::Forward).await
    }

    async fn step(&self, host: &dyn SceneHost, direction: Direction) -> EditorResult<()> {
        let _guard = self.busy.try_enter().ok_or(EditorError::Busy)?;
        self.autosave.cancel();

        let target = {
            let mut history = self.lock_history();
            let target = match direction {
                Direction::Back => history.undo()?,
                Direction::Forward => history.redo()?,
            };
            target.clone()
        };

        if let Err(error) = self.present(host, &target).await {
            let current = {
                let mut history = self.lock_history();
                let reverted = match direction {
                    Direction::Back => history.redo().is_ok(),
                    Direction::Forward => history.undo().is_ok(),
                };
                debug_assert!(reverted);
                history.current().cloned()
            };
            if let Some(current) = current {
                self.autosave.schedule(current);
            }
            warn!(?direction, %error, "history step failed, cursor restored");
            return Err(error);
        }

        debug!(?direction, nodes = target.node_count(), "history step applied");
        self.autosave.schedule(target);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.lock_history().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.lock_history().can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.lock_history().len()
    }

    /// The history entry the cursor points at.
    pub fn current(&self) -> Option<Snapshot> {
        self.lock_history().current().cloned()
    }

    // ---- Documents ----

    /// Replace the scene with a blank canvas and forget the active item.
    pub async fn new_document(&self, host: &dyn SceneHost) -> EditorResult<()> {
        self.replace_document(host, self.blank()).await?;
        self.catalog.clear_active();
        Ok(())
    }

    /// Save the host's scene to the catalog.
    ///
    /// Overwrites the active item unless `force_new` is set.
    pub async fn save(
        &self,
        host: &dyn SceneHost,
        meta: ItemMeta,
        force_new: bool,
    ) -> EditorResult<CatalogItem> {
        let snapshot = capture(&host.scene());
        Ok(self.catalog.save(meta, &snapshot, force_new).await?)
    }

    /// Load catalog item `id` into `host`.
    ///
    /// If the payload is malformed or the host refuses it, the previous
    /// scene, history and active item stay as they were.
    pub async fn open_item(&self, host: &dyn SceneHost, id: &str) -> EditorResult<()> {
        let previous = self.catalog.active();
        let snapshot = self.catalog.open(id).await?;
        if let Err(error) = self.replace_document(host, snapshot).await {
            self.catalog.set_active(previous);
            warn!(id, %error, "open failed, previous design kept");
            return Err(error);
        }
        Ok(())
    }

    pub async fn list_items(&self) -> EditorResult<Vec<CatalogItem>> {
        Ok(self.catalog.list().await?)
    }

    pub async fn rename_item(&self, id: &str, name: &str) -> EditorResult<CatalogItem> {
        Ok(self.catalog.rename(id, name).await?)
    }

    pub async fn delete_item(&self, id: &str) -> EditorResult<bool> {
        Ok(self.catalog.delete(id).await?)
    }

    pub async fn export(&self, ids: Option<&[String]>) -> EditorResult<PortableDocument> {
        Ok(self.catalog.export(ids).await?)
    }

    pub async fn import(&self, document: &PortableDocument) -> EditorResult<ImportReport> {
        Ok(self.catalog.import(document).await?)
    }

    /// Decode a portable file (plain or compressed) and import it.
    pub async fn import_bytes(&self, data: &[u8]) -> EditorResult<ImportReport> {
        let document = PortableDocument::decode(data)?;
        self.import(&document).await
    }

    // ---- Assets ----

    /// Register new image bytes for this session.
    ///
    /// The returned reference is valid until the session ends or until
    /// [`Editor::release_handles`] drops it after its bytes were stored. It
    /// becomes durable the next time a snapshot holding it is committed or
    /// saved.
    pub fn ingest(&self, bytes: Vec<u8>) -> AssetRef {
        AssetRef::Ephemeral(self.handles.mint(bytes))
    }

    /// A copy of `node` showing `derived` bytes, keeping the earliest source
    /// as its original so the derivation can be undone later.
    pub fn ingest_derived(&self, node: &SceneNode, derived: Vec<u8>) -> SceneNode {
        let mut out = node.clone();
        out.original_src = node.original_src.clone().or_else(|| node.src.clone());
        out.src = Some(self.ingest(derived));
        out
    }

    pub async fn save_cutout(&self, name: &str, bytes: &[u8]) -> EditorResult<Cutout> {
        Ok(self.cutouts.add(name, bytes).await?)
    }

    /// Delete every blob nothing can reach any more.
    ///
    /// Roots are the catalog payloads, the history, the autosave slot, the
    /// cutout library and every live session handle. Orphaned payloads are
    /// pruned first.
    pub async fn collect_garbage(&self) -> EditorResult<GcReport> {
        self.catalog.prune_orphans().await?;
        let mut roots = self.catalog.referenced_keys().await?;
        roots.extend(self.handles.keyed_handles().into_iter().map(|(_, key)| key));
        roots.extend(referenced_keys(self.lock_history().iter()));
        match self.autosave.restore().await {
            Ok(Some(snapshot)) => roots.extend(snapshot.durable_keys()),
            Ok(None) => {}
            Err(error) => warn!(%error, "autosave unreadable, not used as a root"),
        }
        roots.extend(self.cutouts.keys().await?);
        Ok(collect_garbage(self.blobs.as_ref(), &roots).await?)
    }

    /// Revoke handles the live scene no longer shows whose bytes are safely
    /// in the blob store. They are minted again on the next materialize.
    /// Handles holding bytes not yet stored are kept. Returns how many were
    /// revoked.
    pub async fn release_handles(&self, host: &dyn SceneHost) -> usize {
        let mut on_screen: HashSet<EphemeralHandle> = HashSet::new();
        host.scene().visit_refs(|_, _, reference| {
            if let AssetRef::Ephemeral(handle) = reference {
                on_screen.insert(handle.clone());
            }
        });

        let mut revoked = 0;
        for (handle, key) in self.handles.keyed_handles() {
            if on_screen.contains(&handle) {
                continue;
            }
            match self.blobs.contains(&key).await {
                Ok(true) => {
                    if self.handles.revoke(&handle) {
                        revoked += 1;
                    }
                }
                Ok(false) => {}
                Err(error) => warn!(key = %key.short_hex(), %error, "blob lookup failed, handle kept"),
            }
        }
        if revoked > 0 {
            debug!(revoked, live = self.handles.len(), "session handles released");
        }
        revoked
    }

    // ---- Autosave ----

    /// Write the current history entry to the autosave slot now.
    pub async fn flush_autosave(&self) -> EditorResult<Option<AutosaveOutcome>> {
        let Some(current) = self.current() else {
            return Ok(None);
        };
        Ok(Some(self.autosave.flush(&current).await?))
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    // ---- Accessors ----

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cutouts(&self) -> &CutoutLibrary {
        &self.cutouts
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn handles(&self) -> &Arc<EphemeralRegistry> {
        &self.handles
    }

    // ---- Internal ----

    fn blank(&self) -> Snapshot {
        Snapshot::blank(self.config.canvas_width, self.config.canvas_height)
    }

    fn lock_history(&self) -> MutexGuard<'_, HistoryStack> {
        self.history.lock().expect("lock poisoned")
    }

    /// Materialize `stable` and hand it to the host.
    async fn present(&self, host: &dyn SceneHost, stable: &Snapshot) -> EditorResult<()> {
        let (live, report) = self.resolver.materialize(stable).await;
        if !report.is_clean() {
            warn!(blanked = report.blanked(), "loaded scene has missing assets");
        }
        host.load(live).await?;
        Ok(())
    }

    /// Load `stable` as a new document with a one-entry history.
    ///
    /// If the host refuses it, the previous document's autosave is
    /// rescheduled.
    async fn replace_document(&self, host: &dyn SceneHost, stable: Snapshot) -> EditorResult<()> {
        let _guard = self.busy.try_enter().ok_or(EditorError::Busy)?;
        self.autosave.cancel();
        if let Err(error) = self.present(host, &stable).await {
            if let Some(current) = self.current() {
                self.autosave.schedule(current);
            }
            return Err(error);
        }
        self.lock_history().reset(stable.clone());
        self.autosave.schedule(stable);
        self.release_handles(host).await;
        Ok(())
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("config", &self.config)
            .field("history_len", &self.history_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::host::MemoryHost;
    use easel_autosave::AUTOSAVE_SLOT;
    use easel_catalog::{shadow_slot, CatalogError};
    use easel_resolve::ResolveError;
    use easel_scene::SceneGraph;
    use easel_store::{
        BlobRecord, InMemoryBlobStore, InMemorySlotStore, SlotStore, StoreError, StoreResult,
    };
    use easel_types::AssetKey;

    fn png(tag: u8) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        bytes.extend_from_slice(&[tag; 24]);
        bytes
    }

    fn config() -> EditorConfig {
        EditorConfig {
            canvas_width: 800,
            canvas_height: 600,
            ..EditorConfig::default()
        }
    }

    struct Rig {
        blobs: Arc<InMemoryBlobStore>,
        slots: Arc<InMemorySlotStore>,
        session: Arc<InMemorySlotStore>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                blobs: Arc::new(InMemoryBlobStore::new()),
                slots: Arc::new(InMemorySlotStore::new()),
                session: Arc::new(InMemorySlotStore::new()),
            }
        }

        fn backends(&self) -> Backends {
            Backends {
                blobs: self.blobs.clone(),
                slots: self.slots.clone(),
                session: self.session.clone(),
            }
        }

        /// An editor on the same storage, as after a page reload.
        fn editor(&self) -> Editor {
            Editor::new(config(), self.backends())
        }

        /// An editor on the same durable storage in a brand new session.
        fn editor_in_new_session(&self) -> Editor {
            let backends = self
                .backends()
                .with_session(Arc::new(InMemorySlotStore::new()));
            Editor::new(config(), backends)
        }
    }

    async fn started() -> (Rig, Editor, MemoryHost) {
        let rig = Rig::new();
        let editor = rig.editor();
        let host = MemoryHost::default();
        assert_eq!(editor.start(&host).await.unwrap(), SessionStart::Fresh);
        (rig, editor, host)
    }

    fn image_bytes(editor: &Editor, host: &MemoryHost, id: &str) -> Vec<u8> {
        let src = host.edit(|scene| scene.find(id).and_then(|n| n.src.clone()));
        match src {
            Some(AssetRef::Ephemeral(handle)) => editor
                .handles()
                .resolve(&handle)
                .map(|bytes| bytes.to_vec())
                .unwrap_or_default(),
            other => panic!("expected a live handle on {id}, got {other:?}"),
        }
    }

    /// Blob store that yields to the scheduler before every write.
    #[derive(Default)]
    struct YieldingBlobs(InMemoryBlobStore);

    #[async_trait::async_trait]
    impl BlobStore for YieldingBlobs {
        async fn put(&self, bytes: &[u8]) -> StoreResult<AssetKey> {
            tokio::task::yield_now().await;
            self.0.put(bytes).await
        }

        async fn get(&self, key: &AssetKey) -> StoreResult<Option<BlobRecord>> {
            self.0.get(key).await
        }

        async fn delete(&self, key: &AssetKey) -> StoreResult<bool> {
            self.0.delete(key).await
        }

        async fn keys(&self) -> StoreResult<Vec<AssetKey>> {
            self.0.keys().await
        }

        async fn total_bytes(&self) -> StoreResult<u64> {
            self.0.total_bytes().await
        }
    }

    async fn stable_scene(editor: &Editor, host: &MemoryHost) -> Snapshot {
        let (stable, _) = editor
            .resolver()
            .stabilize(&capture(&host.scene()))
            .await
            .unwrap();
        stable
    }

    // -----------------------------------------------------------------------
    // start-up
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn fresh_start_is_blank_with_one_entry() {
        let (_rig, editor, host) = started().await;
        assert_eq!(host.scene(), SceneGraph::new(800, 600));
        assert_eq!(editor.history_len(), 1);
        assert!(!editor.can_undo());
    }

    #[tokio::test(start_paused = true)]
    async fn reload_restores_autosave() {
        let (rig, editor, host) = started().await;
        let src = editor.ingest(png(1));
        host.edit(|scene| scene.add(SceneNode::image("photo", src)));
        editor.commit(&host).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(rig.slots.read_slot(AUTOSAVE_SLOT).await.unwrap().is_some());
        drop(editor);

        let reloaded = rig.editor();
        let host = MemoryHost::default();
        assert_eq!(reloaded.start(&host).await.unwrap(), SessionStart::Reload);
        assert_eq!(image_bytes(&reloaded, &host, "photo"), png(1));
        assert_eq!(reloaded.history_len(), 1);
    }

    #[tokio::test]
    async fn reload_with_corrupt_autosave_starts_blank() {
        let rig = Rig::new();
        rig.editor().start(&MemoryHost::default()).await.unwrap();
        rig.slots.write_slot(AUTOSAVE_SLOT, b"{ nope").await.unwrap();

        let host = MemoryHost::default();
        let reloaded = rig.editor();
        assert_eq!(reloaded.start(&host).await.unwrap(), SessionStart::Reload);
        assert_eq!(host.scene(), SceneGraph::new(800, 600));
    }

    // -----------------------------------------------------------------------
    // commit / undo / redo
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn commit_skips_unchanged_scene() {
        let (_rig, editor, host) = started().await;
        assert_eq!(editor.commit(&host).await.unwrap(), CommitOutcome::Unchanged);

        host.edit(|scene| scene.add(SceneNode::rect("box", "#f00")));
        assert_eq!(
            editor.commit(&host).await.unwrap(),
            CommitOutcome::Pushed { evicted: false }
        );
        assert_eq!(editor.commit(&host).await.unwrap(), CommitOutcome::Unchanged);
        assert_eq!(editor.history_len(), 2);
    }

    #[tokio::test]
    async fn commit_ignores_transient_nodes() {
        let (_rig, editor, host) = started().await;
        host.edit(|scene| scene.add(SceneNode::rect("selection", "#00f").transient()));
        assert_eq!(editor.commit(&host).await.unwrap(), CommitOutcome::Unchanged);
    }

    #[tokio::test]
    async fn commit_is_suppressed_while_busy() {
        let (_rig, editor, host) = started().await;
        host.edit(|scene| scene.add(SceneNode::rect("box", "#f00")));

        let guard = editor.busy.try_enter().unwrap();
        assert_eq!(editor.commit(&host).await.unwrap(), CommitOutcome::Suppressed);
        assert!(matches!(editor.undo(&host).await, Err(EditorError::Busy)));
        drop(guard);

        assert_eq!(editor.history_len(), 1);
    }

    #[tokio::test]
    async fn undo_waits_out_a_commit_in_flight() {
        let rig = Rig::new();
        let backends = Backends {
            blobs: Arc::new(YieldingBlobs::default()),
            ..rig.backends()
        };
        let editor = Editor::new(config(), backends);
        let host = MemoryHost::default();
        editor.start(&host).await.unwrap();
        host.edit(|scene| scene.add(SceneNode::rect("box", "#f00")));
        editor.commit(&host).await.unwrap();

        let src = editor.ingest(png(4));
        host.edit(|scene| scene.add(SceneNode::image("photo", src)));
        let (committed, undone) = tokio::join!(editor.commit(&host), editor.undo(&host));

        assert_eq!(committed.unwrap(), CommitOutcome::Pushed { evicted: false });
        assert!(matches!(undone, Err(EditorError::Busy)));
        assert_eq!(editor.history_len(), 3);
        assert!(editor.can_undo());
        assert!(!editor.can_redo());
        assert_eq!(editor.current().unwrap().objects.len(), 2);
        assert!(host.scene().find("photo").is_some());
    }

    #[tokio::test]
    async fn undo_then_redo_restores_the_scene() {
        let (_rig, editor, host) = started().await;
        let src = editor.ingest(png(2));
        host.edit(|scene| {
            scene.add(SceneNode::image("photo", src).with_geometry(10.0, 20.0, 300.0, 200.0));
            scene.add(SceneNode::text("title", "Summer sale"));
        });
        editor.commit(&host).await.unwrap();
        let before = stable_scene(&editor, &host).await;

        editor.undo(&host).await.unwrap();
        assert_eq!(host.scene().objects.len(), 0);
        assert!(editor.can_redo());

        editor.redo(&host).await.unwrap();
        assert_eq!(stable_scene(&editor, &host).await, before);
        assert_eq!(image_bytes(&editor, &host, "photo"), png(2));
    }

    #[tokio::test]
    async fn new_commit_after_undo_truncates_redo() {
        let (_rig, editor, host) = started().await;
        host.edit(|scene| scene.add(SceneNode::rect("a", "#111")));
        editor.commit(&host).await.unwrap();
        editor.undo(&host).await.unwrap();

        host.edit(|scene| scene.add(SceneNode::rect("b", "#222")));
        editor.commit(&host).await.unwrap();

        assert!(!editor.can_redo());
        assert_eq!(editor.history_len(), 2);
        assert_eq!(editor.current().unwrap().objects[0].id, "b");
    }

    #[tokio::test]
    async fn undo_at_oldest_entry_fails() {
        let (_rig, editor, host) = started().await;
        assert!(matches!(
            editor.undo(&host).await,
            Err(EditorError::History(easel_history::HistoryError::NothingToUndo))
        ));
    }

    #[tokio::test]
    async fn failed_load_keeps_cursor_and_scene() {
        let (_rig, editor, host) = started().await;
        host.edit(|scene| scene.add(SceneNode::rect("box", "#f00")));
        editor.commit(&host).await.unwrap();
        let live = host.scene();

        host.fail_next_loads(1);
        assert!(matches!(editor.undo(&host).await, Err(EditorError::Host(_))));

        assert_eq!(host.scene(), live);
        assert!(editor.can_undo());
        assert!(!editor.can_redo());
        editor.undo(&host).await.unwrap();
        assert!(host.scene().objects.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_on_commit_records_nothing() {
        let rig = Rig::new();
        let backends = Backends {
            blobs: Arc::new(InMemoryBlobStore::with_quota(16)),
            ..rig.backends()
        };
        let editor = Editor::new(config(), backends);
        let host = MemoryHost::default();
        editor.start(&host).await.unwrap();

        let src = editor.ingest(png(3));
        host.edit(|scene| scene.add(SceneNode::image("photo", src)));
        let err = editor.commit(&host).await.unwrap_err();

        assert!(matches!(
            err,
            EditorError::Resolve(ResolveError::Store(StoreError::QuotaExceeded { .. }))
        ));
        assert_eq!(editor.history_len(), 1);
        assert!(host.scene().find("photo").is_some());
    }

    #[tokio::test]
    async fn history_is_bounded_by_config() {
        let rig = Rig::new();
        let editor = Editor::new(
            EditorConfig {
                max_history: 3,
                ..config()
            },
            rig.backends(),
        );
        let host = MemoryHost::default();
        editor.start(&host).await.unwrap();
        let mut last = CommitOutcome::Unchanged;
        for i in 0..5 {
            host.edit(|scene| scene.add(SceneNode::rect(format!("r{i}"), "#000")));
            last = editor.commit(&host).await.unwrap();
        }
        assert_eq!(editor.history_len(), 3);
        assert_eq!(last, CommitOutcome::Pushed { evicted: true });
    }

    // -----------------------------------------------------------------------
    // autosave
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn undo_replaces_pending_autosave() {
        let (rig, editor, host) = started().await;
        host.edit(|scene| scene.add(SceneNode::rect("a", "#111")));
        editor.commit(&host).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        host.edit(|scene| scene.add(SceneNode::rect("b", "#222")));
        editor.commit(&host).await.unwrap();
        assert!(editor.autosave_pending());
        editor.undo(&host).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let saved = rig.slots.read_slot(AUTOSAVE_SLOT).await.unwrap().unwrap();
        let saved = Snapshot::from_json(&saved).unwrap();
        assert_eq!(saved.objects.len(), 1);
        assert_eq!(saved.objects[0].id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn refused_open_keeps_pending_autosave() {
        let (rig, editor, host) = started().await;
        let item = editor.save(&host, ItemMeta::new("blank", ""), false).await.unwrap();
        host.edit(|scene| scene.add(SceneNode::rect("box", "#f00")));
        editor.commit(&host).await.unwrap();

        host.fail_next_loads(1);
        assert!(editor.open_item(&host, &item.id).await.is_err());
        assert!(editor.autosave_pending());
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let saved = rig.slots.read_slot(AUTOSAVE_SLOT).await.unwrap().unwrap();
        let saved = Snapshot::from_json(&saved).unwrap();
        assert_eq!(saved.objects.len(), 1);
        assert_eq!(saved.objects[0].id, "box");
    }

    #[tokio::test]
    async fn flush_writes_current_entry() {
        let (rig, editor, host) = started().await;
        host.edit(|scene| scene.add(SceneNode::text("t", "hi")));
        editor.commit(&host).await.unwrap();

        let outcome = editor.flush_autosave().await.unwrap();
        assert!(matches!(outcome, Some(AutosaveOutcome::Written { .. })));
        assert!(!editor.autosave_pending());
        let saved = rig.slots.read_slot(AUTOSAVE_SLOT).await.unwrap().unwrap();
        assert_eq!(Snapshot::from_json(&saved).unwrap().objects[0].id, "t");
    }

    #[tokio::test]
    async fn end_session_makes_next_start_fresh() {
        let (rig, editor, _host) = started().await;
        editor.end_session().await.unwrap();
        assert_eq!(
            rig.editor().start(&MemoryHost::default()).await.unwrap(),
            SessionStart::Fresh
        );
    }

    // -----------------------------------------------------------------------
    // catalog
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn saved_design_survives_a_new_session() {
        let (rig, editor, host) = started().await;
        let src = editor.ingest(png(4));
        host.edit(|scene| scene.add(SceneNode::image("photo", src)));
        editor.commit(&host).await.unwrap();
        let item = editor
            .save(&host, ItemMeta::new("Poster", "events"), false)
            .await
            .unwrap();
        drop(editor);

        let later = rig.editor_in_new_session();
        let host = MemoryHost::default();
        assert_eq!(later.start(&host).await.unwrap(), SessionStart::Fresh);
        assert!(host.scene().objects.is_empty());

        later.open_item(&host, &item.id).await.unwrap();
        assert_eq!(image_bytes(&later, &host, "photo"), png(4));
        assert_eq!(later.catalog().active(), Some(item.id));
        assert_eq!(later.history_len(), 1);
    }

    #[tokio::test]
    async fn save_overwrites_active_item() {
        let (_rig, editor, host) = started().await;
        let first = editor.save(&host, ItemMeta::new("v1", ""), false).await.unwrap();
        host.edit(|scene| scene.add(SceneNode::rect("r", "#000")));
        let second = editor.save(&host, ItemMeta::new("v2", ""), false).await.unwrap();
        assert_eq!(first.id, second.id);

        let copy = editor.save(&host, ItemMeta::new("copy", ""), true).await.unwrap();
        assert_ne!(copy.id, first.id);
        assert_eq!(editor.list_items().await.unwrap().len(), 2);

        editor.new_document(&host).await.unwrap();
        assert_eq!(editor.catalog().active(), None);
        let third = editor.save(&host, ItemMeta::new("v3", ""), false).await.unwrap();
        assert_ne!(third.id, first.id);
    }

    #[tokio::test]
    async fn malformed_payload_keeps_previous_design() {
        let (rig, editor, host) = started().await;
        host.edit(|scene| scene.add(SceneNode::rect("keep", "#0f0")));
        let good = editor.save(&host, ItemMeta::new("good", ""), false).await.unwrap();
        let bad = editor.save(&host, ItemMeta::new("bad", ""), true).await.unwrap();
        editor.open_item(&host, &good.id).await.unwrap();
        rig.slots
            .write_slot(&shadow_slot(&bad.id), b"not json")
            .await
            .unwrap();
        let live = host.scene();

        let err = editor.open_item(&host, &bad.id).await.unwrap_err();

        assert!(matches!(err, EditorError::Catalog(CatalogError::Malformed { .. })));
        assert_eq!(host.scene(), live);
        assert_eq!(editor.catalog().active(), Some(good.id));
    }

    #[tokio::test]
    async fn refused_load_restores_active_item() {
        let (_rig, editor, host) = started().await;
        let first = editor.save(&host, ItemMeta::new("a", ""), false).await.unwrap();
        host.edit(|scene| scene.add(SceneNode::rect("r", "#000")));
        let second = editor.save(&host, ItemMeta::new("b", ""), true).await.unwrap();
        editor.open_item(&host, &first.id).await.unwrap();

        host.fail_next_loads(1);
        assert!(editor.open_item(&host, &second.id).await.is_err());
        assert_eq!(editor.catalog().active(), Some(first.id));
    }

    // -----------------------------------------------------------------------
    // export / import
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn export_survives_blob_wipe() {
        let (rig, editor, host) = started().await;
        let src = editor.ingest(png(5));
        host.edit(|scene| scene.add(SceneNode::image("photo", src)));
        let item = editor.save(&host, ItemMeta::new("Flyer", ""), false).await.unwrap();
        let file = editor.export(None).await.unwrap().to_compressed().unwrap();

        rig.blobs.clear();
        editor.delete_item(&item.id).await.unwrap();
        let report = editor.import_bytes(&file).await.unwrap();
        assert_eq!(report.imported, vec![item.id.clone()]);

        let host = MemoryHost::default();
        let later = rig.editor_in_new_session();
        later.start(&host).await.unwrap();
        later.open_item(&host, &item.id).await.unwrap();
        assert_eq!(image_bytes(&later, &host, "photo"), png(5));
    }

    #[tokio::test]
    async fn import_bytes_rejects_foreign_files() {
        let (_rig, editor, _host) = started().await;
        assert!(matches!(
            editor.import_bytes(b"GIF89a").await,
            Err(EditorError::Catalog(CatalogError::InvalidMagic { .. }))
        ));
    }

    // -----------------------------------------------------------------------
    // derived assets and garbage collection
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn derived_image_keeps_original_across_sessions() {
        let (rig, editor, host) = started().await;
        let original = editor.ingest(png(6));
        host.edit(|scene| scene.add(SceneNode::image("photo", original)));
        editor.commit(&host).await.unwrap();

        let node = host.scene().find("photo").cloned().unwrap();
        let derived = editor.ingest_derived(&node, png(7));
        host.edit(|scene| scene.replace(derived));
        editor.commit(&host).await.unwrap();
        let item = editor.save(&host, ItemMeta::new("Cutout", ""), false).await.unwrap();

        let later = rig.editor_in_new_session();
        let host = MemoryHost::default();
        later.start(&host).await.unwrap();
        later.open_item(&host, &item.id).await.unwrap();
        assert_eq!(image_bytes(&later, &host, "photo"), png(7));

        host.edit(|scene| scene.find_mut("photo").unwrap().restore_original());
        later.commit(&host).await.unwrap();
        assert_eq!(image_bytes(&later, &host, "photo"), png(6));
        assert!(host.scene().find("photo").unwrap().original_src.is_none());
    }

    #[tokio::test]
    async fn deriving_twice_keeps_first_original() {
        let (_rig, editor, _host) = started().await;
        let node = SceneNode::image("photo", editor.ingest(png(1)));
        let once = editor.ingest_derived(&node, png(2));
        let twice = editor.ingest_derived(&once, png(3));
        assert_eq!(twice.original_src, node.src);
        assert_ne!(twice.src, once.src);
    }

    #[tokio::test]
    async fn garbage_collection_keeps_reachable_blobs() {
        let (rig, editor, host) = started().await;

        let saved = editor.ingest(png(8));
        host.edit(|scene| scene.add(SceneNode::image("kept", saved)));
        let item = editor.save(&host, ItemMeta::new("keep", ""), false).await.unwrap();

        let cutout = editor.save_cutout("dog", &png(9)).await.unwrap();

        let scratch = editor.ingest(png(10));
        host.edit(|scene| scene.add(SceneNode::image("scratch", scratch)));
        let doomed = editor.save(&host, ItemMeta::new("gone", ""), true).await.unwrap();
        editor.delete_item(&doomed.id).await.unwrap();
        assert_eq!(rig.blobs.len(), 3);

        // still on screen
        assert!(editor.collect_garbage().await.unwrap().removed.is_empty());

        host.edit(|scene| scene.remove("scratch"));
        assert_eq!(editor.release_handles(&host).await, 1);
        let report = editor.collect_garbage().await.unwrap();

        assert_eq!(report.removed.len(), 1);
        assert_eq!(rig.blobs.len(), 2);
        assert!(rig.blobs.contains(&cutout.key).await.unwrap());
        let kept = editor.catalog().load_payload(&item.id).await.unwrap().unwrap();
        assert!(rig.blobs.contains(&kept.durable_keys()[0]).await.unwrap());
    }

    #[tokio::test]
    async fn collection_keeps_blobs_behind_live_handles() {
        let (rig, editor, host) = started().await;
        let src = editor.ingest(png(12));
        host.edit(|scene| scene.add(SceneNode::image("photo", src)));
        let draft = editor.save(&host, ItemMeta::new("draft", ""), true).await.unwrap();
        let payload = editor.catalog().load_payload(&draft.id).await.unwrap().unwrap();
        let key = payload.durable_keys()[0];
        editor.delete_item(&draft.id).await.unwrap();

        let report = editor.collect_garbage().await.unwrap();
        assert!(report.removed.is_empty());
        assert!(rig.blobs.contains(&key).await.unwrap());

        host.edit(|scene| scene.add(SceneNode::text("title", "Sale")));
        editor.commit(&host).await.unwrap();
        let item = editor.save(&host, ItemMeta::new("final", ""), false).await.unwrap();

        let later = rig.editor_in_new_session();
        let host = MemoryHost::default();
        later.start(&host).await.unwrap();
        later.open_item(&host, &item.id).await.unwrap();
        assert_eq!(image_bytes(&later, &host, "photo"), png(12));
    }

    #[tokio::test]
    async fn commit_stores_again_a_blob_removed_behind_a_live_handle() {
        let (rig, editor, host) = started().await;
        let src = editor.ingest(png(13));
        host.edit(|scene| scene.add(SceneNode::image("photo", src)));
        editor.commit(&host).await.unwrap();
        let key = editor.current().unwrap().durable_keys()[0];

        rig.blobs.delete(&key).await.unwrap();
        host.edit(|scene| scene.add(SceneNode::text("title", "Sale")));
        editor.commit(&host).await.unwrap();

        assert!(rig.blobs.contains(&key).await.unwrap());
        assert_eq!(editor.current().unwrap().durable_keys(), vec![key]);
    }

    #[tokio::test]
    async fn new_document_releases_stored_handles() {
        let (_rig, editor, host) = started().await;
        let src = editor.ingest(png(14));
        host.edit(|scene| scene.add(SceneNode::image("photo", src)));
        editor.commit(&host).await.unwrap();
        let item = editor.save(&host, ItemMeta::new("photo", ""), false).await.unwrap();
        assert_eq!(editor.release_handles(&host).await, 0);

        let unsaved = editor.ingest(png(15));
        assert_eq!(editor.handles().len(), 2);

        editor.new_document(&host).await.unwrap();
        assert_eq!(editor.handles().len(), 1);
        let AssetRef::Ephemeral(handle) = unsaved else {
            panic!("ingest returns a live handle");
        };
        assert_eq!(editor.handles().resolve(&handle).unwrap().as_slice(), png(15).as_slice());

        editor.open_item(&host, &item.id).await.unwrap();
        assert_eq!(image_bytes(&editor, &host, "photo"), png(14));
    }
}
