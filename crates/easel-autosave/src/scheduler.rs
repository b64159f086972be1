use std::sync::{Arc, Mutex};
use std::time::Duration;

use easel_history::BusyFlag;
use easel_resolve::Resolver;
use easel_store::SlotStore;
use easel_types::Snapshot;
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{AutosaveError, AutosaveResult};

/// Slot holding the most recent autosaved snapshot.
pub const AUTOSAVE_SLOT: &str = "autosave/current";

/// Quiet period before a scheduled autosave is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Result of one autosave attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutosaveOutcome {
    /// The snapshot was written; `bytes` is the payload size.
    Written { bytes: usize },
    /// A history operation held the busy flag; nothing was written.
    SkippedBusy,
}

struct Writer {
    resolver: Arc<Resolver>,
    slots: Arc<dyn SlotStore>,
    busy: BusyFlag,
}

impl Writer {
    async fn write(&self, snapshot: &Snapshot) -> AutosaveResult<AutosaveOutcome> {
        if self.busy.is_busy() {
            debug!("autosave skipped while history is busy");
            return Ok(AutosaveOutcome::SkippedBusy);
        }
        let (stable, report) = self.resolver.stabilize(snapshot).await?;
        if !report.is_clean() {
            warn!(blanked = report.blanked(), "autosave blanked unresolvable references");
        }
        let json = stable
            .to_json()
            .map_err(|e| AutosaveError::Malformed(e.to_string()))?;
        self.slots.write_slot(AUTOSAVE_SLOT, &json).await?;
        debug!(bytes = json.len(), nodes = stable.node_count(), "autosave written");
        Ok(AutosaveOutcome::Written { bytes: json.len() })
    }
}

/// Debounced writer of the autosave slot.
///
/// At most one write is pending at a time. [`AutosaveScheduler::schedule`]
/// and [`AutosaveScheduler::cancel`] must be called from within a tokio
/// runtime.
pub struct AutosaveScheduler {
    writer: Arc<Writer>,
    debounce: Duration,
    pending: Mutex<Option<AbortHandle>>,
}

impl AutosaveScheduler {
    pub fn new(
        resolver: Arc<Resolver>,
        slots: Arc<dyn SlotStore>,
        busy: BusyFlag,
        debounce: Duration,
    ) -> Self {
        Self {
            writer: Arc::new(Writer {
                resolver,
                slots,
                busy,
            }),
            debounce,
            pending: Mutex::new(None),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Write `snapshot` once no other schedule arrives within the debounce
    /// interval. Replaces any pending write. While the busy flag is held the
    /// write waits another interval and tries again.
    pub fn schedule(&self, snapshot: Snapshot) {
        let writer = Arc::clone(&self.writer);
        let debounce = self.debounce;

        let mut pending = self.pending.lock().expect("lock poisoned");
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        let handle = tokio::spawn(async move {
            loop {
                sleep(debounce).await;
                match writer.write(&snapshot).await {
                    Ok(AutosaveOutcome::SkippedBusy) => continue,
                    Ok(AutosaveOutcome::Written { .. }) => break,
                    Err(error) => {
                        warn!(%error, "autosave failed");
                        break;
                    }
                }
            }
        });
        *pending = Some(handle.abort_handle());
        debug!(debounce_ms = debounce.as_millis() as u64, "autosave scheduled");
    }

    /// Drop the pending write, if any. Returns `true` if one was still waiting.
    pub fn cancel(&self) -> bool {
        let Some(handle) = self.pending.lock().expect("lock poisoned").take() else {
            return false;
        };
        let waiting = !handle.is_finished();
        handle.abort();
        if waiting {
            debug!("pending autosave cancelled");
        }
        waiting
    }

    /// Returns `true` while a scheduled write has not run yet.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel any pending write and write `snapshot` now.
    pub async fn flush(&self, snapshot: &Snapshot) -> AutosaveResult<AutosaveOutcome> {
        self.cancel();
        self.writer.write(snapshot).await
    }

    /// Read back the last autosaved snapshot.
    pub async fn restore(&self) -> AutosaveResult<Option<Snapshot>> {
        let Some(data) = self.writer.slots.read_slot(AUTOSAVE_SLOT).await? else {
            return Ok(None);
        };
        let snapshot =
            Snapshot::from_json(&data).map_err(|e| AutosaveError::Malformed(e.to_string()))?;
        Ok(Some(snapshot))
    }

    /// Remove the autosave slot. Returns `true` if it existed.
    pub async fn discard(&self) -> AutosaveResult<bool> {
        self.cancel();
        Ok(self.writer.slots.delete_slot(AUTOSAVE_SLOT).await?)
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for AutosaveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutosaveScheduler")
            .field("debounce", &self.debounce)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_store::{EphemeralRegistry, InMemoryBlobStore, InMemorySlotStore};
    use easel_types::{AssetRef, SceneNode};

    struct Fixture {
        slots: Arc<InMemorySlotStore>,
        handles: Arc<EphemeralRegistry>,
        busy: BusyFlag,
        scheduler: AutosaveScheduler,
    }

    fn fixture() -> Fixture {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let handles = Arc::new(EphemeralRegistry::new());
        let slots = Arc::new(InMemorySlotStore::new());
        let busy = BusyFlag::new();
        let resolver = Arc::new(Resolver::new(blobs, handles.clone()));
        let scheduler =
            AutosaveScheduler::new(resolver, slots.clone(), busy.clone(), DEFAULT_DEBOUNCE);
        Fixture {
            slots,
            handles,
            busy,
            scheduler,
        }
    }

    fn snap(width: u32) -> Snapshot {
        Snapshot::blank(width, 100)
    }

    async fn saved(fx: &Fixture) -> Option<Snapshot> {
        fx.scheduler.restore().await.unwrap()
    }

    async fn wait(ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn writes_after_quiet_period() {
        let fx = fixture();
        fx.scheduler.schedule(snap(1));

        wait(500).await;
        assert!(saved(&fx).await.is_none());
        assert!(fx.scheduler.is_pending());

        wait(600).await;
        assert_eq!(saved(&fx).await, Some(snap(1)));
        assert!(!fx.scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_restarts_the_interval() {
        let fx = fixture();
        fx.scheduler.schedule(snap(1));
        wait(600).await;
        fx.scheduler.schedule(snap(2));
        wait(600).await;
        assert!(saved(&fx).await.is_none());

        wait(500).await;
        assert_eq!(saved(&fx).await, Some(snap(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_write() {
        let fx = fixture();
        fx.scheduler.schedule(snap(1));
        assert!(fx.scheduler.cancel());
        assert!(!fx.scheduler.cancel());

        wait(5_000).await;
        assert!(saved(&fx).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn busy_flag_suppresses_write() {
        let fx = fixture();
        let guard = fx.busy.try_enter().unwrap();
        fx.scheduler.schedule(snap(1));
        wait(1_500).await;
        assert!(saved(&fx).await.is_none());

        drop(guard);
        assert_eq!(
            fx.scheduler.flush(&snap(1)).await.unwrap(),
            AutosaveOutcome::Written {
                bytes: snap(1).to_json().unwrap().len()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_write_lands_once_busy_clears() {
        let fx = fixture();
        let guard = fx.busy.try_enter().unwrap();
        fx.scheduler.schedule(snap(3));
        wait(1_500).await;
        assert!(saved(&fx).await.is_none());
        assert!(fx.scheduler.is_pending());

        drop(guard);
        wait(1_000).await;
        assert_eq!(saved(&fx).await, Some(snap(3)));
        assert!(!fx.scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_now_and_cancels_pending() {
        let fx = fixture();
        fx.scheduler.schedule(snap(1));
        fx.scheduler.flush(&snap(2)).await.unwrap();
        assert_eq!(saved(&fx).await, Some(snap(2)));

        wait(2_000).await;
        assert_eq!(saved(&fx).await, Some(snap(2)));
    }

    #[tokio::test]
    async fn autosave_never_persists_session_handles() {
        let fx = fixture();
        let mut snapshot = snap(1);
        snapshot.objects.push(SceneNode::image(
            "photo",
            AssetRef::Ephemeral(fx.handles.mint(b"pixels".to_vec())),
        ));

        fx.scheduler.flush(&snapshot).await.unwrap();

        let restored = saved(&fx).await.unwrap();
        assert!(!restored.has_ephemeral());
        assert!(restored.objects[0].src.as_ref().unwrap().is_durable());
    }

    #[tokio::test]
    async fn malformed_slot_is_reported() {
        let fx = fixture();
        fx.slots.write_slot(AUTOSAVE_SLOT, b"{not json").await.unwrap();
        let err = fx.scheduler.restore().await.unwrap_err();
        assert!(matches!(err, AutosaveError::Malformed(_)));
    }

    #[tokio::test]
    async fn discard_removes_slot() {
        let fx = fixture();
        fx.scheduler.flush(&snap(1)).await.unwrap();
        assert!(fx.scheduler.discard().await.unwrap());
        assert!(saved(&fx).await.is_none());
    }
}
