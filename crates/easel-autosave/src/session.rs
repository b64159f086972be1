use std::sync::Arc;

use chrono::Utc;
use easel_store::SlotStore;
use tracing::info;

use crate::error::AutosaveResult;

/// Slot marking that a session is in progress.
pub const SESSION_SLOT: &str = "session/active";

/// How the current start-up relates to earlier ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStart {
    /// First start in this session: begin with a blank canvas.
    Fresh,
    /// Reload within a running session: restore the autosave.
    Reload,
}

/// Marker kept in session-scoped storage.
///
/// The store handed in must live exactly as long as the session (a browser
/// tab's session storage, or an in-memory store shared across reloads).
pub struct SessionMarker {
    slots: Arc<dyn SlotStore>,
}

impl SessionMarker {
    pub fn new(slots: Arc<dyn SlotStore>) -> Self {
        Self { slots }
    }

    /// Classify this start-up and make sure the marker is set.
    pub async fn begin(&self) -> AutosaveResult<SessionStart> {
        if self.slots.read_slot(SESSION_SLOT).await?.is_some() {
            info!("reload within running session");
            return Ok(SessionStart::Reload);
        }
        let stamp = Utc::now().to_rfc3339();
        self.slots.write_slot(SESSION_SLOT, stamp.as_bytes()).await?;
        info!(started_at = %stamp, "fresh session");
        Ok(SessionStart::Fresh)
    }

    /// Clear the marker so the next start is treated as fresh.
    pub async fn end(&self) -> AutosaveResult<bool> {
        Ok(self.slots.delete_slot(SESSION_SLOT).await?)
    }
}

impl std::fmt::Debug for SessionMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMarker").finish_non_exhaustive()
    }
}
