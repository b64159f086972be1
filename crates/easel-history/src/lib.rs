//! Undo/redo history for Easel.
//!
//! [`HistoryStack`] keeps a bounded, linear list of stabilized snapshots
//! with a cursor. Pushing after an undo discards the redo branch; pushing a
//! snapshot equal to the current one is a no-op.
//!
//! [`BusyFlag`] is the re-entrancy guard shared with the autosave scheduler:
//! while undo, redo or a document load is materializing a snapshot, no new
//! history entry is recorded and no autosave is written.

pub mod busy;
pub mod error;
pub mod stack;

pub use busy::{BusyFlag, BusyGuard};
pub use error::{HistoryError, HistoryResult};
pub use stack::{HistoryStack, PushOutcome, MAX_HISTORY};
