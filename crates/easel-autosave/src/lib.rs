//! Background persistence for Easel.
//!
//! [`AutosaveScheduler`] writes the latest snapshot to the `autosave/current`
//! slot once edits have been quiet for the debounce interval. Every new
//! schedule replaces the pending one, and nothing is written while the
//! shared [`BusyFlag`](easel_history::BusyFlag) is raised.
//!
//! [`SessionMarker`] tells a fresh session apart from a reload within the
//! same session, which decides whether the autosave slot is restored.

pub mod error;
pub mod scheduler;
pub mod session;

pub use error::{AutosaveError, AutosaveResult};
pub use scheduler::{AutosaveOutcome, AutosaveScheduler, AUTOSAVE_SLOT, DEFAULT_DEBOUNCE};
pub use session::{SessionMarker, SessionStart, SESSION_SLOT};
