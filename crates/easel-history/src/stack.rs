use std::collections::VecDeque;

use easel_types::Snapshot;
use tracing::debug;

use crate::error::{HistoryError, HistoryResult};

/// Default number of snapshots kept.
pub const MAX_HISTORY: usize = 50;

/// Result of [`HistoryStack::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The snapshot became the new current entry.
    Pushed {
        /// Redo entries dropped because the push happened after an undo.
        discarded: usize,
        /// Whether the oldest entry was evicted to respect the bound.
        evicted: bool,
    },
    /// The snapshot equals the current entry; nothing was recorded.
    Unchanged,
}

/// Bounded linear undo/redo history.
///
/// Invariants:
/// - `len() <= max_entries()`
/// - `cursor()` is `None` exactly when the stack is empty, and otherwise
///   indexes a valid entry
/// - after a successful push the cursor sits on the last entry
#[derive(Clone, Debug)]
pub struct HistoryStack {
    entries: VecDeque<Snapshot>,
    cursor: Option<usize>,
    max_entries: usize,
}

impl HistoryStack {
    /// An empty stack holding up to [`MAX_HISTORY`] snapshots.
    pub fn new() -> Self {
        Self::with_limit(MAX_HISTORY)
    }

    /// An empty stack holding up to `max_entries` snapshots (at least one).
    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            max_entries: max_entries.max(1),
        }
    }

    /// Record `snapshot` as the newest state.
    pub fn push(&mut self, snapshot: Snapshot) -> PushOutcome {
        if self.current() == Some(&snapshot) {
            return PushOutcome::Unchanged;
        }

        let keep = self.cursor.map_or(0, |c| c + 1);
        let discarded = self.entries.len() - keep;
        self.entries.truncate(keep);
        self.entries.push_back(snapshot);

        let evicted = self.entries.len() > self.max_entries;
        if evicted {
            self.entries.pop_front();
        }
        self.cursor = Some(self.entries.len() - 1);

        debug!(
            len = self.entries.len(),
            discarded,
            evicted,
            "history entry pushed"
        );
        PushOutcome::Pushed { discarded, evicted }
    }

    /// Step back one entry and return it.
    pub fn undo(&mut self) -> HistoryResult<&Snapshot> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                Ok(&self.entries[c - 1])
            }
            _ => Err(HistoryError::NothingToUndo),
        }
    }

    /// Step forward one entry and return it.
    pub fn redo(&mut self) -> HistoryResult<&Snapshot> {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => {
                self.cursor = Some(c + 1);
                Ok(&self.entries[c + 1])
            }
            _ => Err(HistoryError::NothingToRedo),
        }
    }

    /// The entry under the cursor.
    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.map(|c| &self.entries[c])
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    /// All entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    /// Forget everything and start over from `snapshot`, as after opening a
    /// document.
    pub fn reset(&mut self, snapshot: Snapshot) {
        self.clear();
        self.push(snapshot);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new()
    }
}
