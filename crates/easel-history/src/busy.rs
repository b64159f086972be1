use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag marking a history-changing operation in progress.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns `None` if it is already raised.
    ///
    /// The flag drops again when the returned guard does.
    pub fn try_enter(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Holds a [`BusyFlag`] raised until dropped.
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
