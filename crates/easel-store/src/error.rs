use easel_types::AssetKey;

/// Errors from blob and slot store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Writing would exceed the backend's storage quota.
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {key}: stored bytes digest to {computed}")]
    HashMismatch { key: AssetKey, computed: AssetKey },

    /// The slot name is invalid.
    #[error("invalid slot name {name:?}: {reason}")]
    InvalidSlotName { name: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
