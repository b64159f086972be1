use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("item {0} has no saved payload")]
    MissingPayload(String),

    #[error("malformed slot {slot}: {reason}")]
    Malformed { slot: String, reason: String },

    #[error("invalid container magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(#[from] easel_store::StoreError),

    #[error("resolve error: {0}")]
    Resolve(#[from] easel_resolve::ResolveError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub(crate) fn malformed(slot: &str, reason: impl ToString) -> Self {
        Self::Malformed {
            slot: slot.to_string(),
            reason: reason.to_string(),
        }
    }
}
