use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutosaveError {
    #[error("store error: {0}")]
    Store(#[from] easel_store::StoreError),

    #[error("resolve error: {0}")]
    Resolve(#[from] easel_resolve::ResolveError),

    #[error("malformed autosave: {0}")]
    Malformed(String),
}

pub type AutosaveResult<T> = Result<T, AutosaveError>;
