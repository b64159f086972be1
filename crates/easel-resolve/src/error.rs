use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("store error: {0}")]
    Store(#[from] easel_store::StoreError),
}

pub type ResolveResult<T> = Result<T, ResolveError>;
