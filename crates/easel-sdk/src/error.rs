use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("another load, undo or redo is in progress")]
    Busy,

    #[error("history error: {0}")]
    History(#[from] easel_history::HistoryError),

    #[error("rendering engine error: {0}")]
    Host(#[from] crate::host::HostError),

    #[error("store error: {0}")]
    Store(#[from] easel_store::StoreError),

    #[error("resolve error: {0}")]
    Resolve(#[from] easel_resolve::ResolveError),

    #[error("catalog error: {0}")]
    Catalog(#[from] easel_catalog::CatalogError),

    #[error("autosave error: {0}")]
    Autosave(#[from] easel_autosave::AutosaveError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type EditorResult<T> = Result<T, EditorError>;
