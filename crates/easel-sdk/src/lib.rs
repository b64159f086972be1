//! High-level API for Easel.
//!
//! [`Editor`] wires the stores, the resolver, the history stack, the
//! autosave scheduler and the catalog together behind one facade. The
//! rendering engine plugs in through [`SceneHost`]; asset producers hand
//! new bytes to [`Editor::ingest`].

pub mod backends;
pub mod config;
pub mod editor;
pub mod error;
pub mod host;

pub use backends::Backends;
pub use config::EditorConfig;
pub use editor::{CommitOutcome, Editor};
pub use error::{ConfigError, EditorError, EditorResult};
pub use host::{HostError, MemoryHost, SceneHost};

// Re-export key types
pub use easel_autosave::SessionStart;
pub use easel_catalog::{GcReport, ImportReport, ItemMeta, PortableDocument};
pub use easel_scene::SceneGraph;
pub use easel_types::{AssetKey, AssetRef, CatalogItem, Cutout, SceneNode, Snapshot};
