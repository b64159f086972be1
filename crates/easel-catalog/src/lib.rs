//! Saved designs for Easel.
//!
//! A saved design is split in two: a small [`CatalogItem`] in the shared
//! index slot, always loaded in full for listings, and a heavy shadow
//! payload (the stabilized snapshot) in its own slot, loaded only when the
//! design is opened. The payload is written first, so an index entry never
//! points at a payload that failed to save.
//!
//! Also here:
//!
//! - [`CutoutLibrary`]: named derived assets kept apart from any design
//! - [`collect_garbage`]: removal of blobs nothing references any more
//! - [`PortableDocument`]: the self-contained export/import format
//!
//! [`CatalogItem`]: easel_types::CatalogItem

pub mod catalog;
pub mod cutouts;
pub mod error;
pub mod gc;
pub mod portable;

pub use catalog::{shadow_slot, Catalog, ItemMeta, INDEX_SLOT, SHADOW_PREFIX};
pub use cutouts::{CutoutLibrary, CUTOUT_PREFIX};
pub use error::{CatalogError, CatalogResult};
pub use gc::{collect_garbage, GcReport};
pub use portable::{ImportReport, PortableDocument, PortableItem, CONTAINER_MAGIC};
