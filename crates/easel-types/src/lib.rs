//! Foundation types for Easel, the canvas persistence engine.
//!
//! This crate provides the data model shared by every other Easel crate: the
//! content-addressed [`AssetKey`], the three-form [`AssetRef`] that moves
//! image data between session handles, durable storage and portable files,
//! the [`SceneNode`] tree and the immutable [`Snapshot`] built from it.
//!
//! # Key Types
//!
//! - [`AssetKey`] -- BLAKE3 digest identifying a stored blob
//! - [`AssetRef`] -- `Ephemeral` / `Durable` / `Embedded` / `Empty` asset reference
//! - [`SceneNode`] -- shape, text, image or group entry of the scene tree
//! - [`Snapshot`] -- self-describing serialization of a whole canvas
//! - [`CatalogItem`] -- lightweight listing metadata for a saved design
//! - [`Cutout`] -- named standalone derived asset

pub mod asset;
pub mod catalog;
pub mod error;
pub mod key;
pub mod node;
pub mod snapshot;

pub use asset::{sniff_media_type, AssetRef, EphemeralHandle};
pub use catalog::{CatalogItem, Cutout};
pub use error::TypeError;
pub use key::AssetKey;
pub use node::{AssetSlot, Fill, NodeKind, PatternFill, SceneNode, SlotRole};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
