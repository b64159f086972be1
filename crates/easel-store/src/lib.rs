//! Storage backends for Easel.
//!
//! Three storage regimes meet here:
//!
//! - [`BlobStore`] -- content-addressed binary assets, keyed by the BLAKE3
//!   digest of their bytes. Identical content is stored once.
//! - [`EphemeralRegistry`] -- session-local, revocable handles to bytes that
//!   the rendering engine can display directly.
//! - [`SlotStore`] -- named documents (catalog index, shadow payloads, the
//!   autosave slot, the session marker).
//!
//! # Backends
//!
//! - [`InMemoryBlobStore`] / [`InMemorySlotStore`] -- `HashMap`-based, for
//!   tests, embedding, and session-scoped state
//! - [`FsBlobStore`] / [`FsSlotStore`] -- one file per blob or slot under a
//!   root directory
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written; `put` of present content is a no-op.
//! 2. `get` of an unknown key is `Ok(None)`, never an error.
//! 3. Storage-full and I/O failures are propagated as [`StoreError`].
//! 4. Slot names are validated before they touch any backend.

pub mod error;
pub mod ephemeral;
pub mod fs;
pub mod hasher;
pub mod memory;
pub mod names;
pub mod record;
pub mod traits;

pub use ephemeral::EphemeralRegistry;
pub use error::{StoreError, StoreResult};
pub use fs::{FsBlobStore, FsSlotStore};
pub use hasher::ContentHasher;
pub use memory::{InMemoryBlobStore, InMemorySlotStore};
pub use names::validate_slot_name;
pub use record::BlobRecord;
pub use traits::{BlobStore, SlotStore};
