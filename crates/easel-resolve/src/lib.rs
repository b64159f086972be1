//! Reference resolution for Easel snapshots.
//!
//! An image reference lives in one of three forms depending on where the
//! snapshot is headed. The [`Resolver`] rewrites every asset slot of a
//! snapshot into the form its destination needs:
//!
//! - [`Resolver::stabilize`]: session handles and inline data become durable
//!   keys, before anything is persisted
//! - [`Resolver::materialize`]: durable keys become fresh session handles,
//!   before a snapshot is handed to the rendering engine
//! - [`Resolver::embed`]: every reference becomes inline data, for export
//!
//! All passes work on a deep clone; the input snapshot is never touched.
//! A reference that can no longer be resolved is replaced by
//! [`AssetRef::Empty`](easel_types::AssetRef::Empty) and listed in the
//! [`ResolveReport`] instead of failing the pass.

pub mod error;
pub mod report;
pub mod resolver;

pub use error::{ResolveError, ResolveResult};
pub use report::{MissingAsset, ResolveReport, UnresolvedSlot};
pub use resolver::{referenced_keys, Resolver};
