//! The live scene and its snapshots.
//!
//! [`SceneGraph`] is the mutable tree a rendering engine works on.
//! [`capture`] turns it into an immutable [`Snapshot`](easel_types::Snapshot)
//! with transient UI nodes stripped, and [`SceneGraph::from_snapshot`] goes
//! the other way when a stored design is loaded.

pub mod graph;
pub mod serializer;

pub use graph::SceneGraph;
pub use serializer::capture;
