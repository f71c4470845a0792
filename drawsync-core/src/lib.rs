//! # drawsync-core — shared data model for the DrawSync whiteboard
//!
//! Deterministic, I/O-free types shared by every other crate:
//!
//! - [`participant`] — participant identity and display metadata
//! - [`object`] — drawable objects (strokes and shapes) and their ids
//! - [`scene`] — the ordered collection of live objects on one canvas
//!
//! Everything here is plain data plus serde. The synchronization layer
//! (`drawsync-collab`) owns all networking and mutation policy.

pub mod object;
pub mod participant;
pub mod scene;

pub use object::{DrawableObject, ObjectId, ShapeKind};
pub use participant::{ParticipantId, ParticipantInfo, PALETTE};
pub use scene::{SceneError, SceneSnapshot, SceneStore};
