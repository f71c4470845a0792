//! # drawsync-collab — real-time synchronization layer for DrawSync
//!
//! Relays whiteboard edits between participants with best-effort,
//! overwrite-on-conflict semantics. No operational transform, no CRDT:
//! every edit ships complete object state and the last applied write
//! wins.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐      WebSocket       ┌───────────────┐
//! │ ChannelClient │ ◄──────────────────► │  RelayServer  │
//! │ (per user)    │   bincode envelope   │  (stateless)  │
//! └───────┬───────┘                      └───────┬───────┘
//!         │                                      │
//!         ▼                              ┌───────┴────────┐
//! ┌───────────────┐                      │ SessionRegistry│
//! │ Synchronizer  │                      │ (fan-out N-1)  │
//! │  ├ SceneStore │                      └────────────────┘
//! │  └ Roster     │
//! └───────────────┘
//! ```
//!
//! The relay holds no drawing state; each participant's `Synchronizer`
//! owns its own scene and presence roster and reconstructs everything
//! from the event stream (plus a best-effort canvas-state answer when it
//! joins an ongoing session).
//!
//! ## Modules
//!
//! - [`protocol`] — event envelope (bincode) and payloads (JSON)
//! - [`registry`] — session registry with origin-tagged fan-out
//! - [`server`] — the relay hub
//! - [`client`] — per-participant WebSocket channel
//! - [`synchronizer`] — local/remote edit reconciliation
//! - [`presence`] — who is here and where their cursor is

pub mod client;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod synchronizer;

// Re-exports for convenience
pub use client::{ChannelClient, ConnectionState, SessionEvent};
pub use presence::{PresenceEntry, PresenceRoster};
pub use protocol::{CursorPayload, EventKind, ProtocolError, RemovePayload, WireEvent};
pub use registry::{RegistryStats, RelayFrame, SessionRegistry};
pub use server::{RelayConfig, RelayServer, RelayStats};
pub use synchronizer::{
    EditingSurface, HeadlessSurface, Notice, SurfaceError, Synchronizer, CURSOR_INTERVAL,
};
