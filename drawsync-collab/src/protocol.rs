//! Wire protocol for whiteboard events.
//!
//! Envelope format (bincode-encoded):
//! ```text
//! ┌──────────┬───────────────────┬──────────┐
//! │ kind     │ participant id    │ payload  │
//! │ 1 byte   │ length-prefixed   │ variable │
//! └──────────┴───────────────────┴──────────┘
//! ```
//!
//! The payload is JSON, encoded per kind (see the table on each
//! constructor). JSON is deliberate: edit events carry whole serialized
//! objects whose field set is owned by the editing surface, and receivers
//! must tolerate fields and tags they do not recognize. The relay never
//! looks inside the payload at all.

use drawsync_core::{DrawableObject, ObjectId, ParticipantId, ParticipantInfo, SceneSnapshot};
use serde::{Deserialize, Serialize};

/// Event kinds relayed between participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    /// A participant announced itself (payload: `ParticipantInfo` JSON).
    PresenceAnnounce = 1,
    /// A participant left; synthesized by the relay on channel close
    /// (payload: empty, identity rides the envelope).
    PresenceDeparture = 2,
    /// Cursor position update (payload: `{x, y}` JSON).
    CursorMove = 3,
    /// A completed freehand stroke (payload: serialized object JSON).
    Drawing = 4,
    /// Whole-object create/move/resize/restyle (payload: serialized object JSON).
    ObjectModified = 5,
    /// Object deletion (payload: `{id}` JSON).
    ObjectRemoved = 6,
    /// The whole canvas was cleared (payload: empty).
    ClearCanvas = 7,
    /// Full scene transfer for join-time sync (payload: `SceneSnapshot` JSON).
    CanvasState = 8,
}

/// Cursor coordinates as carried by a `cursor-move` payload.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CursorPayload {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// Payload of an `object-removed` event. The id is optional on decode so
/// a malformed removal degrades to "cannot apply" instead of a crash.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemovePayload {
    #[serde(default)]
    pub id: Option<ObjectId>,
}

/// Top-level protocol event.
///
/// Every event names its originating participant so receivers can filter
/// their own echoes; the relay additionally never sends a frame back to
/// the channel it arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub kind: EventKind,
    pub participant: ParticipantId,
    /// JSON-encoded payload; empty for kinds that carry none.
    pub payload: Vec<u8>,
}

fn json_payload<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

impl WireEvent {
    /// Announce the local participant to the session.
    pub fn presence_announce(info: &ParticipantInfo) -> Self {
        Self {
            kind: EventKind::PresenceAnnounce,
            participant: info.id.clone(),
            payload: json_payload(info),
        }
    }

    /// Departure notice for a participant, carrying only the bare identity.
    pub fn presence_departure(participant: ParticipantId) -> Self {
        Self {
            kind: EventKind::PresenceDeparture,
            participant,
            payload: Vec::new(),
        }
    }

    /// Cursor position update.
    pub fn cursor_move(participant: ParticipantId, x: f64, y: f64) -> Self {
        Self {
            kind: EventKind::CursorMove,
            participant,
            payload: json_payload(&CursorPayload { x, y }),
        }
    }

    /// A completed freehand stroke, shipped as full object state.
    pub fn drawing(participant: ParticipantId, object: &DrawableObject) -> Self {
        Self {
            kind: EventKind::Drawing,
            participant,
            payload: json_payload(object),
        }
    }

    /// Whole-object state after any create/move/resize/restyle.
    pub fn object_modified(participant: ParticipantId, object: &DrawableObject) -> Self {
        Self {
            kind: EventKind::ObjectModified,
            participant,
            payload: json_payload(object),
        }
    }

    /// Object deletion by id.
    pub fn object_removed(participant: ParticipantId, id: ObjectId) -> Self {
        Self {
            kind: EventKind::ObjectRemoved,
            participant,
            payload: json_payload(&RemovePayload { id: Some(id) }),
        }
    }

    /// Clear the whole canvas.
    pub fn clear_canvas(participant: ParticipantId) -> Self {
        Self {
            kind: EventKind::ClearCanvas,
            participant,
            payload: Vec::new(),
        }
    }

    /// Full scene transfer for a newly joined participant.
    pub fn canvas_state(participant: ParticipantId, snapshot: &SceneSnapshot) -> Self {
        Self {
            kind: EventKind::CanvasState,
            participant,
            payload: json_payload(snapshot),
        }
    }

    /// Serialize to the binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Deserialize from the binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (event, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::Decode(e.to_string()))?;
        Ok(event)
    }

    /// Parse a `presence-announce` payload.
    pub fn participant_info(&self) -> Result<ParticipantInfo, ProtocolError> {
        if self.kind != EventKind::PresenceAnnounce {
            return Err(ProtocolError::WrongKind);
        }
        serde_json::from_slice(&self.payload).map_err(|e| ProtocolError::Payload(e.to_string()))
    }

    /// Parse a `cursor-move` payload.
    pub fn cursor(&self) -> Result<CursorPayload, ProtocolError> {
        if self.kind != EventKind::CursorMove {
            return Err(ProtocolError::WrongKind);
        }
        serde_json::from_slice(&self.payload).map_err(|e| ProtocolError::Payload(e.to_string()))
    }

    /// Parse a `drawing` or `object-modified` payload.
    pub fn object(&self) -> Result<DrawableObject, ProtocolError> {
        if !matches!(self.kind, EventKind::Drawing | EventKind::ObjectModified) {
            return Err(ProtocolError::WrongKind);
        }
        serde_json::from_slice(&self.payload).map_err(|e| ProtocolError::Payload(e.to_string()))
    }

    /// Parse an `object-removed` payload. `Ok(None)` means the sender
    /// omitted the id: the removal cannot be applied.
    pub fn removed_id(&self) -> Result<Option<ObjectId>, ProtocolError> {
        if self.kind != EventKind::ObjectRemoved {
            return Err(ProtocolError::WrongKind);
        }
        let payload: RemovePayload = serde_json::from_slice(&self.payload)
            .map_err(|e| ProtocolError::Payload(e.to_string()))?;
        Ok(payload.id)
    }

    /// Parse a `canvas-state` payload.
    pub fn scene(&self) -> Result<SceneSnapshot, ProtocolError> {
        if self.kind != EventKind::CanvasState {
            return Err(ProtocolError::WrongKind);
        }
        serde_json::from_slice(&self.payload).map_err(|e| ProtocolError::Payload(e.to_string()))
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    Encode(String),
    Decode(String),
    /// The envelope was fine but its JSON payload was not.
    Payload(String),
    WrongKind,
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "encode error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::Payload(e) => write!(f, "payload error: {e}"),
            Self::WrongKind => write!(f, "accessor used on wrong event kind"),
            Self::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}
