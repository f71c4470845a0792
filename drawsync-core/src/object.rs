//! Drawable objects: freehand strokes and placed shapes.
//!
//! Objects travel over the wire as whole JSON documents (the editing
//! surface serializes complete object state, never diffs), so decoding is
//! deliberately forgiving: every geometry/style field is optional or
//! defaulted, unrecognized type tags map to [`ShapeKind::Unknown`], and
//! fields this crate does not model are preserved in [`DrawableObject::extra`]
//! so a whole-object replace does not strip them.

use crate::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique object identity: `<prefix>_<millis>_<owner identity>`.
///
/// The timestamp component is locally monotonic; collisions across
/// participants are theoretically possible and accepted (last write wins).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Compose an id from a kind prefix, a millisecond timestamp, and the
    /// owning participant's identity.
    pub fn compose(prefix: &str, millis: u64, owner: &ParticipantId) -> Self {
        Self(format!("{prefix}_{millis}_{owner}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type tag for a drawable object.
///
/// `Unknown` absorbs tags introduced by newer clients; such objects are
/// still stored, replaced, and removed by id like any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    FreehandPath,
    Rectangle,
    Circle,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ShapeKind {
    /// Id prefix used when minting ids for locally created objects.
    pub fn id_prefix(self) -> &'static str {
        match self {
            ShapeKind::FreehandPath => "path",
            _ => "obj",
        }
    }
}

/// One stroke or shape on the shared canvas, as exchanged on the wire and
/// held in the scene store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DrawableObject {
    /// Absent on payloads that were never assigned an id; such payloads
    /// cannot be applied to a scene store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "type", default)]
    pub kind: ShapeKind,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    /// Point list for freehand paths, in canvas coordinates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<[f64; 2]>,
    /// Identity of the participant that created the object. Informational
    /// only; ownership is not enforced after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<ParticipantId>,
    /// Fields we do not model, preserved verbatim across replaces.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DrawableObject {
    /// A freehand stroke through the given points.
    pub fn freehand(points: Vec<[f64; 2]>) -> Self {
        Self {
            kind: ShapeKind::FreehandPath,
            points,
            ..Self::default()
        }
    }

    /// An axis-aligned rectangle.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            kind: ShapeKind::Rectangle,
            x,
            y,
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    /// A circle centered on its position.
    pub fn circle(x: f64, y: f64, radius: f64) -> Self {
        Self {
            kind: ShapeKind::Circle,
            x,
            y,
            radius: Some(radius),
            ..Self::default()
        }
    }

    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    pub fn with_stroke(mut self, stroke: impl Into<String>, width: f64) -> Self {
        self.stroke = Some(stroke.into());
        self.stroke_width = Some(width);
        self
    }
}
