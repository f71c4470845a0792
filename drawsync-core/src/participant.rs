//! Participant identity and display metadata.
//!
//! Identities are opaque strings minted by the client itself, not the
//! server. The relay only ever compares them for equality, so the format
//! matters only for collision probability and log readability.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Fixed display palette. Every participant gets one of these.
pub const PALETTE: [&str; 6] = [
    "#8B5CF6", "#10B981", "#EF4444", "#F59E0B", "#3B82F6", "#000000",
];

/// Opaque, client-generated participant identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap an existing identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh identity: `user_` plus seven hex chars of a v4 UUID.
    ///
    /// Not guaranteed collision-free; seven random hex chars keep the
    /// probability negligible for whiteboard-sized sessions.
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("user_{}", &suffix[..7]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for display names and logs (`abc` out of `user_abc1234`).
    pub fn short(&self) -> &str {
        let tail = self.0.strip_prefix("user_").unwrap_or(&self.0);
        tail.get(..3).unwrap_or(tail)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pick a palette color for an identity. Stable: the same identity always
/// hashes to the same swatch, so a rejoining participant keeps its color.
pub fn palette_color(id: &ParticipantId) -> &'static str {
    let mut hasher = DefaultHasher::new();
    id.as_str().hash(&mut hasher);
    PALETTE[(hasher.finish() % PALETTE.len() as u64) as usize]
}

/// A participant's announced display metadata.
///
/// This is also the JSON payload of a `presence-announce` event, so every
/// field a remote client might omit is defaulted rather than required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: ParticipantId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ParticipantInfo {
    /// Metadata for an explicitly named participant.
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        let color = palette_color(&id).to_string();
        Self {
            id,
            name: name.into(),
            color,
            active: true,
        }
    }

    /// Metadata derived entirely from an identity, used when nothing else
    /// was announced (placeholder roster entries, malformed payloads).
    pub fn with_id(id: ParticipantId) -> Self {
        let name = format!("User {}", id.short());
        Self::new(id, name)
    }

    /// Mint a fresh identity with a derived display name.
    pub fn generate() -> Self {
        Self::with_id(ParticipantId::generate())
    }
}
