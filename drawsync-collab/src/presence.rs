//! Presence roster: who is in the session and where their cursor is.
//!
//! Entries are created on announce (or on the first cursor sighting, as a
//! placeholder) and are never deleted, only marked inactive, so that a
//! departed participant's name, color, and last cursor survive for the
//! rest of the session and a rejoin keeps its identity stable.
//!
//! The roster is pure data owned by one synchronizer; all access happens
//! on that synchronizer's single logical execution context, so there is
//! no locking here.

use drawsync_core::{ParticipantId, ParticipantInfo};
use std::collections::HashMap;

/// One participant as known to the local session.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceEntry {
    pub info: ParticipantInfo,
    pub active: bool,
    /// Last known cursor position, if any was ever reported.
    pub cursor: Option<(f64, f64)>,
}

impl PresenceEntry {
    fn new(info: ParticipantInfo) -> Self {
        let active = info.active;
        Self {
            info,
            active,
            cursor: None,
        }
    }
}

/// Mapping from participant identity to presence record, first-seen
/// ordered with the local participant pinned first for display.
#[derive(Debug, Clone)]
pub struct PresenceRoster {
    local: ParticipantId,
    entries: HashMap<ParticipantId, PresenceEntry>,
    /// First-seen order; the local participant is always element 0.
    order: Vec<ParticipantId>,
}

impl PresenceRoster {
    /// Create a roster seeded with the local participant, active.
    pub fn new(local: ParticipantInfo) -> Self {
        let local_id = local.id.clone();
        let mut entries = HashMap::new();
        entries.insert(local_id.clone(), PresenceEntry::new(local));
        Self {
            local: local_id.clone(),
            entries,
            order: vec![local_id],
        }
    }

    /// Insert or refresh a participant's announced metadata, marking it
    /// active. Returns `true` if the identity was not seen before.
    pub fn upsert(&mut self, info: ParticipantInfo) -> bool {
        match self.entries.get_mut(&info.id) {
            Some(entry) => {
                // Re-announce: refresh display metadata, keep the cursor
                // trail and the first-seen position.
                entry.info = info;
                entry.active = true;
                false
            }
            None => {
                self.order.push(info.id.clone());
                self.entries
                    .insert(info.id.clone(), PresenceEntry::new(info));
                true
            }
        }
    }

    /// Flip a participant's connectivity status. Unknown identities are
    /// ignored; returns whether an entry was updated.
    pub fn set_active(&mut self, id: &ParticipantId, active: bool) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.active = active;
                true
            }
            None => false,
        }
    }

    /// Record a cursor position, marking the participant active. A cursor
    /// may arrive before its announce (the relay does not order across
    /// senders), so an unknown identity gets a placeholder entry.
    pub fn set_cursor(&mut self, id: &ParticipantId, x: f64, y: f64) {
        if !self.entries.contains_key(id) {
            self.upsert(ParticipantInfo::with_id(id.clone()));
        }
        if let Some(entry) = self.entries.get_mut(id) {
            entry.cursor = Some((x, y));
            entry.active = true;
        }
    }

    /// Look up one entry.
    pub fn entry(&self, id: &ParticipantId) -> Option<&PresenceEntry> {
        self.entries.get(id)
    }

    /// Entries in display order: local first, then first-seen.
    pub fn list(&self) -> Vec<&PresenceEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    /// Total entries, departed ones included.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Currently active entries.
    pub fn active_count(&self) -> usize {
        self.entries.values().filter(|e| e.active).count()
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local
    }

    pub fn is_local(&self, id: &ParticipantId) -> bool {
        *id == self.local
    }

    /// The smallest identity among active participants, excluding the
    /// given one. Used as a deterministic, server-free tiebreak when
    /// electing which participant answers a join with the canvas state.
    pub fn min_active_id(&self, exclude: &ParticipantId) -> Option<&ParticipantId> {
        self.entries
            .values()
            .filter(|e| e.active && e.info.id != *exclude)
            .map(|e| &e.info.id)
            .min()
    }
}
