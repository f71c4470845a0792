//! Client-side synchronizer: the bridge between the local editing surface
//! and the event channel.
//!
//! Data flow:
//! ```text
//! editing surface ──► Synchronizer::local_*() ──► WireEvent ──► relay
//!
//! relay ──► WireEvent ──► Synchronizer::apply_remote()
//!                             │
//!                             ├─► SceneStore (insert / replace / remove / clear)
//!                             ├─► PresenceRoster (announce / cursor / departure)
//!                             └─► EditingSurface (render instructions)
//! ```
//!
//! The synchronizer is single-threaded with respect to its scene and
//! roster: inbound deliveries and local notifications must be serialized
//! onto one logical execution context by the caller. Conflict policy is
//! last-applied-wins with whole-object replace; there is no merge and no
//! pending state, every transition is immediate.

use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::presence::PresenceRoster;
use crate::protocol::{EventKind, WireEvent};
use drawsync_core::{DrawableObject, ObjectId, ParticipantInfo, SceneStore};

/// Interval between outbound cursor events. Purely a traffic bound;
/// stale cursor positions are harmless.
pub const CURSOR_INTERVAL: Duration = Duration::from_millis(50);

/// A recoverable failure reported by the editing surface.
#[derive(Debug, Clone)]
pub struct SurfaceError {
    pub message: String,
}

impl SurfaceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface error: {}", self.message)
    }
}

impl std::error::Error for SurfaceError {}

/// The rendering/input side of the whiteboard, supplied by the embedder.
///
/// The synchronizer drives it with exactly these calls; failures are
/// logged and surfaced as notices, never allowed to stop event
/// processing.
pub trait EditingSurface {
    fn insert_object(&mut self, object: &DrawableObject) -> Result<(), SurfaceError>;
    fn replace_object(&mut self, object: &DrawableObject) -> Result<(), SurfaceError>;
    fn remove_object(&mut self, id: &ObjectId) -> Result<(), SurfaceError>;
    fn clear_all(&mut self) -> Result<(), SurfaceError>;
    fn render(&mut self) -> Result<(), SurfaceError>;
}

/// A surface that renders nothing. Useful headless and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessSurface;

impl EditingSurface for HeadlessSurface {
    fn insert_object(&mut self, _object: &DrawableObject) -> Result<(), SurfaceError> {
        Ok(())
    }
    fn replace_object(&mut self, _object: &DrawableObject) -> Result<(), SurfaceError> {
        Ok(())
    }
    fn remove_object(&mut self, _id: &ObjectId) -> Result<(), SurfaceError> {
        Ok(())
    }
    fn clear_all(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }
    fn render(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }
}

/// Transient user-facing notices. Routine desynchronization never raises
/// an error dialog; these are the only things the UI should announce.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    ParticipantJoined { name: String },
    ParticipantLeft { name: String },
    CanvasCleared { by: String },
    SceneSynced,
    RenderFailed { detail: String },
}

/// Reconciles local and remote edits over one scene store and roster.
pub struct Synchronizer<S: EditingSurface> {
    local: ParticipantInfo,
    scene: SceneStore,
    roster: PresenceRoster,
    surface: S,
    last_cursor_emit: Option<Instant>,
    cursor_interval: Duration,
    /// Keeps locally minted object ids strictly increasing even when the
    /// wall clock returns the same millisecond twice.
    last_object_millis: u64,
    notices: VecDeque<Notice>,
}

impl<S: EditingSurface> Synchronizer<S> {
    /// Create a synchronizer for the given local participant.
    pub fn new(local: ParticipantInfo, surface: S) -> Self {
        Self {
            roster: PresenceRoster::new(local.clone()),
            local,
            scene: SceneStore::new(),
            surface,
            last_cursor_emit: None,
            cursor_interval: CURSOR_INTERVAL,
            last_object_millis: 0,
            notices: VecDeque::new(),
        }
    }

    /// Override the cursor throttle interval (for testing).
    pub fn with_cursor_interval(mut self, interval: Duration) -> Self {
        self.cursor_interval = interval;
        self
    }

    pub fn local(&self) -> &ParticipantInfo {
        &self.local
    }

    pub fn scene(&self) -> &SceneStore {
        &self.scene
    }

    pub fn roster(&self) -> &PresenceRoster {
        &self.roster
    }

    /// Drain pending user notices, oldest first.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    // ── Outbound path: local editing-surface notifications ─────────

    /// Announce event for the local participant; sent on connect.
    pub fn announce_event(&self) -> WireEvent {
        WireEvent::presence_announce(&self.local)
    }

    /// Departure event, emitted best-effort before teardown.
    pub fn departure_event(&self) -> WireEvent {
        WireEvent::presence_departure(self.local.id.clone())
    }

    /// Full-scene event for join-time sync or a persistence service.
    pub fn snapshot_event(&self) -> WireEvent {
        WireEvent::canvas_state(self.local.id.clone(), &self.scene.snapshot())
    }

    /// A new object was drawn or placed locally. Assigns an id if the
    /// surface did not, stamps ownership, stores it, and returns the
    /// event to broadcast: `drawing` for freehand strokes,
    /// `object-modified` for placed shapes (creation doubles as
    /// modification on the receiving side).
    pub fn local_insert(&mut self, mut object: DrawableObject) -> WireEvent {
        if object.id.is_none() {
            let millis = self.next_object_millis();
            object.id = Some(ObjectId::compose(
                object.kind.id_prefix(),
                millis,
                &self.local.id,
            ));
        }
        object.owner = Some(self.local.id.clone());

        let event = match object.kind {
            drawsync_core::ShapeKind::FreehandPath => {
                WireEvent::drawing(self.local.id.clone(), &object)
            }
            _ => WireEvent::object_modified(self.local.id.clone(), &object),
        };

        if let Err(e) = self.scene.insert_or_replace(object) {
            // Unreachable: the id was just assigned.
            log::warn!("local insert not stored: {e}");
        }
        event
    }

    /// An existing object was moved, resized, or restyled locally. Ships
    /// the complete object state, never a diff.
    pub fn local_modify(&mut self, object: DrawableObject) -> Option<WireEvent> {
        if object.id.is_none() {
            log::warn!("local modify without id, dropped");
            return None;
        }
        let event = WireEvent::object_modified(self.local.id.clone(), &object);
        if let Err(e) = self.scene.insert_or_replace(object) {
            log::warn!("local modify not stored: {e}");
            return None;
        }
        Some(event)
    }

    /// An object was deleted locally. No event if it was not in the
    /// scene to begin with.
    pub fn local_remove(&mut self, id: &ObjectId) -> Option<WireEvent> {
        self.scene
            .remove(id)
            .map(|_| WireEvent::object_removed(self.local.id.clone(), id.clone()))
    }

    /// The canvas was cleared locally.
    pub fn local_clear(&mut self) -> WireEvent {
        self.scene.clear();
        WireEvent::clear_canvas(self.local.id.clone())
    }

    /// The local pointer moved. Throttled to one event per
    /// [`CURSOR_INTERVAL`]; the roster's own entry is updated either way.
    /// Throttling delays only cursor events, so it can never reorder
    /// them relative to edit events.
    pub fn local_cursor(&mut self, x: f64, y: f64) -> Option<WireEvent> {
        let local_id = self.local.id.clone();
        self.roster.set_cursor(&local_id, x, y);

        if let Some(last) = self.last_cursor_emit {
            if last.elapsed() < self.cursor_interval {
                return None;
            }
        }
        self.last_cursor_emit = Some(Instant::now());
        Some(WireEvent::cursor_move(local_id, x, y))
    }

    // ── Inbound path: event channel deliveries ─────────────────────

    /// Apply one remote event. Returns an event to send back into the
    /// session when this synchronizer was elected to answer a join with
    /// the canvas state; `None` otherwise.
    ///
    /// Events carrying the local identity are discarded outright: a
    /// client must never re-apply its own echoes, whatever the transport
    /// does.
    pub fn apply_remote(&mut self, event: &WireEvent) -> Option<WireEvent> {
        if event.participant == self.local.id {
            log::debug!("discarding self-originated {:?}", event.kind);
            return None;
        }

        match event.kind {
            EventKind::Drawing | EventKind::ObjectModified => self.apply_object(event),
            EventKind::ObjectRemoved => self.apply_removal(event),
            EventKind::ClearCanvas => self.apply_clear(event),
            EventKind::PresenceAnnounce => return self.apply_announce(event),
            EventKind::PresenceDeparture => self.apply_departure(event),
            EventKind::CursorMove => self.apply_cursor(event),
            EventKind::CanvasState => self.apply_scene(event),
        }
        None
    }

    /// Insert-or-replace from a `drawing` or `object-modified` payload.
    /// An unknown id on a modify means the object is new here (the create
    /// may have been missed); it is inserted rather than rejected.
    fn apply_object(&mut self, event: &WireEvent) {
        let object = match event.object() {
            Ok(object) => object,
            Err(e) => {
                log::warn!("cannot apply {:?} from {}: {e}", event.kind, event.participant);
                return;
            }
        };

        match self.scene.insert_or_replace(object.clone()) {
            Ok(Some(_)) => {
                let result = self.surface.replace_object(&object);
                self.note_surface(result);
            }
            Ok(None) => {
                let result = self.surface.insert_object(&object);
                self.note_surface(result);
            }
            Err(e) => {
                log::warn!("cannot apply {:?} from {}: {e}", event.kind, event.participant);
                return;
            }
        }
        let result = self.surface.render();
        self.note_surface(result);
    }

    fn apply_removal(&mut self, event: &WireEvent) {
        let id = match event.removed_id() {
            Ok(Some(id)) => id,
            Ok(None) => {
                log::warn!("removal from {} has no id, dropped", event.participant);
                return;
            }
            Err(e) => {
                log::warn!("cannot apply removal from {}: {e}", event.participant);
                return;
            }
        };

        // Already gone (or never seen): silent no-op, not an error.
        if self.scene.remove(&id).is_some() {
            let result = self.surface.remove_object(&id);
            self.note_surface(result);
            let result = self.surface.render();
            self.note_surface(result);
        } else {
            log::debug!("removal of unknown object {id}, ignored");
        }
    }

    fn apply_clear(&mut self, event: &WireEvent) {
        self.scene.clear();
        let result = self.surface.clear_all();
        self.note_surface(result);
        let result = self.surface.render();
        self.note_surface(result);
        self.notices.push_back(Notice::CanvasCleared {
            by: self.display_name(event),
        });
    }

    fn apply_announce(&mut self, event: &WireEvent) -> Option<WireEvent> {
        let info = match event.participant_info() {
            Ok(info) => info,
            Err(e) => {
                log::warn!("cannot apply announce from {}: {e}", event.participant);
                return None;
            }
        };

        let name = info.name.clone();
        let joiner = info.id.clone();
        if !self.roster.upsert(info) {
            // Re-announce of a known participant: reactivated, no notice.
            return None;
        }
        self.notices.push_back(Notice::ParticipantJoined { name });

        // Join-time sync: the active participant with the smallest
        // identity answers with the current canvas state. Races elect at
        // most a few responders and replace-all is idempotent, so
        // duplicates are harmless.
        if !self.scene.is_empty()
            && self.roster.min_active_id(&joiner) == Some(&self.local.id)
        {
            log::info!("answering join of {joiner} with canvas state");
            return Some(self.snapshot_event());
        }
        None
    }

    fn apply_departure(&mut self, event: &WireEvent) {
        // Marked inactive, never removed: the roster keeps departed
        // participants' names, colors, and cursor trails for the session.
        if self.roster.set_active(&event.participant, false) {
            self.notices.push_back(Notice::ParticipantLeft {
                name: self.display_name(event),
            });
        } else {
            log::debug!("departure for unknown participant {}", event.participant);
        }
    }

    fn apply_cursor(&mut self, event: &WireEvent) {
        match event.cursor() {
            Ok(cursor) => self.roster.set_cursor(&event.participant, cursor.x, cursor.y),
            Err(e) => log::warn!("cannot apply cursor from {}: {e}", event.participant),
        }
    }

    fn apply_scene(&mut self, event: &WireEvent) {
        let snapshot = match event.scene() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("cannot apply canvas state from {}: {e}", event.participant);
                return;
            }
        };

        self.scene.replace_all(snapshot);

        let result = self.surface.clear_all();
        self.note_surface(result);
        for object in self.scene.iter() {
            if let Err(e) = self.surface.insert_object(object) {
                log::warn!("{e}");
                self.notices.push_back(Notice::RenderFailed { detail: e.message });
            }
        }
        let result = self.surface.render();
        self.note_surface(result);
        self.notices.push_back(Notice::SceneSynced);
    }

    // ── Helpers ────────────────────────────────────────────────────

    /// Roster display name for the event's sender, falling back to the
    /// bare identity.
    fn display_name(&self, event: &WireEvent) -> String {
        self.roster
            .entry(&event.participant)
            .map(|e| e.info.name.clone())
            .unwrap_or_else(|| event.participant.to_string())
    }

    /// Surface failures are recoverable: log, notice, carry on.
    fn note_surface(&mut self, result: Result<(), SurfaceError>) {
        if let Err(e) = result {
            log::warn!("{e}");
            self.notices.push_back(Notice::RenderFailed { detail: e.message });
        }
    }

    /// Wall-clock milliseconds, forced strictly increasing locally.
    fn next_object_millis(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.last_object_millis = now.max(self.last_object_millis + 1);
        self.last_object_millis
    }
}
