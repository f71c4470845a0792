//! The scene store: every live object on one participant's canvas.
//!
//! Objects are keyed by id, but paint order matters for rendering, so the
//! store keeps an explicit back-to-front order vector alongside the map.
//! Replacing an object keeps its paint position; inserting appends on top.

use crate::object::{DrawableObject, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Errors from scene store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The object payload carried no id, so it cannot be addressed.
    MissingId,
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId => write!(f, "object payload has no id"),
        }
    }
}

impl std::error::Error for SceneError {}

/// A serializable snapshot of a full scene, in paint order.
///
/// This is the `canvas-state` payload and the unit a persistence service
/// would store and replay.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default)]
    pub objects: Vec<DrawableObject>,
}

/// Ordered id -> object collection for one participant's view.
#[derive(Debug, Clone, Default)]
pub struct SceneStore {
    objects: HashMap<ObjectId, DrawableObject>,
    /// Paint order, back to front.
    order: Vec<ObjectId>,
}

impl SceneStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn get(&self, id: &ObjectId) -> Option<&DrawableObject> {
        self.objects.get(id)
    }

    /// Insert a new object or overwrite an existing one wholesale.
    ///
    /// Returns the displaced object when this was a replace. There is no
    /// field-level merge anywhere in the system: the incoming payload is
    /// the complete new state.
    pub fn insert_or_replace(
        &mut self,
        object: DrawableObject,
    ) -> Result<Option<DrawableObject>, SceneError> {
        let id = object.id.clone().ok_or(SceneError::MissingId)?;
        let previous = self.objects.insert(id.clone(), object);
        if previous.is_none() {
            self.order.push(id);
        }
        Ok(previous)
    }

    /// Remove an object. Unknown ids are a silent no-op, not an error:
    /// the removal may simply have raced an event we never received.
    pub fn remove(&mut self, id: &ObjectId) -> Option<DrawableObject> {
        let removed = self.objects.remove(id);
        if removed.is_some() {
            self.order.retain(|o| o != id);
        }
        removed
    }

    /// Discard every object.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.order.clear();
    }

    /// Objects in paint order, back to front.
    pub fn iter(&self) -> impl Iterator<Item = &DrawableObject> {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    /// Serializable copy of the full scene in paint order.
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            objects: self.iter().cloned().collect(),
        }
    }

    /// Rebuild the store from a snapshot, discarding current contents.
    /// Snapshot entries without an id are dropped with a warning.
    pub fn replace_all(&mut self, snapshot: SceneSnapshot) {
        self.clear();
        for object in snapshot.objects {
            if let Err(e) = self.insert_or_replace(object) {
                log::warn!("dropping snapshot entry: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ShapeKind;

    fn obj(id: &str) -> DrawableObject {
        DrawableObject {
            id: Some(ObjectId::new(id)),
            ..DrawableObject::rectangle(0.0, 0.0, 10.0, 10.0)
        }
    }

    #[test]
    fn test_insert_then_get() {
        let mut scene = SceneStore::new();
        assert!(scene.insert_or_replace(obj("a")).unwrap().is_none());
        assert_eq!(scene.len(), 1);
        assert!(scene.contains(&ObjectId::new("a")));
    }

    #[test]
    fn test_insert_without_id_errors() {
        let mut scene = SceneStore::new();
        let anonymous = DrawableObject::circle(1.0, 1.0, 5.0);
        assert_eq!(
            scene.insert_or_replace(anonymous),
            Err(SceneError::MissingId)
        );
        assert!(scene.is_empty());
    }

    #[test]
    fn test_replace_keeps_paint_position() {
        let mut scene = SceneStore::new();
        scene.insert_or_replace(obj("a")).unwrap();
        scene.insert_or_replace(obj("b")).unwrap();
        scene.insert_or_replace(obj("c")).unwrap();

        let mut moved = obj("b");
        moved.x = 99.0;
        let displaced = scene.insert_or_replace(moved).unwrap();
        assert!(displaced.is_some());

        let order: Vec<&str> = scene
            .iter()
            .map(|o| o.id.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(scene.get(&ObjectId::new("b")).unwrap().x, 99.0);
    }

    #[test]
    fn test_replace_is_whole_object() {
        let mut scene = SceneStore::new();
        let first = obj("a").with_fill("#EF4444");
        scene.insert_or_replace(first).unwrap();

        // The replacement has no fill; it must not inherit one.
        scene.insert_or_replace(obj("a")).unwrap();
        assert!(scene.get(&ObjectId::new("a")).unwrap().fill.is_none());
    }

    #[test]
    fn test_insert_or_replace_idempotent() {
        let mut scene = SceneStore::new();
        let payload = obj("a");
        scene.insert_or_replace(payload.clone()).unwrap();
        scene.insert_or_replace(payload.clone()).unwrap();
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.get(&ObjectId::new("a")), Some(&payload));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut scene = SceneStore::new();
        scene.insert_or_replace(obj("a")).unwrap();
        assert!(scene.remove(&ObjectId::new("ghost")).is_none());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_remove_present() {
        let mut scene = SceneStore::new();
        scene.insert_or_replace(obj("a")).unwrap();
        scene.insert_or_replace(obj("b")).unwrap();
        assert!(scene.remove(&ObjectId::new("a")).is_some());
        let order: Vec<&str> = scene
            .iter()
            .map(|o| o.id.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(order, vec!["b"]);
    }

    #[test]
    fn test_clear() {
        let mut scene = SceneStore::new();
        scene.insert_or_replace(obj("a")).unwrap();
        scene.insert_or_replace(obj("b")).unwrap();
        scene.clear();
        assert!(scene.is_empty());
        assert_eq!(scene.iter().count(), 0);
    }

    #[test]
    fn test_snapshot_replace_all() {
        let mut scene = SceneStore::new();
        scene.insert_or_replace(obj("a")).unwrap();
        scene
            .insert_or_replace(DrawableObject {
                id: Some(ObjectId::new("p")),
                ..DrawableObject::freehand(vec![[0.0, 0.0], [10.0, 10.0]])
            })
            .unwrap();

        let snapshot = scene.snapshot();
        assert_eq!(snapshot.objects.len(), 2);

        let mut other = SceneStore::new();
        other.insert_or_replace(obj("stale")).unwrap();
        other.replace_all(snapshot);

        assert_eq!(other.len(), 2);
        assert!(!other.contains(&ObjectId::new("stale")));
        assert_eq!(
            other.get(&ObjectId::new("p")).unwrap().kind,
            ShapeKind::FreehandPath
        );
    }

    #[test]
    fn test_replace_all_drops_anonymous_entries() {
        let snapshot = SceneSnapshot {
            objects: vec![obj("a"), DrawableObject::circle(0.0, 0.0, 1.0)],
        };
        let mut scene = SceneStore::new();
        scene.replace_all(snapshot);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut scene = SceneStore::new();
        scene.insert_or_replace(obj("a")).unwrap();
        let json = serde_json::to_value(scene.snapshot()).unwrap();
        assert!(json["objects"].is_array());
    }
}
