//! Actor Transform Store - the mutable scene graph.
//!
//! Seeded from a document's `stage_assets`, then mutated only by timeline
//! actions. Every seeded actor has exactly one entry; actions that name
//! anything else are no-ops.

use crate::color::Rgba;
use crate::document::{Action, ActionKind, SceneDocument};

use nalgebra::Vector3;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Live transform and appearance of one actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiveActorState {
    pub position: Vector3<f64>,
    /// Euler angles in degrees
    pub rotation: Vector3<f64>,
    pub scale: Vector3<f64>,
    /// [0, 1]
    pub opacity: f64,
    pub color: Rgba,
}

/// Result of applying a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    UnknownActor,
    MalformedTarget,
}

/// Actor id -> live state.
#[derive(Debug, Clone, Default)]
pub struct ActorStore {
    actors: HashMap<String, LiveActorState>,
}

impl ActorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all state with the document's initial transforms.
    pub fn seed(&mut self, document: &SceneDocument) {
        self.actors.clear();
        for def in &document.actors {
            self.actors.insert(
                def.id.clone(),
                LiveActorState {
                    position: def.transform.position,
                    rotation: def.transform.rotation,
                    scale: def.transform.scale,
                    opacity: 1.0,
                    color: def.material.base_color,
                },
            );
        }
    }

    pub fn get(&self, id: &str) -> Option<&LiveActorState> {
        self.actors.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actors.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LiveActorState)> {
        self.actors.iter().map(|(id, state)| (id.as_str(), state))
    }

    /// Applies one action. Only the named actor is touched.
    pub fn apply(&mut self, action: &Action) -> ActionOutcome {
        let Some(state) = self.actors.get_mut(&action.actor_id) else {
            debug!(actor = %action.actor_id, "action targets unknown actor; skipped");
            return ActionOutcome::UnknownActor;
        };

        match (action.kind, action.target) {
            (ActionKind::FadeOut, _) => state.opacity = 0.0,
            (ActionKind::MoveTo, Some(target)) => state.position = target,
            (ActionKind::RotateTo, Some(target)) => state.rotation = target,
            (ActionKind::ScaleTo, Some(target)) => state.scale = target,
            (kind, None) => {
                debug!(actor = %action.actor_id, ?kind, "malformed target; skipped");
                return ActionOutcome::MalformedTarget;
            }
        }
        ActionOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_actor_doc() -> SceneDocument {
        SceneDocument::from_value(&json!({
            "stage_assets": [
                { "id": "sun", "type": "sphere",
                  "initial_transform": { "position": [0, 0, 0] },
                  "pbr_material": { "base_color": "#ffaa00" } },
                { "id": "earth", "type": "sphere",
                  "initial_transform": { "position": [4, 0, 0] } }
            ]
        }))
        .unwrap()
    }

    fn action(actor: &str, kind: ActionKind, target: Option<[f64; 3]>) -> Action {
        Action {
            actor_id: actor.to_string(),
            kind,
            target: target.map(Vector3::from),
            easing: None,
        }
    }

    #[test]
    fn test_seed_creates_one_entry_per_actor() {
        let doc = two_actor_doc();
        let mut store = ActorStore::new();
        store.seed(&doc);
        store.seed(&doc);

        assert_eq!(store.len(), 2);
        let sun = store.get("sun").unwrap();
        assert_eq!(sun.opacity, 1.0);
        assert_eq!(sun.color, Rgba::rgb(0xff, 0xaa, 0x00));
        assert_eq!(sun.scale, Vector3::repeat(1.0));
    }

    #[test]
    fn test_move_to_touches_only_named_actor() {
        let mut store = ActorStore::new();
        store.seed(&two_actor_doc());
        let earth_before = *store.get("earth").unwrap();

        let outcome = store.apply(&action("sun", ActionKind::MoveTo, Some([1.0, 2.0, 3.0])));

        assert_eq!(outcome, ActionOutcome::Applied);
        assert_eq!(store.get("sun").unwrap().position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(*store.get("earth").unwrap(), earth_before);
    }

    #[test]
    fn test_unknown_actor_is_noop() {
        let mut store = ActorStore::new();
        store.seed(&two_actor_doc());
        let before: Vec<_> = {
            let mut v: Vec<_> = store.iter().map(|(id, s)| (id.to_string(), *s)).collect();
            v.sort_by(|a, b| a.0.cmp(&b.0));
            v
        };

        let outcome = store.apply(&action("pluto", ActionKind::MoveTo, Some([9.0, 9.0, 9.0])));
        assert_eq!(outcome, ActionOutcome::UnknownActor);
        assert!(!store.contains("pluto"));

        let mut after: Vec<_> = store.iter().map(|(id, s)| (id.to_string(), *s)).collect();
        after.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(before, after);
    }

    #[test]
    fn test_fade_out_and_malformed_target() {
        let mut store = ActorStore::new();
        store.seed(&two_actor_doc());

        assert_eq!(
            store.apply(&action("earth", ActionKind::ScaleTo, None)),
            ActionOutcome::MalformedTarget
        );
        assert_eq!(store.get("earth").unwrap().scale, Vector3::repeat(1.0));

        assert_eq!(
            store.apply(&action("earth", ActionKind::FadeOut, None)),
            ActionOutcome::Applied
        );
        assert_eq!(store.get("earth").unwrap().opacity, 0.0);
    }

    #[test]
    fn test_rotate_and_scale() {
        let mut store = ActorStore::new();
        store.seed(&two_actor_doc());
        store.apply(&action("sun", ActionKind::RotateTo, Some([0.0, 45.0, 0.0])));
        store.apply(&action("sun", ActionKind::ScaleTo, Some([2.0, 2.0, 2.0])));

        let sun = store.get("sun").unwrap();
        assert_eq!(sun.rotation, Vector3::new(0.0, 45.0, 0.0));
        assert_eq!(sun.scale, Vector3::repeat(2.0));
    }
}
