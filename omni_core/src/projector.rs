//! Scene Projector - turns camera pose and live actor state into a frame.
//!
//! A [`RenderFrame`] is the complete, renderer-agnostic description of what
//! is on screen: one world transform wrapping everything, plus placement,
//! faces and shading for every actor, emitter and label. World units are
//! scaled by [`ProjectorConfig::unit_scale`] into pixels, with y flipped
//! because screen space grows downward.

use crate::actors::{ActorStore, LiveActorState};
use crate::camera::CameraPose;
use crate::color::Rgba;
use crate::document::{EffectKind, PrimitiveKind, SceneDocument};
use crate::geometry::{self, FaceGeometry, TransformStack};
use crate::shading::{self, FaceShading};

use nalgebra::{Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Pixels per world unit
    pub unit_scale: f64,
    /// Perspective distance in pixels
    pub perspective_px: f64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            unit_scale: 50.0,
            perspective_px: 1000.0,
        }
    }
}

impl ProjectorConfig {
    /// Camera pan that centers a world position.
    pub fn pan_for(&self, position: &Vector3<f64>) -> Vector2<f64> {
        Vector2::new(-position.x * self.unit_scale, position.y * self.unit_scale)
    }
}

const FLOOR_SIZE_PX: f64 = 4000.0;
const FLOOR_DROP_PX: f64 = -200.0;
const SHADOW_SIZE_PX: f64 = 120.0;
const SHADOW_OPACITY: f64 = 0.2;
const SHADOW_Y_PX: f64 = 30.0;
const EMITTER_SIZE_PX: f64 = 24.0;
const EMITTER_OPACITY: f64 = 0.6;

/// Everything needed to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct RenderFrame {
    pub sequence: u64,
    pub time_secs: f64,
    pub camera: CameraPose,
    /// Wraps the whole world
    pub world: TransformStack,
    pub floor: FloorPlane,
    pub actors: Vec<ActorRender>,
    pub emitters: Vec<EmitterRender>,
    pub labels: Vec<LabelRender>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloorPlane {
    pub size_px: f64,
    pub transform: TransformStack,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedFace {
    #[serde(flatten)]
    pub geometry: FaceGeometry,
    pub shading: FaceShading,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShadowRender {
    pub transform: TransformStack,
    pub size_px: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActorRender {
    pub id: String,
    pub kind: PrimitiveKind,
    pub transform: TransformStack,
    pub opacity: f64,
    pub width: f64,
    pub height: f64,
    pub faces: Vec<RenderedFace>,
    pub shadow: ShadowRender,
    /// Projected screen position of the actor's origin, relative to the
    /// viewport center
    pub screen: Vector2<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmitterRender {
    pub id: String,
    pub kind: EffectKind,
    pub transform: TransformStack,
    pub size_px: f64,
    pub color: Rgba,
    pub opacity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelRender {
    pub target_actor_id: String,
    pub text: String,
    pub transform: TransformStack,
}

/// Stateless frame builder.
#[derive(Debug, Clone, Default)]
pub struct SceneProjector {
    config: ProjectorConfig,
}

impl SceneProjector {
    pub fn new(config: ProjectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// `translate(0,0,zoom) rotateX(pitch) rotateY(yaw) translate(pan)`.
    pub fn world_transform(&self, camera: &CameraPose) -> TransformStack {
        TransformStack::new()
            .translate_z(camera.zoom)
            .rotate_x(camera.pitch)
            .rotate_y(camera.yaw)
            .translate(camera.pan.x, camera.pan.y, 0.0)
    }

    pub fn project(
        &self,
        document: Option<&SceneDocument>,
        actors: &ActorStore,
        camera: CameraPose,
        sequence: u64,
        time_secs: f64,
    ) -> RenderFrame {
        let world = self.world_transform(&camera);
        let floor = FloorPlane {
            size_px: FLOOR_SIZE_PX,
            transform: TransformStack::new().rotate_x(90.0).translate_z(FLOOR_DROP_PX),
        };

        let (actor_renders, emitters, labels) = match document {
            Some(doc) => (
                self.project_actors(doc, actors, &world),
                self.project_emitters(doc, actors),
                self.project_labels(doc, actors, &camera),
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        RenderFrame {
            sequence,
            time_secs,
            camera,
            world,
            floor,
            actors: actor_renders,
            emitters,
            labels,
        }
    }

    fn scaled(&self, position: &Vector3<f64>) -> Vector3<f64> {
        let s = self.config.unit_scale;
        Vector3::new(position.x * s, -position.y * s, position.z * s)
    }

    fn project_actors(
        &self,
        doc: &SceneDocument,
        actors: &ActorStore,
        world: &TransformStack,
    ) -> Vec<ActorRender> {
        let world_matrix = world.matrix();

        doc.actors
            .iter()
            .map(|def| {
                let state = actors.get(&def.id).copied().unwrap_or(LiveActorState {
                    position: Vector3::zeros(),
                    rotation: Vector3::zeros(),
                    scale: Vector3::repeat(1.0),
                    opacity: 1.0,
                    color: Rgba::WHITE,
                });
                let p = self.scaled(&state.position);
                let transform = TransformStack::new()
                    .translate(p.x, p.y, p.z)
                    .rotate_x(state.rotation.x)
                    .rotate_y(state.rotation.y)
                    .rotate_z(state.rotation.z)
                    .scale(state.scale.x, state.scale.y, state.scale.z);

                let faces = geometry::faces_for(def.kind)
                    .into_iter()
                    .map(|face| RenderedFace {
                        shading: shading::shade(def.material.class, face.role, state.color),
                        geometry: face,
                    })
                    .collect();

                let shadow = ShadowRender {
                    transform: TransformStack::new()
                        .translate(p.x, SHADOW_Y_PX, p.z)
                        .rotate_x(90.0),
                    size_px: SHADOW_SIZE_PX,
                    opacity: SHADOW_OPACITY,
                };

                let (width, height) = geometry::element_size(def.kind);
                let view = world_matrix.transform_point(&Point3::from(p));

                ActorRender {
                    id: def.id.clone(),
                    kind: def.kind,
                    transform,
                    opacity: state.opacity,
                    width,
                    height,
                    faces,
                    shadow,
                    screen: self.perspective(view),
                }
            })
            .collect()
    }

    fn project_emitters(&self, doc: &SceneDocument, actors: &ActorStore) -> Vec<EmitterRender> {
        doc.emitters
            .iter()
            .map(|emitter| {
                let base = emitter
                    .parent_actor_id
                    .as_deref()
                    .and_then(|id| actors.get(id))
                    .map(|state| self.scaled(&state.position))
                    .unwrap_or_else(Vector3::zeros);
                let offset = emitter.offset;

                EmitterRender {
                    id: emitter.id.clone(),
                    kind: emitter.kind,
                    transform: TransformStack::new().translate(
                        base.x + offset.x,
                        base.y - offset.y,
                        base.z + offset.z,
                    ),
                    size_px: EMITTER_SIZE_PX,
                    color: emitter.config.color,
                    opacity: EMITTER_OPACITY,
                }
            })
            .collect()
    }

    fn project_labels(
        &self,
        doc: &SceneDocument,
        actors: &ActorStore,
        camera: &CameraPose,
    ) -> Vec<LabelRender> {
        doc.labels
            .iter()
            .filter_map(|label| {
                let state = actors.get(&label.target_actor_id)?;
                let p = self.scaled(&state.position);
                Some(LabelRender {
                    target_actor_id: label.target_actor_id.clone(),
                    text: label.text.clone(),
                    transform: TransformStack::new()
                        .translate(
                            p.x + label.screen_offset.x,
                            p.y - label.screen_offset.y,
                            0.0,
                        )
                        .rotate_y(-camera.yaw)
                        .rotate_x(-camera.pitch),
                })
            })
            .collect()
    }

    fn perspective(&self, view: Point3<f64>) -> Vector2<f64> {
        let d = self.config.perspective_px;
        let denom = d - view.z;
        // Behind the eye: pin to the center rather than flipping.
        if denom <= f64::EPSILON {
            return Vector2::zeros();
        }
        let factor = d / denom;
        Vector2::new(view.x * factor, view.y * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Action, ActionKind};
    use approx::assert_relative_eq;
    use serde_json::json;

    fn doc() -> SceneDocument {
        SceneDocument::from_value(&json!({
            "stage_assets": [
                { "id": "sun", "type": "sphere", "initial_transform": { "position": [0, 0, 0] } },
                { "id": "tower", "type": "cylinder", "initial_transform": { "position": [2, 1, -1] },
                  "pbr_material": { "material_class": "METAL", "base_color": "#888888" } }
            ],
            "vfx_stack": [
                { "id": "flare", "effect_type": "FIRE", "parent_actor_id": "tower",
                  "config": { "color": "#ff5500" }, "position_offset": [5, 10, 0] },
                { "id": "orphan", "effect_type": "FOG", "parent_actor_id": "ghost" }
            ],
            "ui_overlays": [
                { "target_actor_id": "tower", "label_text": "Tower", "screen_offset": [0, 40] },
                { "target_actor_id": "ghost", "label_text": "Nobody" }
            ]
        }))
        .unwrap()
    }

    fn seeded() -> (SceneDocument, ActorStore) {
        let doc = doc();
        let mut actors = ActorStore::new();
        actors.seed(&doc);
        (doc, actors)
    }

    #[test]
    fn test_world_transform_string() {
        let projector = SceneProjector::default();
        let mut camera = CameraPose::new(20.0, 45.0, -450.0);
        camera.pan = Vector2::new(-100.0, 50.0);
        assert_eq!(
            projector.world_transform(&camera).to_string(),
            "translate3d(0px, 0px, -450px) rotateX(20deg) rotateY(45deg) translate3d(-100px, 50px, 0px)"
        );
    }

    #[test]
    fn test_actor_placement() {
        let (doc, actors) = seeded();
        let frame = SceneProjector::default().project(
            Some(&doc),
            &actors,
            CameraPose::new(20.0, 0.0, -450.0),
            1,
            0.0,
        );

        let tower = &frame.actors[1];
        assert_eq!(
            tower.transform.to_string(),
            "translate3d(100px, -50px, -50px) rotateX(0deg) rotateY(0deg) rotateZ(0deg) scale3d(1, 1, 1)"
        );
        assert_eq!((tower.width, tower.height), (100.0, 180.0));
        assert_eq!(tower.faces.len(), 5);
        assert_eq!(
            tower.shadow.transform.to_string(),
            "translate3d(100px, 30px, -50px) rotateX(90deg)"
        );
        assert_eq!(frame.floor.transform.to_string(), "rotateX(90deg) translate3d(0px, 0px, -200px)");
    }

    #[test]
    fn test_emitters_and_labels() {
        let (doc, actors) = seeded();
        let camera = CameraPose::new(10.0, 30.0, -450.0);
        let frame = SceneProjector::default().project(Some(&doc), &actors, camera, 1, 0.0);

        assert_eq!(
            frame.emitters[0].transform.to_string(),
            "translate3d(105px, -60px, -50px)"
        );
        assert_eq!(frame.emitters[0].opacity, 0.6);
        assert_eq!(frame.emitters[1].transform.to_string(), "translate3d(0px, 0px, 0px)");

        assert_eq!(frame.labels.len(), 1);
        assert_eq!(
            frame.labels[0].transform.to_string(),
            "translate3d(100px, -90px, 0px) rotateY(-30deg) rotateX(-10deg)"
        );
    }

    #[test]
    fn test_fade_carries_into_render() {
        let (doc, mut actors) = seeded();
        actors.apply(&Action {
            actor_id: "sun".to_string(),
            kind: ActionKind::FadeOut,
            target: None,
            easing: None,
        });
        let frame = SceneProjector::default().project(
            Some(&doc),
            &actors,
            CameraPose::new(0.0, 0.0, -450.0),
            1,
            0.0,
        );
        assert_eq!(frame.actors[0].opacity, 0.0);
    }

    #[test]
    fn test_screen_projection_and_pan() {
        let projector = SceneProjector::default();
        let (doc, actors) = seeded();

        // Centering the tower puts it at the middle of the screen.
        let mut camera = CameraPose::new(0.0, 0.0, -450.0);
        camera.pan = projector.config().pan_for(&Vector3::new(2.0, 1.0, -1.0));
        assert_eq!(camera.pan, Vector2::new(-100.0, 50.0));

        let frame = projector.project(Some(&doc), &actors, camera, 1, 0.0);
        assert_relative_eq!(frame.actors[1].screen.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(frame.actors[1].screen.y, 0.0, epsilon = 1e-9);
        // The sun is 100px to the left, shrunk by distance.
        assert!(frame.actors[0].screen.x < 0.0 && frame.actors[0].screen.x > -100.0);
    }

    #[test]
    fn test_empty_frame_without_document() {
        let frame = SceneProjector::default().project(
            None,
            &ActorStore::new(),
            CameraPose::new(20.0, 0.0, -450.0),
            7,
            1.5,
        );
        assert!(frame.actors.is_empty());
        assert_eq!(frame.sequence, 7);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["world"], "translate3d(0px, 0px, -450px) rotateX(20deg) rotateY(0deg) translate3d(0px, 0px, 0px)");
    }
}
