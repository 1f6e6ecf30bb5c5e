//! The Scene Document - boundary between the untrusted generator and the runtime.
//!
//! The generator is a prompted model and routinely returns output that is
//! almost, but not quite, what the schema asks for. Everything here walks
//! the raw JSON and coerces it into the strongly-typed model below:
//!
//! - Structural failures (empty text, not JSON, not an object) are rejected
//! - Out-of-range numbers are clamped, malformed vectors fall back to defaults
//! - Entries that cannot be interpreted at all are dropped with a warning
//!
//! Nothing downstream of [`SceneDocument::from_json`] ever sees a
//! `serde_json::Value`.

use crate::color::Rgba;
use crate::error::DocumentError;

use nalgebra::{Vector2, Vector3};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

/// Duration used for steps whose duration is missing, zero or negative.
pub const DEFAULT_STEP_SECONDS: f64 = 2.0;

/// Longest step duration accepted from a document.
pub const MAX_STEP_SECONDS: f64 = 3600.0;

// =============================================================================
// TYPED MODEL
// =============================================================================

/// A complete, validated simulation description.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SceneDocument {
    pub meta: MetaData,
    pub visual_settings: VisualSettings,
    pub assistant: AssistantConfig,
    pub actors: Vec<ActorDef>,
    pub emitters: Vec<EmitterDef>,
    pub labels: Vec<LabelDef>,
    pub timeline: Vec<Step>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetaData {
    pub title: String,
    /// The core lesson, or the consequence of the "what if" change
    pub verdict: String,
    pub is_remix: bool,
}

impl Default for MetaData {
    fn default() -> Self {
        Self {
            title: "Untitled Simulation".to_string(),
            verdict: String::new(),
            is_remix: false,
        }
    }
}

/// Presentation-only settings; the runtime carries them untouched.
#[derive(Debug, Clone, Serialize)]
pub struct VisualSettings {
    pub environment_preset: String,
    /// Bloom intensity in [0, 3]
    pub bloom_intensity: f64,
    pub vignette: bool,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            environment_preset: "studio".to_string(),
            bloom_intensity: 0.0,
            vignette: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantConfig {
    pub bot_name: String,
    /// Hidden brief handed verbatim to the chat assistant
    pub context_brief: String,
    pub suggested_questions: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            bot_name: "Lab Assistant".to_string(),
            context_brief: String::new(),
            suggested_questions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Sphere,
    Cube,
    Cylinder,
    Cone,
    TerrainModel,
    GlbAsset,
}

impl PrimitiveKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "sphere" => Some(Self::Sphere),
            "cube" | "box" => Some(Self::Cube),
            "cylinder" => Some(Self::Cylinder),
            "cone" => Some(Self::Cone),
            "terrain_model" | "terrain" => Some(Self::TerrainModel),
            "glb_asset" | "glb" => Some(Self::GlbAsset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InitialTransform {
    pub position: Vector3<f64>,
    pub rotation: Vector3<f64>,
    pub scale: Vector3<f64>,
}

impl Default for InitialTransform {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            scale: Vector3::repeat(1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialClass {
    Glass,
    Liquid,
    Metal,
    Plastic,
    Rock,
    GlowingLava,
}

impl MaterialClass {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "GLASS" => Some(Self::Glass),
            "LIQUID" => Some(Self::Liquid),
            "METAL" => Some(Self::Metal),
            "PLASTIC" => Some(Self::Plastic),
            "ROCK" => Some(Self::Rock),
            "GLOWING_LAVA" | "LAVA" => Some(Self::GlowingLava),
            _ => None,
        }
    }
}

/// PBR-like material descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Material {
    pub class: MaterialClass,
    pub base_color: Rgba,
    /// [0, 1]
    pub roughness: f64,
    /// [0, 1]
    pub metalness: f64,
    /// [0, 1]
    pub transmission: f64,
    /// >= 0 (0 for normal surfaces, 5+ for glowing ones)
    pub emissive_intensity: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            class: MaterialClass::Plastic,
            base_color: Rgba::WHITE,
            roughness: 0.5,
            metalness: 0.0,
            transmission: 0.0,
            emissive_intensity: 0.0,
        }
    }
}

/// A solid 3D actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorDef {
    pub id: String,
    pub kind: PrimitiveKind,
    pub transform: InitialTransform,
    pub material: Material,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectKind {
    Fire,
    Smoke,
    Sparks,
    Clouds,
    Fog,
}

impl EffectKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "FIRE" => Some(Self::Fire),
            "SMOKE" => Some(Self::Smoke),
            "SPARKS" => Some(Self::Sparks),
            "CLOUDS" => Some(Self::Clouds),
            "FOG" => Some(Self::Fog),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmitterConfig {
    pub color: Rgba,
    /// [50, 1000]
    pub count: u32,
    /// [0.1, 5.0]
    pub speed: f64,
    /// [1.0, 10.0]
    pub scale: f64,
    /// [0.1, 1.0]
    pub opacity: f64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            color: Rgba::WHITE,
            count: 200,
            speed: 1.0,
            scale: 1.0,
            opacity: 0.8,
        }
    }
}

/// A particle-effect stand-in, optionally attached to an actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmitterDef {
    pub id: String,
    pub kind: EffectKind,
    pub parent_actor_id: Option<String>,
    pub config: EmitterConfig,
    /// Offset in projected pixels from the parent's placement
    pub offset: Vector3<f64>,
}

/// A 2D label bound to an actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelDef {
    pub target_actor_id: String,
    pub text: String,
    pub screen_offset: Vector2<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepDisplay {
    pub chapter_title: Option<String>,
    pub explanation: String,
    /// Context update meant for the assistant
    pub assistant_update: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    MoveTo,
    ScaleTo,
    RotateTo,
    FadeOut,
}

impl ActionKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "MOVE_TO" => Some(Self::MoveTo),
            "SCALE_TO" => Some(Self::ScaleTo),
            "ROTATE_TO" => Some(Self::RotateTo),
            "FADE_OUT" => Some(Self::FadeOut),
            _ => None,
        }
    }

    /// Whether the action needs a 3-vector target.
    pub fn takes_vector(self) -> bool {
        !matches!(self, ActionKind::FadeOut)
    }
}

/// Cosmetic easing tag; playback snaps regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    BounceOut,
    EaseInOut,
    Linear,
}

impl Easing {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "bounce_out" => Some(Self::BounceOut),
            "ease_in_out" => Some(Self::EaseInOut),
            "linear" => Some(Self::Linear),
            _ => None,
        }
    }
}

/// One actor mutation inside a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub actor_id: String,
    pub kind: ActionKind,
    /// `None` when the generator sent something that is not a 3-vector.
    /// Such actions are kept so the step stays faithful to the input, and
    /// skipped when applied.
    pub target: Option<Vector3<f64>>,
    pub easing: Option<Easing>,
}

/// One unit of timeline playback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub step_id: u32,
    /// Effective duration, always > 0
    pub duration_seconds: f64,
    pub display: StepDisplay,
    pub focus_target: Option<String>,
    pub actions: Vec<Action>,
}

impl Step {
    /// Falls back to the default for values no `Duration` can hold.
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_seconds)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_STEP_SECONDS))
    }
}

// =============================================================================
// PARSING
// =============================================================================

impl SceneDocument {
    /// Parses raw generator output.
    ///
    /// A surrounding markdown code fence is tolerated; anything that is not
    /// a JSON object after that is a hard failure.
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        let body = strip_code_fence(text);
        if body.is_empty() {
            return Err(DocumentError::Empty);
        }
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(&value)
    }

    /// Coerces an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, DocumentError> {
        let root = value.as_object().ok_or(DocumentError::NotAnObject)?;

        let actors = parse_actors(root.get("stage_assets"));
        let emitters = parse_emitters(root.get("vfx_stack"));
        let labels = parse_labels(root.get("ui_overlays"));
        let timeline = parse_timeline(root.get("sync_timeline"));

        Ok(Self {
            meta: parse_meta(root.get("meta_data")),
            visual_settings: parse_visual_settings(root.get("visual_settings")),
            assistant: parse_assistant(root.get("lab_assistant_config")),
            actors,
            emitters,
            labels,
            timeline,
        })
    }

    /// Looks up an actor definition by id.
    pub fn actor(&self, id: &str) -> Option<&ActorDef> {
        self.actors.iter().find(|actor| actor.id == id)
    }

    /// Number of timeline steps.
    pub fn step_count(&self) -> usize {
        self.timeline.len()
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_meta(value: Option<&Value>) -> MetaData {
    let defaults = MetaData::default();
    let Some(obj) = value.and_then(Value::as_object) else {
        return defaults;
    };
    MetaData {
        title: string_field(obj, "title").unwrap_or(defaults.title),
        verdict: string_field(obj, "scientific_verdict").unwrap_or_default(),
        is_remix: bool_field(obj, "is_remix").unwrap_or(false),
    }
}

fn parse_visual_settings(value: Option<&Value>) -> VisualSettings {
    let defaults = VisualSettings::default();
    let Some(obj) = value.and_then(Value::as_object) else {
        return defaults;
    };
    let post = obj.get("post_processing").and_then(Value::as_object);
    VisualSettings {
        environment_preset: string_field(obj, "environment_preset")
            .unwrap_or(defaults.environment_preset),
        bloom_intensity: post
            .and_then(|p| number_field(p, "bloom_intensity"))
            .map(|v| v.clamp(0.0, 3.0))
            .unwrap_or(defaults.bloom_intensity),
        vignette: post
            .and_then(|p| bool_field(p, "vignette"))
            .unwrap_or(defaults.vignette),
    }
}

fn parse_assistant(value: Option<&Value>) -> AssistantConfig {
    let defaults = AssistantConfig::default();
    let Some(obj) = value.and_then(Value::as_object) else {
        return defaults;
    };
    let suggested_questions = obj
        .get("suggested_questions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    AssistantConfig {
        bot_name: string_field(obj, "bot_name").unwrap_or(defaults.bot_name),
        context_brief: string_field(obj, "context_brief").unwrap_or_default(),
        suggested_questions,
    }
}

fn parse_actors(value: Option<&Value>) -> Vec<ActorDef> {
    let mut seen = HashSet::new();
    let mut actors = Vec::new();

    for (index, entry) in array_items(value).enumerate() {
        let Some(obj) = entry.as_object() else {
            warn!(index, "stage asset is not an object; dropped");
            continue;
        };
        let Some(id) = string_field(obj, "id") else {
            warn!(index, "stage asset without id; dropped");
            continue;
        };
        if !seen.insert(id.clone()) {
            warn!(%id, "duplicate stage asset id; later definition dropped");
            continue;
        }

        let kind = match string_field(obj, "type") {
            Some(raw) => PrimitiveKind::parse(&raw).unwrap_or_else(|| {
                warn!(%id, kind = %raw, "unknown primitive kind; using cube");
                PrimitiveKind::Cube
            }),
            None => PrimitiveKind::Cube,
        };

        let transform = obj
            .get("initial_transform")
            .and_then(Value::as_object)
            .map(parse_transform)
            .unwrap_or_default();

        let material = obj
            .get("pbr_material")
            .and_then(Value::as_object)
            .map(|m| parse_material(&id, m))
            .unwrap_or_default();

        actors.push(ActorDef {
            id,
            kind,
            transform,
            material,
        });
    }
    actors
}

fn parse_transform(obj: &Map<String, Value>) -> InitialTransform {
    let defaults = InitialTransform::default();
    InitialTransform {
        position: obj.get("position").and_then(vec3).unwrap_or(defaults.position),
        rotation: obj.get("rotation").and_then(vec3).unwrap_or(defaults.rotation),
        scale: obj.get("scale").and_then(vec3).unwrap_or(defaults.scale),
    }
}

fn parse_material(actor_id: &str, obj: &Map<String, Value>) -> Material {
    let defaults = Material::default();
    let class = match string_field(obj, "material_class") {
        Some(raw) => MaterialClass::parse(&raw).unwrap_or_else(|| {
            warn!(actor = actor_id, class = %raw, "unknown material class; using PLASTIC");
            defaults.class
        }),
        None => defaults.class,
    };

    Material {
        class,
        base_color: color_field(obj, "base_color").unwrap_or(defaults.base_color),
        roughness: unit_field(obj, "roughness").unwrap_or(defaults.roughness),
        metalness: unit_field(obj, "metalness").unwrap_or(defaults.metalness),
        transmission: unit_field(obj, "transmission").unwrap_or(defaults.transmission),
        emissive_intensity: number_field(obj, "emissive_intensity")
            .map(|v| v.max(0.0))
            .unwrap_or(defaults.emissive_intensity),
    }
}

fn parse_emitters(value: Option<&Value>) -> Vec<EmitterDef> {
    let mut emitters = Vec::new();

    for (index, entry) in array_items(value).enumerate() {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let id = string_field(obj, "id").unwrap_or_else(|| format!("vfx_{}", index));
        let Some(kind) = string_field(obj, "effect_type").and_then(|raw| EffectKind::parse(&raw))
        else {
            warn!(%id, "emitter with unknown effect type; dropped");
            continue;
        };

        let defaults = EmitterConfig::default();
        let config = match obj.get("config").and_then(Value::as_object) {
            Some(cfg) => EmitterConfig {
                color: color_field(cfg, "color").unwrap_or(defaults.color),
                count: number_field(cfg, "count")
                    .map(|v| v.round().clamp(50.0, 1000.0) as u32)
                    .unwrap_or(defaults.count),
                speed: number_field(cfg, "speed")
                    .map(|v| v.clamp(0.1, 5.0))
                    .unwrap_or(defaults.speed),
                scale: number_field(cfg, "scale")
                    .map(|v| v.clamp(1.0, 10.0))
                    .unwrap_or(defaults.scale),
                opacity: number_field(cfg, "opacity")
                    .map(|v| v.clamp(0.1, 1.0))
                    .unwrap_or(defaults.opacity),
            },
            None => defaults,
        };

        emitters.push(EmitterDef {
            id,
            kind,
            parent_actor_id: string_field(obj, "parent_actor_id"),
            config,
            offset: obj
                .get("position_offset")
                .and_then(vec3)
                .unwrap_or_else(Vector3::zeros),
        });
    }
    emitters
}

fn parse_labels(value: Option<&Value>) -> Vec<LabelDef> {
    array_items(value)
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let target_actor_id = string_field(obj, "target_actor_id")?;
            Some(LabelDef {
                target_actor_id,
                text: string_field(obj, "label_text").unwrap_or_default(),
                screen_offset: obj
                    .get("screen_offset")
                    .and_then(vec2)
                    .unwrap_or_else(Vector2::zeros),
            })
        })
        .collect()
}

fn parse_timeline(value: Option<&Value>) -> Vec<Step> {
    array_items(value)
        .enumerate()
        .filter_map(|(index, entry)| {
            let Some(obj) = entry.as_object() else {
                warn!(index, "timeline step is not an object; dropped");
                return None;
            };
            Some(parse_step(index, obj))
        })
        .collect()
}

fn parse_step(index: usize, obj: &Map<String, Value>) -> Step {
    let step_id = number_field(obj, "step_id")
        .filter(|v| *v >= 0.0 && *v <= u32::MAX as f64)
        .map(|v| v as u32)
        .unwrap_or(index as u32 + 1);

    let duration_seconds = number_field(obj, "duration_seconds")
        .filter(|v| *v > 0.0)
        .map(|v| {
            if v > MAX_STEP_SECONDS {
                warn!(index, duration = v, "step duration clamped");
            }
            v.min(MAX_STEP_SECONDS)
        })
        .unwrap_or(DEFAULT_STEP_SECONDS);

    let display = obj
        .get("ui_display")
        .and_then(Value::as_object)
        .map(|ui| StepDisplay {
            chapter_title: string_field(ui, "chapter_title"),
            explanation: string_field(ui, "sidebar_explanation").unwrap_or_default(),
            assistant_update: string_field(ui, "chatbot_update").unwrap_or_default(),
        })
        .unwrap_or_default();

    let events = obj.get("visual_events").and_then(Value::as_object);
    let focus_target = events.and_then(|ev| string_field(ev, "camera_focus_target"));
    let actions = events
        .map(|ev| array_items(ev.get("actions")).filter_map(parse_action).collect())
        .unwrap_or_default();

    Step {
        step_id,
        duration_seconds,
        display,
        focus_target,
        actions,
    }
}

fn parse_action(value: &Value) -> Option<Action> {
    let obj = value.as_object()?;
    let actor_id = string_field(obj, "actor_id")?;
    let Some(kind) = string_field(obj, "type").and_then(|raw| ActionKind::parse(&raw)) else {
        warn!(actor = %actor_id, "action with unknown type; dropped");
        return None;
    };
    let target = if kind.takes_vector() {
        obj.get("target_value").and_then(vec3)
    } else {
        None
    };
    Some(Action {
        actor_id,
        kind,
        target,
        easing: string_field(obj, "easing").and_then(|raw| Easing::parse(&raw)),
    })
}

// =============================================================================
// FIELD HELPERS
// =============================================================================

fn array_items(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter())
        .into_iter()
        .flatten()
}

/// Non-empty, trimmed string field.
fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let raw = obj.get(key)?.as_str()?.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Finite number, accepting numeric strings.
fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(as_number)
}

fn unit_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    number_field(obj, key).map(|v| v.clamp(0.0, 1.0))
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn color_field(obj: &Map<String, Value>, key: &str) -> Option<Rgba> {
    let raw = string_field(obj, key)?;
    let color = Rgba::parse_hex(&raw);
    if color.is_none() {
        warn!(color = %raw, "invalid hex color; using white");
    }
    color
}

fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// `[x, y, z]` or `{ "x": .., "y": .., "z": .. }` with finite components.
pub(crate) fn vec3(value: &Value) -> Option<Vector3<f64>> {
    match value {
        Value::Array(items) if items.len() == 3 => Some(Vector3::new(
            as_number(&items[0])?,
            as_number(&items[1])?,
            as_number(&items[2])?,
        )),
        Value::Object(obj) => Some(Vector3::new(
            number_field(obj, "x")?,
            number_field(obj, "y")?,
            number_field(obj, "z")?,
        )),
        _ => None,
    }
}

fn vec2(value: &Value) -> Option<Vector2<f64>> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            Some(Vector2::new(as_number(&items[0])?, as_number(&items[1])?))
        }
        Value::Object(obj) => Some(Vector2::new(
            number_field(obj, "x")?,
            number_field(obj, "y")?,
        )),
        _ => None,
    }
}
