//! Scenario runner - drives a SimWorld through each scenario and checks
//! the runtime's guarantees along the way.

use crate::exporter::{SimEvent, SimExport};
use crate::fixtures;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld, WorldStats};

use nalgebra::Vector3;
use omni_core::camera::{CameraPose, ViewPreset, ZoomDirection};
use omni_core::chat::{SendOutcome, EMPTY_REPLY, SIGNAL_LOST};
use omni_core::document::{PrimitiveKind, SceneDocument};
use omni_core::error::{DocumentError, GenerationError};
use omni_core::viewer::{GenerationOutcome, ViewerConfig};
use omni_env::{EnvError, ServiceController};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all checks
    pub passed: bool,

    /// Total frames rendered
    pub total_frames: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    #[serde(flatten)]
    pub world: WorldStats,

    /// Calls that reached the scripted generator
    pub generator_calls: usize,

    /// Calls that reached the scripted assistant
    pub assistant_calls: usize,
}

impl ScenarioMetrics {
    fn collect(world: &SimWorld) -> Self {
        Self {
            world: world.stats().clone(),
            generator_calls: world.generator().call_count(),
            assistant_calls: world.assistant().calls().len(),
        }
    }
}

/// Failed expectations of one run.
#[derive(Debug, Default)]
struct Checks {
    failures: Vec<String>,
}

impl Checks {
    fn check(&mut self, ok: bool, what: impl Into<String>) {
        if !ok {
            let what = what.into();
            warn!("check failed: {}", what);
            self.failures.push(what);
        }
    }

    fn close(&mut self, actual: f64, expected: f64, tolerance: f64, what: &str) {
        self.check(
            (actual - expected).abs() <= tolerance,
            format!("{}: expected {:.4}, got {:.4}", what, expected, actual),
        );
    }

    fn vector(&mut self, actual: Option<Vector3<f64>>, expected: Vector3<f64>, what: &str) {
        let ok = actual.is_some_and(|v| (v - expected).norm() < 1e-9);
        self.check(ok, format!("{}: expected {:?}, got {:?}", what, expected, actual));
    }

    fn reason(&self) -> Option<String> {
        (!self.failures.is_empty()).then(|| self.failures.join("; "))
    }
}

fn position(world: &SimWorld, id: &str) -> Option<Vector3<f64>> {
    world.viewer().actors().get(id).map(|state| state.position)
}

fn within_bounds(pose: &CameraPose, zoom_min: f64, zoom_max: f64) -> bool {
    pose.pitch.is_finite()
        && pose.yaw.is_finite()
        && (-90.0..=90.0).contains(&pose.pitch)
        && (zoom_min..=zoom_max).contains(&pose.zoom)
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Frame rate in Hz
    frame_rate_hz: u32,

    /// Length of the open-ended phases (input storm, soak) in seconds
    max_duration_secs: f64,

    /// Service latency range
    latency_ms: (u64, u64),

    viewer: ViewerConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        let defaults = SimConfig::default();
        Self {
            seed,
            frame_rate_hz: defaults.frame_rate_hz,
            max_duration_secs: defaults.max_duration_secs,
            latency_ms: defaults.latency_ms,
            viewer: defaults.viewer,
        }
    }

    /// Takes rate, duration, latency and viewer settings from a config.
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            seed: config.seed,
            frame_rate_hz: config.frame_rate_hz,
            max_duration_secs: config.max_duration_secs,
            latency_ms: config.latency_ms,
            viewer: config.viewer.clone(),
        }
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the frame rate.
    pub fn with_frame_rate(mut self, hz: u32) -> Self {
        self.frame_rate_hz = hz.max(1);
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    pub fn with_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.latency_ms = (min_ms, max_ms);
        self
    }

    fn sim_config(&self) -> SimConfig {
        SimConfig {
            seed: self.seed,
            frame_rate_hz: self.frame_rate_hz,
            max_duration_secs: self.max_duration_secs,
            latency_ms: self.latency_ms,
            // Faults are injected by the scenarios themselves
            failure_rate: 0.0,
            viewer: self.viewer.clone(),
            ..SimConfig::default()
        }
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, false).0
    }

    /// Runs a scenario while recording sampled frames.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let (result, export) = self.execute(scenario, true);
        let mut export = export.unwrap_or_else(|| SimExport::new(scenario.name(), self.seed));
        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }

    fn execute(&self, scenario: ScenarioId, record: bool) -> (ScenarioResult, Option<SimExport>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut world = SimWorld::new(self.sim_config());
        if record {
            world.start_recording(scenario.name());
        }

        let mut checks = Checks::default();
        match tokio::runtime::Builder::new_current_thread().build() {
            Ok(runtime) => runtime.block_on(self.drive(scenario, &mut world, &mut checks)),
            Err(e) => checks.check(false, format!("failed to build runtime: {}", e)),
        }

        let failure_reason = checks.reason();
        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            total_frames: world.stats().frames,
            final_time_secs: world.time(),
            failure_reason,
            metrics: ScenarioMetrics::collect(&world),
        };
        debug!(metrics = ?result.metrics, "scenario finished");
        (result, world.take_recording())
    }

    async fn drive(&self, scenario: ScenarioId, world: &mut SimWorld, checks: &mut Checks) {
        match scenario {
            ScenarioId::SolarSystem => self.run_solar_system(world, checks).await,
            ScenarioId::MidSwap => self.run_mid_swap(world, checks).await,
            ScenarioId::CameraStorm => self.run_camera_storm(world, checks).await,
            ScenarioId::MalformedDocument => self.run_malformed_document(world, checks).await,
            ScenarioId::EmptyTimeline => self.run_empty_timeline(world, checks).await,
            ScenarioId::ChatOutage => self.run_chat_outage(world, checks).await,
            ScenarioId::GenerationFailure => self.run_generation_failure(world, checks).await,
            ScenarioId::StaleGeneration => self.run_stale_generation(world, checks).await,
        }
    }

    /// Loads `response` through the scripted generator.
    async fn load(&self, world: &mut SimWorld, checks: &mut Checks, response: &str, query: &str) {
        world.generator().push_response(response);
        let outcome = world.generate(query).await;
        checks.check(
            matches!(outcome, Ok(GenerationOutcome::Loaded)),
            format!("loading \"{}\" did not land: {:?}", query, outcome),
        );
    }

    /// SIM-001: generate, autoplay to the end, restart and seek.
    async fn run_solar_system(&self, world: &mut SimWorld, checks: &mut Checks) {
        info!("SIM-001: SolarSystem - end-to-end playback");
        self.load(world, checks, fixtures::SOLAR_SYSTEM, "How does the earth orbit the sun?")
            .await;
        let loaded_at = world.time();
        let frame_secs = world.frame_interval().as_secs_f64();

        {
            let viewer = world.viewer();
            let view = viewer.view();
            checks.check(view.title.as_deref() == Some("The Inner Solar System"), "title");
            checks.check(view.step_label == "Step 1 / 4", format!("step label {}", view.step_label));
            checks.check(view.chapter_title == "The Sun", format!("chapter {}", view.chapter_title));
            checks.check(view.suggestions_visible, "suggestions hidden after load");
            checks.check(viewer.chat().messages().len() == 1, "greeting missing");
            checks.check(!viewer.is_playing(), "playing before the autoplay delay");
            checks.close(viewer.camera().target().pan.x, 0.0, 1e-9, "sun focus pan");
        }

        // Autoplay after 0.5 s, step 0 lasts 2 s.
        checks.check(
            world.run_until(5.0, |v| v.current_step() >= 1),
            "step 2 never entered",
        );
        let entered_after = world.time() - loaded_at;
        checks.check(
            entered_after >= 2.5 - 1e-9 && entered_after <= 2.5 + frame_secs + 1e-6,
            format!("step 2 entered after {:.3}s, expected 2.5s", entered_after),
        );
        checks.vector(position(world, "earth"), Vector3::new(0.0, 0.0, 4.0), "earth after step 2");

        let finished = world.run_until(15.0, |v| v.current_step() == 3 && !v.is_playing());
        checks.check(finished, "timeline did not finish");
        checks.check(
            world.stats().steps_entered == 3,
            format!("{} steps entered by timers, expected 3", world.stats().steps_entered),
        );
        checks.vector(position(world, "earth"), Vector3::new(-4.0, 0.0, 0.0), "earth at the end");
        {
            let viewer = world.viewer();
            let earth = viewer.actors().get("earth").map(|s| s.rotation.y);
            checks.check(earth == Some(180.0), format!("earth rotation {:?}", earth));
            let probe = viewer.actors().get("probe").map(|s| s.opacity);
            checks.check(probe == Some(0.0), format!("probe opacity {:?}", probe));
            // Last focus is the earth at x = -4.
            checks.close(viewer.camera().target().pan.x, 200.0, 1e-9, "earth focus pan");
        }

        world.run_for(2.0);
        checks.close(world.viewer().camera().current().pan.x, 200.0, 0.5, "camera settled on earth");

        {
            let now = world.now();
            let mut viewer = world.viewer();
            viewer.restart(now);
            checks.check(viewer.current_step() == 0 && viewer.is_playing(), "restart did not play from step 1");
            let earth = viewer.actors().get("earth").map(|s| s.position);
            checks.check(earth == Some(Vector3::new(4.0, 0.0, 0.0)), "restart did not restore the earth");
            let probe = viewer.actors().get("probe").map(|s| s.opacity);
            checks.check(probe == Some(1.0), "restart did not restore the probe");

            viewer.seek(99);
            checks.check(viewer.current_step() == 3, "seek past the end did not clamp");
            checks.check(!viewer.is_playing(), "seek left playback running");
        }
        checks.vector(position(world, "earth"), Vector3::new(-4.0, 0.0, 0.0), "earth after seek");

        world.run_for(self.max_duration_secs);
        let actors = world.last_frame().map_or(0, |f| f.actors.len());
        checks.check(actors == 4, format!("{} actors rendered, expected 4", actors));
    }

    /// SIM-002: a new document lands while the old one is playing.
    async fn run_mid_swap(&self, world: &mut SimWorld, checks: &mut Checks) {
        info!("SIM-002: MidSwap - document replaced mid-playback");
        self.load(world, checks, fixtures::SOLAR_SYSTEM, "solar system").await;
        checks.check(world.run_until(5.0, |v| v.current_step() == 1), "old scene never reached step 2");
        world.run_for(1.0);
        checks.check(world.viewer().is_playing(), "old scene stopped playing");

        let entered_before = world.stats().steps_entered;
        self.load(world, checks, fixtures::VOLCANO, "volcano").await;
        {
            let viewer = world.viewer();
            let view = viewer.view();
            checks.check(view.title.as_deref() == Some("Shield Volcano Eruption"), "new title");
            checks.check(view.chapter_title == "Pressure Builds", format!("chapter {}", view.chapter_title));
            checks.check(viewer.current_step() == 0 && !viewer.is_playing(), "swap did not reset playback");
            checks.check(!viewer.actors().contains("earth"), "old actors survived the swap");
            checks.check(viewer.actors().len() == 3, "new actors not seeded");
            let greeting = viewer.chat().messages().first().map(|m| m.text.clone()).unwrap_or_default();
            checks.check(greeting.contains("Shield Volcano Eruption"), "chat not reset for the new scene");
        }

        // The old step deadline would have fired here.
        world.run_for(0.4);
        checks.check(world.stats().steps_entered == entered_before, "old timer fired after the swap");
        checks.check(world.viewer().current_step() == 0, "new scene advanced early");

        let end = world.time() + 10.0;
        let mut max_index = 0;
        while world.time() < end {
            for outcome in world.step_frame() {
                max_index = max_index.max(outcome.index);
            }
        }
        checks.check(max_index <= 2, format!("entered step index {} of a 3-step scene", max_index));
        {
            let viewer = world.viewer();
            checks.check(viewer.current_step() == 2 && !viewer.is_playing(), "new scene did not finish");
            let magma = viewer.actors().get("magma").map(|s| s.scale);
            checks.check(magma == Some(Vector3::new(2.0, 3.0, 2.0)), format!("magma scale {:?}", magma));
        }
    }

    /// SIM-003: seeded random input, clamps hold and presets converge.
    async fn run_camera_storm(&self, world: &mut SimWorld, checks: &mut Checks) {
        info!("SIM-003: CameraStorm - extreme camera input");
        self.load(world, checks, fixtures::SOLAR_SYSTEM, "solar system").await;

        let config = world.viewer().camera().config().clone();
        let (zoom_min, zoom_max) = (config.zoom_min, config.zoom_max);
        let frames = (self.max_duration_secs.max(0.0) * self.frame_rate_hz as f64) as u64;
        let presets = ViewPreset::all();
        let mut violations = 0u64;

        for _ in 0..frames {
            let (action, a, b) = world.context.with_rng(|rng| {
                (
                    rng.gen_range(0..6u32),
                    rng.gen_range(-2000.0..2000.0),
                    rng.gen_range(-1e5..1e5),
                )
            });
            {
                let mut viewer = world.viewer();
                let camera = viewer.camera_mut();
                match action {
                    0 => camera.pointer_down(a, a * 0.5),
                    1 => camera.pointer_move(a, b / 50.0),
                    2 => camera.pointer_up(),
                    3 => camera.on_wheel(b),
                    4 => camera.zoom_by(if a > 0.0 { ZoomDirection::In } else { ZoomDirection::Out }),
                    _ => camera.set_target_view(presets[(a.abs() as usize) % presets.len()]),
                }
                if !within_bounds(&camera.target(), zoom_min, zoom_max) {
                    violations += 1;
                }
            }
            world.step_frame();
            if !within_bounds(&world.viewer().camera().current(), zoom_min, zoom_max) {
                violations += 1;
            }
        }
        checks.check(violations == 0, format!("{} camera bound violations", violations));

        // TOP converges without overshoot.
        {
            let mut viewer = world.viewer();
            viewer.camera_mut().pointer_up();
            viewer.camera_mut().set_target_view(ViewPreset::Top);
        }
        let (top_pitch, _, top_zoom) = ViewPreset::Top.pose();
        let start = world.viewer().camera().current();
        let (pitch_side, zoom_side) = (start.pitch - top_pitch, start.zoom - top_zoom);
        let mut overshoot = false;
        let settle = (5.0 * self.frame_rate_hz as f64) as u64;
        for _ in 0..settle {
            world.step_frame();
            let current = world.viewer().camera().current();
            overshoot |= (current.pitch - top_pitch) * pitch_side < 0.0;
            overshoot |= (current.zoom - top_zoom) * zoom_side < 0.0;
        }
        checks.check(!overshoot, "TOP preset overshot its target");
        let current = world.viewer().camera().current();
        checks.close(current.pitch, top_pitch, 0.5, "TOP pitch");
        checks.close(current.yaw, 0.0, 0.5, "TOP yaw");
        checks.close(current.zoom, top_zoom, 0.5, "TOP zoom");

        // Twenty zoom-ins from the reset pose stop at the near limit.
        {
            let mut viewer = world.viewer();
            let camera = viewer.camera_mut();
            camera.set_target_view(ViewPreset::Reset);
            for _ in 0..20 {
                camera.zoom_by(ZoomDirection::In);
            }
            checks.check(camera.target().zoom == zoom_max, format!("zoom target {}", camera.target().zoom));
        }
        world.run_for(5.0);
        checks.close(world.viewer().camera().current().zoom, zoom_max, 0.5, "zoom converged to the limit");
    }

    /// SIM-004: coercion of bad values and unparseable responses.
    async fn run_malformed_document(&self, world: &mut SimWorld, checks: &mut Checks) {
        info!("SIM-004: MalformedDocument - boundary coercion");
        self.load(world, checks, fixtures::MALFORMED, "asteroid").await;

        {
            let viewer = world.viewer();
            match viewer.document() {
                Some(doc) => {
                    checks.check(doc.meta.title == "Untitled Simulation", "default title");
                    checks.check(doc.actors.len() == 1, format!("{} actors kept, expected 1", doc.actors.len()));
                    checks.check(
                        doc.actors.first().map(|a| a.kind) == Some(PrimitiveKind::Cube),
                        "unknown primitive kind not coerced to a cube",
                    );
                    let durations: Vec<f64> = doc.timeline.iter().map(|s| s.duration_seconds).collect();
                    checks.check(durations == vec![2.0, 1.5], format!("step durations {:?}", durations));
                    checks.check(doc.emitters.len() == 1, "unknown effect type not dropped");
                    checks.check(
                        doc.emitters.first().map(|e| e.config.count) == Some(1000),
                        "emitter count not clamped",
                    );
                }
                None => checks.check(false, "malformed document not loaded"),
            }
            let rock = viewer.actors().get("rock").copied();
            checks.check(
                rock.map(|s| s.position) == Some(Vector3::new(1.0, 2.0, 3.0)),
                format!("rock position {:?}", rock.map(|s| s.position)),
            );
            // Only the well-formed SCALE_TO of step 1 applies.
            checks.check(
                rock.map(|s| s.scale) == Some(Vector3::new(2.0, 2.0, 2.0)),
                format!("rock scale {:?}", rock.map(|s| s.scale)),
            );
        }

        world.step_frame();
        let labels = world.last_frame().map_or(usize::MAX, |f| f.labels.len());
        checks.check(labels == 0, "label for a missing actor was rendered");

        checks.check(
            world.run_until(10.0, |v| v.current_step() == 1 && !v.is_playing()),
            "malformed timeline did not finish",
        );
        {
            let viewer = world.viewer();
            let opacity = viewer.actors().get("rock").map(|s| s.opacity);
            checks.check(opacity == Some(0.0), format!("rock opacity {:?}", opacity));
            let pan = viewer.camera().target().pan;
            checks.check(pan.x == -50.0 && pan.y == 100.0, format!("rock focus pan {:?}", pan));
        }

        let failures: [(&str, fn(&DocumentError) -> bool); 3] = [
            ("this is not json", |e| matches!(e, DocumentError::Malformed(_))),
            ("```json\n```", |e| matches!(e, DocumentError::Empty)),
            ("[1, 2, 3]", |e| matches!(e, DocumentError::NotAnObject)),
        ];
        for (response, expected) in failures {
            world.generator().push_response(response);
            let result = world.generate("broken").await;
            let ok = matches!(&result, Err(GenerationError::Document(e)) if expected(e));
            checks.check(ok, format!("response {:?} gave {:?}", response, result));
            let viewer = world.viewer();
            checks.check(viewer.last_error().is_some(), "parse failure not surfaced");
            checks.check(
                viewer.document().is_some_and(|d| d.meta.title == "Untitled Simulation"),
                "parse failure replaced the loaded scene",
            );
        }
    }

    /// SIM-005: a document without steps.
    async fn run_empty_timeline(&self, world: &mut SimWorld, checks: &mut Checks) {
        info!("SIM-005: EmptyTimeline - placeholders and no-op playback");
        self.load(world, checks, fixtures::EMPTY_TIMELINE, "still life").await;

        {
            let view = world.viewer().view();
            checks.check(view.step_label == "Step 1 / -", format!("step label {}", view.step_label));
            checks.check(view.chapter_title == "Simulation Ready", format!("chapter {}", view.chapter_title));
            checks.check(view.segments.is_empty(), "progress segments for an empty timeline");
            checks.check(view.explanation.is_none(), "explanation for an empty timeline");
        }

        world.run_for(2.0);
        checks.check(!world.viewer().is_playing(), "autoplay started an empty timeline");
        checks.check(world.stats().steps_entered == 0, "steps entered on an empty timeline");

        {
            let now = world.now();
            let mut viewer = world.viewer();
            viewer.play(now);
            checks.check(!viewer.is_playing(), "play started an empty timeline");
            viewer.seek(5);
            viewer.restart(now);
            checks.check(viewer.current_step() == 0 && !viewer.is_playing(), "seek/restart moved an empty timeline");
        }

        world.run_for(self.max_duration_secs.min(5.0));
        let actors = world.last_frame().map_or(0, |f| f.actors.len());
        checks.check(actors == 2, format!("{} actors rendered, expected 2", actors));
    }

    /// SIM-006: assistant failures, empty replies and overlapping sends.
    async fn run_chat_outage(&self, world: &mut SimWorld, checks: &mut Checks) {
        info!("SIM-006: ChatOutage - fallback replies and single flight");
        self.load(world, checks, fixtures::SOLAR_SYSTEM, "solar system").await;

        world.assistant().controller().fail_next(1);
        let outcome = world.chat("Why doesn't the earth fall into the sun?").await;
        checks.check(outcome == SendOutcome::Fallback, format!("outage gave {:?}", outcome));
        checks.check(self.last_reply(world).as_deref() == Some(SIGNAL_LOST), "fallback text");

        world.assistant().push_reply("   ");
        let outcome = world.chat("How long is one orbit?").await;
        checks.check(outcome == SendOutcome::Replied, format!("empty reply gave {:?}", outcome));
        checks.check(self.last_reply(world).as_deref() == Some(EMPTY_REPLY), "empty reply text");

        world.assistant().push_reply("It is always falling, but it keeps missing.");
        world.chat("So why does it keep going?").await;
        let calls = world.assistant().calls();
        let history = calls.last().map(|c| c.history.clone()).unwrap_or_default();
        checks.check(history.len() == 5, format!("history of {} messages, expected 5", history.len()));
        checks.check(
            history.last().map(|m| m.text.as_str()) == Some(EMPTY_REPLY),
            "history includes the new message",
        );

        {
            let mut viewer = world.viewer();
            let first = viewer.begin_chat("And the moon?");
            let second = viewer.begin_chat("Hello?");
            checks.check(first.is_some() && second.is_none(), "second send accepted while pending");
            checks.check(viewer.chat().is_pending(), "send not pending");
            checks.check(!viewer.chat().suggestions_visible(), "suggestions shown while pending");
            viewer.complete_chat(Ok("The moon orbits the earth.".to_string()));
        }

        world.chat("What about Mars?").await;
        let window = world.viewer().config().chat_history_window;
        let history_len = world.assistant().calls().last().map_or(0, |c| c.history.len());
        checks.check(history_len == window, format!("history of {}, expected {}", history_len, window));

        world.assistant().controller().set_failure_rate(1.0);
        checks.check(world.chat("Is anyone there?").await == SendOutcome::Fallback, "failure rate ignored");
        world.assistant().controller().heal_all();
        checks.check(world.chat("   ").await == SendOutcome::Ignored, "blank message sent");

        let messages = world.viewer().chat().messages().len();
        checks.check(messages == 13, format!("{} chat messages, expected 13", messages));
        checks.check(world.stats().chat_fallbacks == 2, "fallback count");
        checks.check(!world.viewer().chat().suggestions_visible(), "suggestions shown in a long chat");
        world.note(SimEvent::info(world.time(), "chat outage healed"));
    }

    fn last_reply(&self, world: &SimWorld) -> Option<String> {
        world.viewer().chat().messages().last().map(|m| m.text.clone())
    }

    /// SIM-007: generator failures keep the previous scene.
    async fn run_generation_failure(&self, world: &mut SimWorld, checks: &mut Checks) {
        info!("SIM-007: GenerationFailure - errors surface, scene survives");
        self.load(world, checks, fixtures::SOLAR_SYSTEM, "solar system").await;
        world.run_for(3.0);

        world.generator().controller().fail_next(1);
        let result = world.generate("volcano").await;
        checks.check(matches!(result, Err(GenerationError::Service(_))), format!("outage gave {:?}", result));
        {
            let viewer = world.viewer();
            checks.check(
                viewer.document().is_some_and(|d| d.meta.title == "The Inner Solar System"),
                "failed generation replaced the scene",
            );
            checks.check(viewer.last_error().is_some(), "failure not surfaced");
            checks.check(!viewer.is_loading(), "still loading after failure");
            checks.check(viewer.current_step() == 0 && !viewer.is_playing(), "scene not rewound while loading");
        }

        let calls = world.generator().call_count();
        let result = world.generate("   ").await;
        checks.check(matches!(result, Err(GenerationError::EmptyQuery)), "blank query accepted");
        checks.check(world.generator().call_count() == calls, "blank query reached the generator");

        let result = world.generate("glacier").await;
        checks.check(
            matches!(result, Err(GenerationError::Service(EnvError::EmptyResponse(_)))),
            format!("empty response gave {:?}", result),
        );

        self.load(world, checks, fixtures::VOLCANO, "volcano").await;
        checks.check(world.viewer().last_error().is_none(), "error survived a successful load");
        checks.check(world.stats().generation_failures == 3, "failure count");
    }

    /// SIM-008: overlapping generations, only the latest may land.
    async fn run_stale_generation(&self, world: &mut SimWorld, checks: &mut Checks) {
        info!("SIM-008: StaleGeneration - latest request wins");
        world.generator().push_response(fixtures::SOLAR_SYSTEM);
        world.generator().push_response(fixtures::VOLCANO);

        let (first, second) = world.generate_overlapping("solar system", "volcano").await;
        checks.check(matches!(first, Ok(GenerationOutcome::Stale)), format!("first request gave {:?}", first));
        checks.check(matches!(second, Ok(GenerationOutcome::Loaded)), format!("second request gave {:?}", second));
        checks.check(!world.viewer().is_loading(), "still loading");
        checks.check(world.stats().documents_loaded == 1, "stale response loaded");

        // Responses arriving out of order.
        let now = world.now();
        let mut viewer = world.viewer();
        let (Ok((older, _)), Ok((newer, _))) =
            (viewer.begin_generation("glacier"), viewer.begin_generation("desert"))
        else {
            checks.check(false, "generation rejected a valid query");
            return;
        };
        let still = SceneDocument::from_json(fixtures::EMPTY_TIMELINE).map_err(GenerationError::from);
        let solar = SceneDocument::from_json(fixtures::SOLAR_SYSTEM).map_err(GenerationError::from);

        let landed = viewer.finish_generation(newer, still, now);
        checks.check(matches!(landed, Ok(GenerationOutcome::Loaded)), "newer response rejected");
        let late = viewer.finish_generation(older, solar, now);
        checks.check(matches!(late, Ok(GenerationOutcome::Stale)), "late response not dropped");
        checks.check(
            viewer.document().is_some_and(|d| d.meta.title == "Still Life"),
            "late response replaced the newer scene",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(42).with_duration(2.0);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} failed: {}",
                scenario,
                result.failure_reason.unwrap_or_default()
            );
        }
    }

    #[test]
    fn test_scenarios_pass_across_seeds() {
        for seed in [1, 7, 1234, u64::MAX] {
            let runner = ScenarioRunner::new(seed).with_duration(1.0);
            for scenario in [ScenarioId::CameraStorm, ScenarioId::StaleGeneration] {
                let result = runner.run(scenario);
                assert!(result.passed, "{} seed={}: {:?}", scenario, seed, result.failure_reason);
            }
        }
    }

    #[test]
    fn test_determinism() {
        let runner = ScenarioRunner::new(99).with_duration(1.0);
        let a = runner.run(ScenarioId::SolarSystem);
        let b = runner.run(ScenarioId::SolarSystem);

        assert_eq!(a.final_time_secs, b.final_time_secs);
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.total_frames, b.total_frames);
    }

    #[test]
    fn test_run_with_export() {
        let runner = ScenarioRunner::new(5).with_duration(1.0);
        let (result, export) = runner.run_with_export(ScenarioId::MidSwap);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(export.passed);
        assert_eq!(export.scenario, "mid_swap");
        assert!(!export.frames.is_empty());
        assert_eq!(export.document_title.as_deref(), Some("Shield Volcano Eruption"));
    }

    #[test]
    fn test_from_config() {
        let config = SimConfig {
            seed: 3,
            frame_rate_hz: 30,
            ..SimConfig::default()
        };
        let result = ScenarioRunner::from_config(&config).run(ScenarioId::EmptyTimeline);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.seed, 3);
    }
}
