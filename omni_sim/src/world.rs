//! SimWorld - The simulation harness container.
//!
//! One viewer wired to scripted services, all on the virtual clock. Frames
//! are stepped explicitly at the configured rate; service calls advance
//! the clock by their injected latency while they are awaited.

use crate::context::SimContext;
use crate::exporter::{ActorPlacement, CameraSnapshot, SimEvent, SimExport, SimFrame};
use crate::services::{ScriptedAssistant, ScriptedGenerator, SimServiceController};

use omni_core::chat::SendOutcome;
use omni_core::error::GenerationError;
use omni_core::projector::RenderFrame;
use omni_core::timeline::StepOutcome;
use omni_core::viewer::{GenerationOutcome, Viewer, ViewerConfig, ViewerHandle};
use omni_env::{OmniContext, ServiceController};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Frame rate in Hz
    pub frame_rate_hz: u32,

    /// Maximum simulation duration in seconds
    pub max_duration_secs: f64,

    /// Service latency range in milliseconds
    pub latency_ms: (u64, u64),

    /// Probability that any service call fails
    pub failure_rate: f64,

    /// Record every n-th frame when recording
    pub export_stride: u64,

    pub viewer: ViewerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            frame_rate_hz: 60,
            max_duration_secs: 10.0,
            latency_ms: (50, 400),
            failure_rate: 0.0,
            export_stride: 10,
            viewer: ViewerConfig::default(),
        }
    }
}

pub type SimGenerator = ScriptedGenerator<SimContext>;
pub type SimAssistant = ScriptedAssistant<SimContext>;
pub type SimViewerHandle = ViewerHandle<SimContext, SimGenerator, SimAssistant>;

/// Counters collected while a world runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorldStats {
    pub frames: u64,
    /// Steps entered by timers (autoplay and auto-advance)
    pub steps_entered: u64,
    pub skipped_actions: u64,
    pub documents_loaded: u64,
    pub generation_failures: u64,
    pub stale_responses: u64,
    pub chat_replies: u64,
    pub chat_fallbacks: u64,
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    handle: SimViewerHandle,
    stats: WorldStats,
    last_frame: Option<RenderFrame>,
    recording: Option<SimExport>,
    pending_events: Vec<SimEvent>,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Self {
        // Separate seeds so the services draw independent latencies
        let context_seed = config.seed;
        let generator_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let assistant_seed = config.seed.wrapping_mul(0x517cc1b727220a95);

        let context = SimContext::shared(context_seed);

        let generator_controller = SimServiceController::new(generator_seed);
        let assistant_controller = SimServiceController::new(assistant_seed);
        for controller in [&generator_controller, &assistant_controller] {
            controller.set_latency_ms(config.latency_ms.0, config.latency_ms.1);
            controller.set_failure_rate(config.failure_rate);
        }

        let generator = Arc::new(ScriptedGenerator::new(context.clone(), generator_controller));
        let assistant = Arc::new(ScriptedAssistant::new(context.clone(), assistant_controller));
        let handle = ViewerHandle::new(context.clone(), generator, assistant, config.viewer.clone());

        Self {
            config,
            context,
            handle,
            stats: WorldStats::default(),
            last_frame: None,
            recording: None,
            pending_events: Vec::new(),
        }
    }

    pub fn handle(&self) -> &SimViewerHandle {
        &self.handle
    }

    pub fn generator(&self) -> &SimGenerator {
        &self.handle.generator
    }

    pub fn assistant(&self) -> &SimAssistant {
        &self.handle.assistant
    }

    /// Locks the viewer for direct input (camera, playback controls).
    pub fn viewer(&self) -> MutexGuard<'_, Viewer> {
        self.handle.lock()
    }

    pub fn stats(&self) -> &WorldStats {
        &self.stats
    }

    pub fn last_frame(&self) -> Option<&RenderFrame> {
        self.last_frame.as_ref()
    }

    /// Returns the current simulation time.
    pub fn now(&self) -> Duration {
        self.context.now()
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.now().as_secs_f64()
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.frame_rate_hz.max(1) as f64)
    }

    // =========================================================================
    // STEPPING
    // =========================================================================

    /// Advances the clock by one frame interval and renders.
    pub fn step_frame(&mut self) -> Vec<StepOutcome> {
        self.context.advance_time(self.frame_interval());
        let now = self.now();

        let (entered, frame) = {
            let mut viewer = self.handle.lock();
            let entered = viewer.poll_timers(now);
            let frame = viewer.frame(now);
            (entered, frame)
        };

        self.stats.frames += 1;
        self.stats.steps_entered += entered.len() as u64;
        for outcome in &entered {
            self.stats.skipped_actions += outcome.skipped as u64;
            self.note(SimEvent::info(
                now.as_secs_f64(),
                format!("entered step {} ({} applied, {} skipped)", outcome.index + 1, outcome.applied, outcome.skipped),
            ));
        }

        if self.stats.frames % self.config.export_stride.max(1) == 0 {
            self.record(&frame);
        }
        self.last_frame = Some(frame);
        entered
    }

    /// Steps frames for `secs` of simulated time. Returns the frames rendered.
    pub fn run_for(&mut self, secs: f64) -> u64 {
        let frames = (secs.max(0.0) * self.config.frame_rate_hz.max(1) as f64).round() as u64;
        for _ in 0..frames {
            self.step_frame();
        }
        frames
    }

    /// Steps frames until `done` holds or `max_secs` of simulated time pass.
    pub fn run_until(&mut self, max_secs: f64, mut done: impl FnMut(&Viewer) -> bool) -> bool {
        let deadline = self.now() + Duration::from_secs_f64(max_secs.max(0.0));
        loop {
            if done(&self.handle.lock()) {
                return true;
            }
            if self.now() >= deadline {
                return false;
            }
            self.step_frame();
        }
    }

    // =========================================================================
    // SERVICES
    // =========================================================================

    /// Generates a scene through the scripted generator.
    pub async fn generate(&mut self, query: &str) -> Result<GenerationOutcome, GenerationError> {
        let result = self.handle.generate(query).await;
        self.tally_generation(query, &result);
        result
    }

    /// Issues two overlapping generation requests; `second` starts while
    /// `first` is still in flight.
    pub async fn generate_overlapping(
        &mut self,
        first: &str,
        second: &str,
    ) -> (
        Result<GenerationOutcome, GenerationError>,
        Result<GenerationOutcome, GenerationError>,
    ) {
        let handle = &self.handle;
        let (a, b) = tokio::join!(handle.generate(first), handle.generate(second));
        self.tally_generation(first, &a);
        self.tally_generation(second, &b);
        (a, b)
    }

    pub async fn chat(&mut self, text: &str) -> SendOutcome {
        let outcome = self.handle.send_chat(text).await;
        match outcome {
            SendOutcome::Replied => self.stats.chat_replies += 1,
            SendOutcome::Fallback => self.stats.chat_fallbacks += 1,
            SendOutcome::Ignored => {}
        }
        debug!(?outcome, "chat");
        outcome
    }

    fn tally_generation(&mut self, query: &str, result: &Result<GenerationOutcome, GenerationError>) {
        let time = self.time();
        let event = match result {
            Ok(GenerationOutcome::Loaded) => {
                self.stats.documents_loaded += 1;
                SimEvent::info(time, format!("loaded scene for \"{}\"", query))
            }
            Ok(GenerationOutcome::Stale) => {
                self.stats.stale_responses += 1;
                SimEvent::info(time, format!("dropped stale response for \"{}\"", query))
            }
            Err(e) => {
                self.stats.generation_failures += 1;
                SimEvent::warn(time, format!("generation for \"{}\" failed: {}", query, e))
            }
        };
        self.note(event);
    }

    // =========================================================================
    // RECORDING
    // =========================================================================

    /// Starts sampling frames into an export.
    pub fn start_recording(&mut self, scenario: &str) {
        self.recording = Some(SimExport::new(scenario, self.config.seed));
        self.pending_events.clear();
    }

    /// Ends the recording, flushing events that never reached a sample.
    pub fn take_recording(&mut self) -> Option<SimExport> {
        let mut export = self.recording.take()?;
        if let Some(last) = export.frames.last_mut() {
            last.events.append(&mut self.pending_events);
        }
        export.document_title = self
            .handle
            .lock()
            .document()
            .map(|doc| doc.meta.title.clone());
        Some(export)
    }

    /// Adds a scenario event to the recording.
    pub fn note(&mut self, event: SimEvent) {
        if self.recording.is_some() {
            self.pending_events.push(event);
        }
    }

    fn record(&mut self, frame: &RenderFrame) {
        let Some(export) = self.recording.as_mut() else {
            return;
        };
        let viewer = self.handle.lock();
        let actors = frame
            .actors
            .iter()
            .filter_map(|render| {
                viewer
                    .actors()
                    .get(&render.id)
                    .map(|state| ActorPlacement::new(render, state))
            })
            .collect();

        export.add_frame(SimFrame {
            time_sec: frame.time_secs,
            sequence: frame.sequence,
            step: viewer.current_step(),
            playing: viewer.is_playing(),
            camera: CameraSnapshot::from(&frame.camera),
            actors,
            events: std::mem::take(&mut self.pending_events),
        });
    }
}
