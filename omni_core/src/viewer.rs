//! Viewer runtime - one live scene with its camera, timeline and chat.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    ViewerHandle<Ctx, G, A>                        │
//! │   generate() ──► ContentGenerator      send_chat() ──► Assistant  │
//! │        │  (lock released across awaits)        │                  │
//! │  ┌─────▼────────────────────────────────────────▼──────────────┐  │
//! │  │                Arc<Mutex<Viewer>>                            │  │
//! │  │  reactive: document, timeline, chat, loading, last_error     │  │
//! │  │  driven:   camera current pose, frame sequence               │  │
//! │  └─────▲────────────────────────────────────────────────────────┘  │
//! │        │ frame(now) every tick                                     │
//! │   FrameLoop task ──► watch::Receiver<RenderFrame>                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation takes the lock briefly, so events apply in arrival
//! order. A document swap replaces the timeline player (dropping its
//! deadline) and clears autoplay inside one critical section.

use crate::actors::ActorStore;
use crate::camera::{CameraConfig, CameraController};
use crate::chat::{ChatSession, SendOutcome};
use crate::document::SceneDocument;
use crate::error::GenerationError;
use crate::frame_loop::{self, FrameLoopHandle};
use crate::generation;
use crate::projector::{ProjectorConfig, RenderFrame, SceneProjector};
use crate::timeline::{PlaybackState, SegmentState, StepOutcome, TimelinePlayer};

use omni_env::{
    AssistantCall, ContentGenerator, ConversationalAssistant, EnvError, GenerationMode,
    GeneratorCall, OmniContext,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for a viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub projector: ProjectorConfig,

    /// Frame loop rate in Hz (default: 60)
    pub frame_rate_hz: u32,

    /// Delay between a document load and automatic playback.
    /// `None` disables autoplay.
    pub autoplay_delay_ms: Option<u64>,

    /// Prior messages sent with each chat request (default: 6)
    pub chat_history_window: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            projector: ProjectorConfig::default(),
            frame_rate_hz: 60,
            autoplay_delay_ms: Some(500),
            chat_history_window: 6,
        }
    }
}

impl ViewerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate_hz.max(1) as f64)
    }
}

/// Identifies one generation request. Only the latest one may land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Loaded,
    /// A newer request was started; the response was discarded
    Stale,
}

/// Read-only data for the presentation chrome.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackView {
    pub title: Option<String>,
    pub verdict: Option<String>,
    pub step_label: String,
    pub chapter_title: String,
    pub explanation: Option<String>,
    pub segments: Vec<SegmentState>,
    pub state: PlaybackState,
    pub mode: GenerationMode,
    pub loading: bool,
    pub last_error: Option<String>,
    pub suggestions_visible: bool,
}

pub struct Viewer {
    config: ViewerConfig,
    document: Option<Arc<SceneDocument>>,
    actors: ActorStore,
    timeline: Option<TimelinePlayer>,
    camera: CameraController,
    projector: SceneProjector,
    chat: ChatSession,
    query: String,
    mode: GenerationMode,
    loading: bool,
    last_error: Option<String>,
    tickets_issued: u64,
    active_ticket: Option<GenerationTicket>,
    autoplay_at: Option<Duration>,
    last_frame_at: Option<Duration>,
    frame_sequence: u64,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            camera: CameraController::new(config.camera.clone()),
            projector: SceneProjector::new(config.projector.clone()),
            chat: ChatSession::new(config.chat_history_window),
            config,
            document: None,
            actors: ActorStore::new(),
            timeline: None,
            query: String::new(),
            mode: GenerationMode::Standard,
            loading: false,
            last_error: None,
            tickets_issued: 0,
            active_ticket: None,
            autoplay_at: None,
            last_frame_at: None,
            frame_sequence: 0,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&Arc<SceneDocument>> {
        self.document.as_ref()
    }

    pub fn actors(&self) -> &ActorStore {
        &self.actors
    }

    pub fn timeline(&self) -> Option<&TimelinePlayer> {
        self.timeline.as_ref()
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    /// Direct access for pointer, wheel, zoom and preset input.
    pub fn camera_mut(&mut self) -> &mut CameraController {
        &mut self.camera
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: GenerationMode) {
        self.mode = mode;
    }

    pub fn toggle_mode(&mut self) -> GenerationMode {
        self.mode = self.mode.toggled();
        self.mode
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn autoplay_at(&self) -> Option<Duration> {
        self.autoplay_at
    }

    pub fn current_step(&self) -> usize {
        self.timeline.as_ref().map_or(0, TimelinePlayer::current_index)
    }

    pub fn is_playing(&self) -> bool {
        self.timeline.as_ref().is_some_and(TimelinePlayer::is_playing)
    }

    // =========================================================================
    // GENERATION
    // =========================================================================

    /// Starts a generation request.
    ///
    /// The current scene stays visible, paused at step 0, until the
    /// response lands. Any earlier request still in flight becomes stale.
    pub fn begin_generation(
        &mut self,
        query: &str,
    ) -> Result<(GenerationTicket, GeneratorCall), GenerationError> {
        let call = generation::build_generator_call(query, self.mode)?;

        self.tickets_issued += 1;
        let ticket = GenerationTicket(self.tickets_issued);
        self.active_ticket = Some(ticket);
        self.query = query.trim().to_string();
        self.loading = true;
        self.last_error = None;
        self.autoplay_at = None;
        self.chat.clear();

        if let Some(player) = self.timeline.as_mut() {
            let outcome = player.seek(0, &mut self.actors);
            self.apply_focus(outcome.iter());
        }

        debug!(ticket = ticket.0, mode = %self.mode, "generation started");
        Ok((ticket, call))
    }

    /// Lands a generation response.
    ///
    /// Failures of the active request are stored as `last_error` and
    /// returned; the previous document stays loaded.
    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        result: Result<SceneDocument, GenerationError>,
        now: Duration,
    ) -> Result<GenerationOutcome, GenerationError> {
        if self.active_ticket != Some(ticket) {
            debug!(ticket = ticket.0, "dropping stale generation response");
            return Ok(GenerationOutcome::Stale);
        }
        self.active_ticket = None;
        self.loading = false;

        match result {
            Ok(document) => {
                self.load_document(document, now);
                Ok(GenerationOutcome::Loaded)
            }
            Err(e) => {
                warn!("generation failed: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Swaps in a new document and everything derived from it.
    pub fn load_document(&mut self, document: SceneDocument, now: Duration) {
        let document = Arc::new(document);
        let mut player = TimelinePlayer::new(document.clone());
        let outcome = player.load(&mut self.actors);

        self.timeline = Some(player);
        self.apply_focus(outcome.iter());
        self.chat.reset_for(&document);
        self.autoplay_at = self
            .config
            .autoplay_delay_ms
            .map(|ms| now.saturating_add(Duration::from_millis(ms)));

        info!(
            title = %document.meta.title,
            actors = document.actors.len(),
            steps = document.timeline.len(),
            "scene loaded"
        );
        self.document = Some(document);
    }

    // =========================================================================
    // PLAYBACK
    // =========================================================================

    pub fn play(&mut self, now: Duration) {
        self.autoplay_at = None;
        if let Some(player) = self.timeline.as_mut() {
            player.play(now);
        }
    }

    pub fn pause(&mut self) {
        self.autoplay_at = None;
        if let Some(player) = self.timeline.as_mut() {
            player.pause();
        }
    }

    pub fn toggle_playback(&mut self, now: Duration) {
        self.autoplay_at = None;
        if let Some(player) = self.timeline.as_mut() {
            player.toggle(now);
        }
    }

    pub fn restart(&mut self, now: Duration) {
        self.autoplay_at = None;
        if let Some(player) = self.timeline.as_mut() {
            let outcome = player.restart(now, &mut self.actors);
            self.apply_focus(outcome.iter());
        }
    }

    pub fn seek(&mut self, index: usize) {
        self.autoplay_at = None;
        if let Some(player) = self.timeline.as_mut() {
            let outcome = player.seek(index, &mut self.actors);
            self.apply_focus(outcome.iter());
        }
    }

    /// Fires the autoplay deadline and any due step deadlines.
    pub fn poll_timers(&mut self, now: Duration) -> Vec<StepOutcome> {
        let Some(player) = self.timeline.as_mut() else {
            return Vec::new();
        };

        if let Some(at) = self.autoplay_at {
            if at <= now {
                self.autoplay_at = None;
                player.play(at);
            }
        }

        let entered = player.poll(now, &mut self.actors);
        self.apply_focus(entered.iter());
        entered
    }

    fn apply_focus<'a>(&mut self, outcomes: impl Iterator<Item = &'a StepOutcome>) {
        if let Some(focus) = outcomes.filter_map(|o| o.focus.as_ref()).last() {
            let pan = self.projector.config().pan_for(&focus.position);
            self.camera.focus(pan);
        }
    }

    // =========================================================================
    // FRAME
    // =========================================================================

    /// Runs timers, advances the camera by the time since the last frame
    /// and projects the scene.
    pub fn frame(&mut self, now: Duration) -> RenderFrame {
        self.poll_timers(now);

        let dt = self
            .last_frame_at
            .map_or(Duration::ZERO, |last| now.saturating_sub(last));
        self.last_frame_at = Some(now);
        self.camera.advance_by(dt);

        self.frame_sequence += 1;
        self.projector.project(
            self.document.as_deref(),
            &self.actors,
            self.camera.current(),
            self.frame_sequence,
            now.as_secs_f64(),
        )
    }

    pub fn frame_sequence(&self) -> u64 {
        self.frame_sequence
    }

    // =========================================================================
    // CHAT
    // =========================================================================

    pub fn begin_chat(&mut self, text: &str) -> Option<AssistantCall> {
        self.chat.begin_send(text)
    }

    pub fn complete_chat(&mut self, result: Result<String, EnvError>) -> SendOutcome {
        self.chat.complete(result)
    }

    // =========================================================================
    // VIEW
    // =========================================================================

    pub fn view(&self) -> PlaybackView {
        let meta = self.document.as_ref().map(|doc| &doc.meta);
        let timeline = self.timeline.as_ref();
        PlaybackView {
            title: meta.map(|m| m.title.clone()),
            verdict: meta.map(|m| m.verdict.clone()).filter(|v| !v.is_empty()),
            step_label: timeline.map_or_else(|| "Step 1 / -".to_string(), TimelinePlayer::step_label),
            chapter_title: timeline
                .map_or("Welcome", TimelinePlayer::chapter_title)
                .to_string(),
            explanation: timeline.and_then(TimelinePlayer::explanation).map(str::to_string),
            segments: timeline.map(TimelinePlayer::progress_segments).unwrap_or_default(),
            state: timeline.map_or(PlaybackState::Idle, TimelinePlayer::state),
            mode: self.mode,
            loading: self.loading,
            last_error: self.last_error.clone(),
            suggestions_visible: self.chat.suggestions_visible(),
        }
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

pub type SharedViewer = Arc<Mutex<Viewer>>;

/// Locks a viewer, recovering the state if a previous holder panicked.
pub fn lock_viewer(viewer: &Mutex<Viewer>) -> MutexGuard<'_, Viewer> {
    viewer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A viewer wired to its context and external services.
///
/// Generic over the context and service implementations, so the same
/// runtime runs against tokio and live services, or against the virtual
/// clock and scripted services of the simulator.
pub struct ViewerHandle<Ctx, G, A>
where
    Ctx: OmniContext,
    G: ContentGenerator,
    A: ConversationalAssistant,
{
    pub context: Arc<Ctx>,
    pub generator: Arc<G>,
    pub assistant: Arc<A>,
    viewer: SharedViewer,
}

impl<Ctx, G, A> ViewerHandle<Ctx, G, A>
where
    Ctx: OmniContext,
    G: ContentGenerator,
    A: ConversationalAssistant,
{
    pub fn new(context: Arc<Ctx>, generator: Arc<G>, assistant: Arc<A>, config: ViewerConfig) -> Self {
        Self {
            context,
            generator,
            assistant,
            viewer: Arc::new(Mutex::new(Viewer::new(config))),
        }
    }

    pub fn shared(&self) -> SharedViewer {
        self.viewer.clone()
    }

    pub fn lock(&self) -> MutexGuard<'_, Viewer> {
        lock_viewer(&self.viewer)
    }

    pub fn now(&self) -> Duration {
        self.context.now()
    }

    /// Generates and loads a new scene for `query`.
    pub async fn generate(&self, query: &str) -> Result<GenerationOutcome, GenerationError> {
        let (ticket, call) = self.lock().begin_generation(query)?;
        let result = generation::generate_document(self.generator.as_ref(), &call).await;
        let now = self.context.now();
        self.lock().finish_generation(ticket, result, now)
    }

    /// Sends a chat message; failures become a fallback reply.
    pub async fn send_chat(&self, text: &str) -> SendOutcome {
        let Some(call) = self.lock().begin_chat(text) else {
            return SendOutcome::Ignored;
        };
        let result = self.assistant.reply(&call).await;
        self.lock().complete_chat(result)
    }

    /// Renders one frame at the context's current time.
    pub fn frame(&self) -> RenderFrame {
        let now = self.context.now();
        self.lock().frame(now)
    }

    /// Spawns the frame loop for this viewer.
    pub fn start_frame_loop(&self) -> FrameLoopHandle {
        let interval = self.lock().config().frame_interval();
        frame_loop::start(self.context.clone(), self.viewer.clone(), interval)
    }
}
