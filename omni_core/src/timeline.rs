//! Timeline Player - step-indexed playback over a Scene Document.
//!
//! The player is a two-state machine (`Idle`, `Playing`) over a step index.
//! Auto-advance is an explicit deadline on the caller's clock: the owner
//! calls [`TimelinePlayer::poll`] with the current time and the player
//! enters every step whose deadline has passed. Deadlines are chained
//! (`next = previous + duration`), so a late poll catches up exactly.
//!
//! The player never touches the camera. Entering a step returns a
//! [`StepOutcome`] whose optional [`CameraFocus`] the owner forwards.

use crate::actors::{ActionOutcome, ActorStore};
use crate::document::{SceneDocument, Step};

use nalgebra::Vector3;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Request to center the camera on an actor.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFocus {
    pub actor_id: String,
    /// Actor position after the step's actions were applied
    pub position: Vector3<f64>,
}

/// What happened when a step was entered.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub index: usize,
    pub applied: usize,
    pub skipped: usize,
    pub focus: Option<CameraFocus>,
}

/// One cell of the segmented progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentState {
    Completed,
    Current,
    Upcoming,
}

pub struct TimelinePlayer {
    document: Arc<SceneDocument>,
    current: usize,
    state: PlaybackState,
    /// When the current step ends, while playing
    deadline: Option<Duration>,
}

impl TimelinePlayer {
    pub fn new(document: Arc<SceneDocument>) -> Self {
        Self {
            document,
            current: 0,
            state: PlaybackState::Idle,
            deadline: None,
        }
    }

    pub fn document(&self) -> &Arc<SceneDocument> {
        &self.document
    }

    pub fn len(&self) -> usize {
        self.document.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.timeline.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.document.timeline.get(self.current)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Time at which the current step ends, if playing.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.deadline
    }

    // =========================================================================
    // CONTROL
    // =========================================================================

    /// Seeds the actors from the document and enters step 0, idle.
    pub fn load(&mut self, actors: &mut ActorStore) -> Option<StepOutcome> {
        self.stop();
        self.current = 0;
        actors.seed(&self.document);
        if self.is_empty() {
            return None;
        }
        Some(self.enter_step(0, actors))
    }

    /// Starts playback from the current step. No-op when already playing
    /// or when there are no steps.
    pub fn play(&mut self, now: Duration) -> bool {
        if self.is_playing() {
            return false;
        }
        let Some(step) = self.current_step() else {
            return false;
        };
        self.deadline = Some(now.saturating_add(step.duration()));
        self.state = PlaybackState::Playing;
        true
    }

    pub fn pause(&mut self) {
        self.stop();
    }

    pub fn toggle(&mut self, now: Duration) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play(now);
        }
    }

    /// Rebuilds the scene at step 0 and plays.
    pub fn restart(&mut self, now: Duration, actors: &mut ActorStore) -> Option<StepOutcome> {
        let outcome = self.seek(0, actors);
        self.play(now);
        outcome
    }

    /// Jumps to a step, idle. The index is clamped into range and the
    /// scene is rebuilt by replaying every step up to it.
    pub fn seek(&mut self, index: usize, actors: &mut ActorStore) -> Option<StepOutcome> {
        self.stop();
        actors.seed(&self.document);
        if self.is_empty() {
            self.current = 0;
            return None;
        }

        let target = index.min(self.len() - 1);
        let mut outcome = None;
        for i in 0..=target {
            outcome = Some(self.enter_step(i, actors));
        }
        self.current = target;
        outcome
    }

    /// Enters every step whose deadline is at or before `now`.
    ///
    /// Playback stops after the last step's duration elapses.
    pub fn poll(&mut self, now: Duration, actors: &mut ActorStore) -> Vec<StepOutcome> {
        let mut entered = Vec::new();

        while let Some(deadline) = self.deadline {
            if deadline > now {
                break;
            }
            if self.current + 1 < self.len() {
                let index = self.current + 1;
                let outcome = self.enter_step(index, actors);
                self.current = index;
                self.deadline = self
                    .current_step()
                    .map(|step| deadline.saturating_add(step.duration()));
                entered.push(outcome);
            } else {
                debug!(step = self.current, "timeline finished");
                self.stop();
            }
        }
        entered
    }

    fn stop(&mut self) {
        self.state = PlaybackState::Idle;
        self.deadline = None;
    }

    fn enter_step(&self, index: usize, actors: &mut ActorStore) -> StepOutcome {
        let step = &self.document.timeline[index];
        let mut applied = 0;
        let mut skipped = 0;

        for action in &step.actions {
            match actors.apply(action) {
                ActionOutcome::Applied => applied += 1,
                ActionOutcome::UnknownActor | ActionOutcome::MalformedTarget => skipped += 1,
            }
        }

        let focus = step.focus_target.as_ref().and_then(|id| {
            actors.get(id).map(|state| CameraFocus {
                actor_id: id.clone(),
                position: state.position,
            })
        });

        debug!(step = index, applied, skipped, "entered step");
        StepOutcome {
            index,
            applied,
            skipped,
            focus,
        }
    }

    // =========================================================================
    // VIEW DATA
    // =========================================================================

    /// "Step i / N", or a placeholder for an empty timeline.
    pub fn step_label(&self) -> String {
        if self.is_empty() {
            "Step 1 / -".to_string()
        } else {
            format!("Step {} / {}", self.current + 1, self.len())
        }
    }

    pub fn chapter_title(&self) -> &str {
        self.current_step()
            .and_then(|step| step.display.chapter_title.as_deref())
            .unwrap_or("Simulation Ready")
    }

    pub fn explanation(&self) -> Option<&str> {
        self.current_step()
            .map(|step| step.display.explanation.as_str())
            .filter(|text| !text.is_empty())
    }

    pub fn progress_segments(&self) -> Vec<SegmentState> {
        (0..self.len())
            .map(|i| match i.cmp(&self.current) {
                std::cmp::Ordering::Less => SegmentState::Completed,
                std::cmp::Ordering::Equal => SegmentState::Current,
                std::cmp::Ordering::Greater => SegmentState::Upcoming,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn doc(value: serde_json::Value) -> Arc<SceneDocument> {
        Arc::new(SceneDocument::from_value(&value).unwrap())
    }

    /// Two steps: the earth moves, the camera follows the sun.
    fn sun_doc() -> Arc<SceneDocument> {
        doc(json!({
            "stage_assets": [
                { "id": "sun", "initial_transform": { "position": [0, 0, 0] } },
                { "id": "earth", "initial_transform": { "position": [4, 0, 0] } }
            ],
            "sync_timeline": [
                { "duration_seconds": 1, "visual_events": { "camera_focus_target": "earth" } },
                { "duration_seconds": 1, "visual_events": {
                    "camera_focus_target": "sun",
                    "actions": [ { "actor_id": "sun", "type": "MOVE_TO", "target_value": [4, 0, 0] } ]
                } }
            ]
        }))
    }

    fn untimed_doc(steps: usize) -> Arc<SceneDocument> {
        let timeline: Vec<_> = (0..steps).map(|_| json!({})).collect();
        doc(json!({ "sync_timeline": timeline }))
    }

    #[test]
    fn test_load_enters_step_zero_idle() {
        let mut actors = ActorStore::new();
        let mut player = TimelinePlayer::new(sun_doc());
        let outcome = player.load(&mut actors).unwrap();

        assert_eq!(outcome.index, 0);
        assert_eq!(outcome.focus.unwrap().position, Vector3::new(4.0, 0.0, 0.0));
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.step_label(), "Step 1 / 2");
    }

    #[test]
    fn test_default_duration_delays_advance() {
        let mut actors = ActorStore::new();
        let mut player = TimelinePlayer::new(untimed_doc(3));
        player.load(&mut actors);
        player.play(Duration::ZERO);

        assert!(player.poll(secs(1.999), &mut actors).is_empty());
        assert_eq!(player.current_index(), 0);
        let entered = player.poll(secs(2.0), &mut actors);
        assert_eq!(entered.len(), 1);
        assert_eq!(player.current_index(), 1);
    }

    #[test]
    fn test_restart_plays_through_and_stops() {
        let mut actors = ActorStore::new();
        let mut player = TimelinePlayer::new(untimed_doc(4));
        player.load(&mut actors);
        player.seek(2, &mut actors);

        player.restart(secs(10.0), &mut actors);
        assert_eq!(player.current_index(), 0);
        assert!(player.is_playing());

        // Catch up three advances plus the final expiry in one poll.
        let entered = player.poll(secs(10.0 + 8.0), &mut actors);
        assert_eq!(entered.len(), 3);
        assert_eq!(player.current_index(), 3);
        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(player.next_deadline().is_none());
    }

    #[test]
    fn test_play_is_noop_when_playing_or_empty() {
        let mut actors = ActorStore::new();
        let mut player = TimelinePlayer::new(untimed_doc(2));
        player.load(&mut actors);
        assert!(player.play(Duration::ZERO));
        assert!(!player.play(secs(1.5)));
        assert_eq!(player.next_deadline(), Some(secs(2.0)));

        let mut empty = TimelinePlayer::new(untimed_doc(0));
        assert!(empty.load(&mut actors).is_none());
        assert!(!empty.play(Duration::ZERO));
        assert_eq!(empty.step_label(), "Step 1 / -");
        assert_eq!(empty.chapter_title(), "Simulation Ready");
        assert!(empty.progress_segments().is_empty());
    }

    #[test]
    fn test_pause_and_toggle() {
        let mut actors = ActorStore::new();
        let mut player = TimelinePlayer::new(untimed_doc(3));
        player.load(&mut actors);

        player.toggle(Duration::ZERO);
        assert!(player.is_playing());
        player.toggle(secs(1.0));
        assert!(!player.is_playing());
        assert!(player.poll(secs(100.0), &mut actors).is_empty());
        assert_eq!(player.current_index(), 0);
    }

    #[test]
    fn test_sun_focus_scenario() {
        let mut actors = ActorStore::new();
        let mut player = TimelinePlayer::new(sun_doc());
        player.load(&mut actors);
        player.play(Duration::ZERO);

        let entered = player.poll(secs(1.0), &mut actors);
        let focus = entered[0].focus.clone().unwrap();
        assert_eq!(focus.actor_id, "sun");
        // Focus uses the position after this step's MOVE_TO.
        assert_eq!(focus.position, Vector3::new(4.0, 0.0, 0.0));
        assert_eq!(entered[0].applied, 1);
    }

    #[test]
    fn test_sun_rises_then_fades() {
        let mut actors = ActorStore::new();
        let mut player = TimelinePlayer::new(doc(json!({
            "stage_assets": [ { "id": "sun", "type": "sphere" } ],
            "sync_timeline": [
                { "duration_seconds": 1, "visual_events": {
                    "actions": [ { "actor_id": "sun", "type": "MOVE_TO", "target_value": [0, 5, 0] } ]
                } },
                { "duration_seconds": 1, "visual_events": {
                    "actions": [ { "actor_id": "sun", "type": "FADE_OUT" } ]
                } }
            ]
        })));
        player.load(&mut actors);
        assert!(player.play(Duration::ZERO));

        player.poll(secs(1.0), &mut actors);
        assert_eq!(actors.get("sun").unwrap().position, Vector3::new(0.0, 5.0, 0.0));
        assert_eq!(player.current_index(), 1);
        assert!(player.is_playing());

        player.poll(secs(2.0), &mut actors);
        assert_eq!(actors.get("sun").unwrap().opacity, 0.0);
        assert_eq!(player.current_index(), 1);
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_long_step_does_not_overflow_deadline() {
        let mut actors = ActorStore::new();
        let mut player = TimelinePlayer::new(doc(json!({
            "sync_timeline": [{ "duration_seconds": 1e300 }, { "duration_seconds": 1 }]
        })));
        player.load(&mut actors);
        assert!(player.play(Duration::MAX - secs(1.0)));
        assert_eq!(player.next_deadline(), Some(Duration::MAX));
        assert!(player.poll(secs(600.0), &mut actors).is_empty());
    }

    #[test]
    fn test_seek_rebuilds_scene() {
        let mut actors = ActorStore::new();
        let mut player = TimelinePlayer::new(sun_doc());
        player.load(&mut actors);

        player.seek(1, &mut actors);
        assert_eq!(actors.get("sun").unwrap().position, Vector3::new(4.0, 0.0, 0.0));

        player.seek(0, &mut actors);
        assert_eq!(actors.get("sun").unwrap().position, Vector3::zeros());
        assert_eq!(
            player.progress_segments(),
            vec![SegmentState::Current, SegmentState::Upcoming]
        );
    }

    #[test]
    fn test_focus_on_unknown_actor_is_dropped() {
        let mut actors = ActorStore::new();
        let mut player = TimelinePlayer::new(doc(json!({
            "sync_timeline": [ { "visual_events": { "camera_focus_target": "ghost",
                "actions": [ { "actor_id": "ghost", "type": "FADE_OUT" } ] } } ]
        })));
        let outcome = player.load(&mut actors).unwrap();
        assert!(outcome.focus.is_none());
        assert_eq!(outcome.skipped, 1);
    }

    proptest! {
        #[test]
        fn prop_seek_clamps(steps in 1usize..12, index in 0usize..1000) {
            let mut actors = ActorStore::new();
            let mut player = TimelinePlayer::new(untimed_doc(steps));
            player.load(&mut actors);
            player.play(Duration::ZERO);

            player.seek(index, &mut actors);
            prop_assert_eq!(player.current_index(), index.min(steps - 1));
            prop_assert_eq!(player.state(), PlaybackState::Idle);
        }
    }
}
