//! JSON exporter for recorded simulation runs.
//!
//! A recording holds a sampled frame stream (camera pose, step, actor
//! placements) plus the events that happened between samples, so a run
//! can be inspected or diffed offline.

use omni_core::actors::LiveActorState;
use omni_core::camera::CameraPose;
use omni_core::projector::ActorRender;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single sampled frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Render sequence number
    pub sequence: u64,

    /// Current step index
    pub step: usize,

    pub playing: bool,

    pub camera: CameraSnapshot,

    pub actors: Vec<ActorPlacement>,

    /// Events since the previous sample
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<SimEvent>,
}

/// Current camera pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSnapshot {
    pub pitch: f64,
    pub yaw: f64,
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl From<&CameraPose> for CameraSnapshot {
    fn from(pose: &CameraPose) -> Self {
        Self {
            pitch: pose.pitch,
            yaw: pose.yaw,
            zoom: pose.zoom,
            pan_x: pose.pan.x,
            pan_y: pose.pan.y,
        }
    }
}

/// World position of an actor and where it landed on screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorPlacement {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub screen_x: f64,
    pub screen_y: f64,
    pub opacity: f64,
}

impl ActorPlacement {
    pub fn new(render: &ActorRender, state: &LiveActorState) -> Self {
        Self {
            id: render.id.clone(),
            x: state.position.x,
            y: state.position.y,
            z: state.position.z,
            screen_x: render.screen.x,
            screen_y: render.screen.y,
            opacity: render.opacity,
        }
    }
}

/// Simulation event (step entered, generation landed, fault injected...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub time_sec: f64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(time_sec: f64, message: impl Into<String>) -> Self {
        Self {
            time_sec,
            message: message.into(),
            level: None,
        }
    }

    pub fn warn(time_sec: f64, message: impl Into<String>) -> Self {
        Self {
            time_sec,
            message: message.into(),
            level: Some("warn".to_string()),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// Title of the last loaded document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,

    /// All sampled frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            document_title: None,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_tracks_duration_and_skips_empty_fields() {
        let mut export = SimExport::new("solar_system", 42);
        export.add_frame(SimFrame {
            time_sec: 1.5,
            sequence: 90,
            step: 0,
            playing: true,
            camera: CameraSnapshot::from(&CameraPose::new(20.0, 0.0, -450.0)),
            actors: Vec::new(),
            events: Vec::new(),
        });
        export.finalize(true, None);

        assert_eq!(export.duration_sec, 1.5);
        let json = serde_json::to_value(&export).unwrap();
        assert!(json.get("failure_reason").is_none());
        assert!(json["frames"][0].get("events").is_none());
        assert_eq!(json["frames"][0]["camera"]["zoom"], -450.0);
    }

    #[test]
    fn test_write_to_file() {
        let path = std::env::temp_dir().join("omni_sim_export_test.json");
        let mut export = SimExport::new("chat_outage", 7);
        export.finalize(false, Some("reply missing".to_string()));
        export.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: SimExport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.scenario, "chat_outage");
        assert_eq!(back.failure_reason.as_deref(), Some("reply missing"));
        let _ = std::fs::remove_file(&path);
    }
}
