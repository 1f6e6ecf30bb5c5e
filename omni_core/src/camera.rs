//! Camera Controller - orbit camera with a damped current pose.
//!
//! Input never moves the camera directly. It edits the *target* pose, and
//! every frame the *current* pose is pulled toward the target:
//!
//! ```text
//!   pointer / wheel / presets / focus
//!                 │
//!                 ▼
//!        ┌────────────────┐  advance_by(dt)   ┌────────────────┐
//!        │  target pose   │ ────────────────► │  current pose  │ ──► projector
//!        │ (+auto-rotate) │   k = 1-(1-K)^f   │                │
//!        └────────────────┘                   └────────────────┘
//! ```
//!
//! `f` is the number of reference frames (1/60 s by default) covered by
//! `dt`, so the camera converges at the same speed on any display rate.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Tuning constants for the camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Fraction of the remaining distance covered per reference frame
    pub damping: f64,
    /// Degrees per pixel of drag
    pub orbit_sensitivity: f64,
    /// Zoom units per wheel delta unit
    pub zoom_sensitivity: f64,
    /// Zoom units per zoom button press
    pub zoom_step: f64,
    /// Farthest zoom (most negative)
    pub zoom_min: f64,
    /// Closest zoom
    pub zoom_max: f64,
    /// Yaw degrees added per reference frame while auto-rotating
    pub auto_rotate_step: f64,
    pub reference_rate_hz: f64,
    pub initial_pitch: f64,
    pub initial_yaw: f64,
    pub initial_zoom: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            damping: 0.08,
            orbit_sensitivity: 0.4,
            zoom_sensitivity: 0.5,
            zoom_step: 150.0,
            zoom_min: -1500.0,
            zoom_max: -100.0,
            auto_rotate_step: 0.05,
            reference_rate_hz: 60.0,
            initial_pitch: 20.0,
            initial_yaw: 0.0,
            initial_zoom: -450.0,
        }
    }
}

/// Pitch/yaw in degrees, zoom as a z translation, pan in projected pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPose {
    pub pitch: f64,
    pub yaw: f64,
    pub zoom: f64,
    pub pan: Vector2<f64>,
}

impl CameraPose {
    pub fn new(pitch: f64, yaw: f64, zoom: f64) -> Self {
        Self {
            pitch,
            yaw,
            zoom,
            pan: Vector2::zeros(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPreset {
    Front,
    Top,
    Side,
    Reset,
}

impl ViewPreset {
    /// (pitch, yaw, zoom) for the preset.
    pub fn pose(self) -> (f64, f64, f64) {
        match self {
            ViewPreset::Front => (0.0, 0.0, -400.0),
            ViewPreset::Top => (90.0, 0.0, -600.0),
            ViewPreset::Side => (0.0, 90.0, -400.0),
            ViewPreset::Reset => (20.0, 0.0, -450.0),
        }
    }

    pub fn all() -> Vec<ViewPreset> {
        vec![
            ViewPreset::Front,
            ViewPreset::Top,
            ViewPreset::Side,
            ViewPreset::Reset,
        ]
    }
}

impl fmt::Display for ViewPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewPreset::Front => "FRONT",
            ViewPreset::Top => "TOP",
            ViewPreset::Side => "SIDE",
            ViewPreset::Reset => "RESET",
        };
        f.write_str(name)
    }
}

impl FromStr for ViewPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FRONT" => Ok(ViewPreset::Front),
            "TOP" => Ok(ViewPreset::Top),
            "SIDE" => Ok(ViewPreset::Side),
            "RESET" => Ok(ViewPreset::Reset),
            _ => Err(format!("Unknown view preset: {}", s)),
        }
    }
}

/// Values captured when a drag starts; deltas are applied to these.
#[derive(Debug, Clone, Copy)]
struct DragGesture {
    origin: Vector2<f64>,
    pitch: f64,
    yaw: f64,
}

/// Target/current camera state and the input that drives it.
#[derive(Debug, Clone)]
pub struct CameraController {
    config: CameraConfig,
    target: CameraPose,
    current: CameraPose,
    auto_rotate: bool,
    drag: Option<DragGesture>,
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        let initial = CameraPose::new(config.initial_pitch, config.initial_yaw, config.initial_zoom);
        Self {
            config,
            target: initial,
            current: initial,
            auto_rotate: true,
            drag: None,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn current(&self) -> CameraPose {
        self.current
    }

    pub fn target(&self) -> CameraPose {
        self.target
    }

    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        self.drag = Some(DragGesture {
            origin: Vector2::new(x, y),
            pitch: self.target.pitch,
            yaw: self.target.yaw,
        });
        self.auto_rotate = false;
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if let Some(drag) = self.drag {
            self.on_drag_delta(x - drag.origin.x, y - drag.origin.y);
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Orbits by a pointer delta measured from the drag origin.
    ///
    /// Outside a gesture the delta is applied to the current target.
    pub fn on_drag_delta(&mut self, dx: f64, dy: f64) {
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        let (base_pitch, base_yaw) = match self.drag {
            Some(drag) => (drag.pitch, drag.yaw),
            None => {
                self.auto_rotate = false;
                (self.target.pitch, self.target.yaw)
            }
        };
        let sensitivity = self.config.orbit_sensitivity;
        self.target.yaw = base_yaw + dx * sensitivity;
        self.target.pitch = (base_pitch - dy * sensitivity).clamp(-90.0, 90.0);
    }

    pub fn on_wheel(&mut self, delta_y: f64) {
        self.auto_rotate = false;
        self.set_zoom(self.target.zoom - delta_y * self.config.zoom_sensitivity);
    }

    pub fn zoom_by(&mut self, direction: ZoomDirection) {
        self.auto_rotate = false;
        let step = match direction {
            ZoomDirection::In => self.config.zoom_step,
            ZoomDirection::Out => -self.config.zoom_step,
        };
        self.set_zoom(self.target.zoom + step);
    }

    pub fn set_target_view(&mut self, preset: ViewPreset) {
        let (pitch, yaw, zoom) = preset.pose();
        self.target = CameraPose::new(pitch, yaw, zoom);
        self.auto_rotate = preset == ViewPreset::Reset;
    }

    /// Sets the pan target from a timeline focus command.
    pub fn focus(&mut self, pan: Vector2<f64>) {
        self.target.pan = pan;
    }

    fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.target.zoom = zoom.clamp(self.config.zoom_min, self.config.zoom_max);
        }
    }

    // =========================================================================
    // FRAME STEP
    // =========================================================================

    /// One reference frame with the plain damping constant.
    pub fn advance(&mut self) {
        self.step(1.0, self.config.damping);
    }

    /// Advances by wall-clock time.
    pub fn advance_by(&mut self, dt: Duration) {
        let frames = dt.as_secs_f64() * self.config.reference_rate_hz;
        if frames <= 0.0 {
            return;
        }
        let k = 1.0 - (1.0 - self.config.damping).powf(frames);
        self.step(frames, k);
    }

    fn step(&mut self, frames: f64, k: f64) {
        if self.auto_rotate && self.drag.is_none() {
            self.target.yaw += self.config.auto_rotate_step * frames;
        }

        let t = self.target;
        let c = &mut self.current;
        c.pitch += (t.pitch - c.pitch) * k;
        c.yaw += (t.yaw - c.yaw) * k;
        c.zoom += (t.zoom - c.zoom) * k;
        c.pan += (t.pan - c.pan) * k;
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_initial_pose() {
        let camera = CameraController::default();
        assert_eq!(camera.current(), CameraPose::new(20.0, 0.0, -450.0));
        assert!(camera.auto_rotate());
    }

    #[test]
    fn test_zoom_in_clamps_and_converges() {
        let mut camera = CameraController::default();
        for _ in 0..20 {
            camera.zoom_by(ZoomDirection::In);
        }
        assert_eq!(camera.target().zoom, -100.0);
        assert!(!camera.auto_rotate());

        for _ in 0..600 {
            camera.advance();
        }
        assert_relative_eq!(camera.current().zoom, -100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zoom_out_and_wheel_clamp() {
        let mut camera = CameraController::default();
        camera.on_wheel(100_000.0);
        assert_eq!(camera.target().zoom, -1500.0);
        camera.zoom_by(ZoomDirection::Out);
        assert_eq!(camera.target().zoom, -1500.0);
        camera.on_wheel(-200.0);
        assert_eq!(camera.target().zoom, -1400.0);
    }

    #[test]
    fn test_drag_uses_captured_values() {
        let mut camera = CameraController::default();
        camera.pointer_down(100.0, 100.0);
        assert!(!camera.auto_rotate());

        camera.pointer_move(150.0, 100.0);
        assert_relative_eq!(camera.target().yaw, 20.0);
        // Deltas are from the origin, not cumulative.
        camera.pointer_move(110.0, 100.0);
        assert_relative_eq!(camera.target().yaw, 4.0);

        camera.pointer_move(100.0, -10_000.0);
        assert_eq!(camera.target().pitch, 90.0);
        camera.pointer_up();
        assert!(!camera.is_dragging());
    }

    #[test]
    fn test_non_finite_pointer_is_ignored() {
        let mut camera = CameraController::default();
        camera.pointer_down(10.0, 10.0);
        camera.pointer_move(f64::NAN, 20.0);
        camera.pointer_move(10.0, f64::INFINITY);
        camera.on_drag_delta(f64::NEG_INFINITY, 0.0);
        assert_eq!(camera.target().pitch, 20.0);
        assert_eq!(camera.target().yaw, 0.0);
        camera.pointer_up();

        camera.pointer_down(f64::NAN, 0.0);
        assert!(!camera.is_dragging());

        for _ in 0..10 {
            camera.advance();
        }
        assert!(camera.current().pitch.is_finite());
        assert!(camera.current().yaw.is_finite());
    }

    #[test]
    fn test_auto_rotate_pauses_while_dragging() {
        let mut camera = CameraController::default();
        camera.advance();
        assert_relative_eq!(camera.target().yaw, 0.05);

        camera.set_target_view(ViewPreset::Reset);
        camera.pointer_down(0.0, 0.0);
        camera.advance();
        assert_eq!(camera.target().yaw, 0.0);
    }

    #[test]
    fn test_presets() {
        let mut camera = CameraController::default();
        camera.focus(Vector2::new(-200.0, 0.0));
        camera.set_target_view(ViewPreset::Side);
        assert_eq!(camera.target(), CameraPose::new(0.0, 90.0, -400.0));
        assert!(!camera.auto_rotate());

        camera.set_target_view(ViewPreset::Reset);
        assert!(camera.auto_rotate());
        assert_eq!("top".parse::<ViewPreset>(), Ok(ViewPreset::Top));
        assert!("diagonal".parse::<ViewPreset>().is_err());
    }

    #[test]
    fn test_top_preset_converges_without_overshoot() {
        let mut camera = CameraController::default();
        camera.set_target_view(ViewPreset::Top);

        let mut previous = camera.current().pitch;
        for _ in 0..1000 {
            camera.advance();
            let pitch = camera.current().pitch;
            assert!(pitch >= previous && pitch <= 90.0);
            previous = pitch;
        }
        assert_relative_eq!(previous, 90.0, epsilon = 1e-6);
        assert_relative_eq!(camera.current().zoom, -600.0, epsilon = 1e-6);
    }

    #[test]
    fn test_advance_by_is_rate_independent() {
        let mut at_60 = CameraController::default();
        let mut at_120 = CameraController::default();
        at_60.set_target_view(ViewPreset::Top);
        at_120.set_target_view(ViewPreset::Top);

        for _ in 0..60 {
            at_60.advance_by(Duration::from_secs_f64(1.0 / 60.0));
        }
        for _ in 0..120 {
            at_120.advance_by(Duration::from_secs_f64(1.0 / 120.0));
        }
        assert_relative_eq!(at_60.current().pitch, at_120.current().pitch, epsilon = 1e-4);
    }

    #[test]
    fn test_focus_moves_pan() {
        let mut camera = CameraController::default();
        camera.focus(Vector2::new(-200.0, 100.0));
        for _ in 0..600 {
            camera.advance();
        }
        assert_relative_eq!(camera.current().pan.x, -200.0, epsilon = 1e-6);
        assert_relative_eq!(camera.current().pan.y, 100.0, epsilon = 1e-6);
    }

    proptest! {
        #[test]
        fn prop_zoom_stays_in_range(deltas in prop::collection::vec(-5000.0f64..5000.0, 0..50)) {
            let mut camera = CameraController::default();
            for delta in deltas {
                camera.on_wheel(delta);
                prop_assert!(camera.target().zoom >= -1500.0 && camera.target().zoom <= -100.0);
            }
        }

        #[test]
        fn prop_pitch_stays_in_range(moves in prop::collection::vec((-5000.0f64..5000.0, -5000.0f64..5000.0), 1..30)) {
            let mut camera = CameraController::default();
            camera.pointer_down(0.0, 0.0);
            for (x, y) in moves {
                camera.pointer_move(x, y);
                camera.advance();
                prop_assert!(camera.target().pitch >= -90.0 && camera.target().pitch <= 90.0);
                prop_assert!(camera.current().pitch >= -90.0 && camera.current().pitch <= 90.0);
            }
        }
    }
}
