//! Omni-Engine Core - runtime for AI-generated, narrated 3D scenes
//!
//! A generated Scene Document drives four cooperating pieces:
//! 1. **Actor Store**: live transforms of the scene's primitive actors
//! 2. **Timeline Player**: timed, step-by-step playback that mutates the actors
//! 3. **Camera Controller**: damped orbit camera steered by input and step focus
//! 4. **Scene Projector**: per-frame transform stacks, faces and shading
//!
//! The [`viewer`] module ties them together with the chat session and the
//! generation client, and runs the frame loop on an injected context.

pub mod actors;
pub mod camera;
pub mod chat;
pub mod color;
pub mod document;
pub mod error;
pub mod frame_loop;
pub mod generation;
pub mod geometry;
pub mod projector;
pub mod shading;
pub mod timeline;
pub mod viewer;

// Re-export key types for convenience
pub use actors::{ActionOutcome, ActorStore, LiveActorState};
pub use camera::{CameraConfig, CameraController, CameraPose, ViewPreset, ZoomDirection};
pub use chat::{ChatSession, SendOutcome};
pub use color::Rgba;
pub use document::SceneDocument;
pub use error::{DocumentError, GenerationError};
pub use frame_loop::FrameLoopHandle;
pub use projector::{ProjectorConfig, RenderFrame, SceneProjector};
pub use timeline::{CameraFocus, PlaybackState, SegmentState, StepOutcome, TimelinePlayer};
pub use viewer::{
    GenerationOutcome, GenerationTicket, PlaybackView, SharedViewer, Viewer, ViewerConfig,
    ViewerHandle,
};
