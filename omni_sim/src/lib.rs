//! Omni-Engine Deterministic Simulation Harness
//!
//! This crate runs the scene runtime from `omni_core` against a virtual
//! clock and scripted services, so a whole session (generation, autoplay,
//! camera input, chat) replays identically from one 64-bit seed.
//!
//! # Core Principle: Everything external is simulated
//!
//! - **Time**: the virtual clock advances one frame interval per step, and
//!   by the injected latency while a service call is awaited
//! - **Services**: generator and assistant answer from queues, with seeded
//!   latency and fault injection
//! - **Randomness**: input storms draw from the context's seeded RNG
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (virtual clock + ChaCha8 RNG)             │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                                 │                   │
//! │  ┌────▼──────────────┐          ┌───────▼────────────┐      │
//! │  │ ScriptedGenerator │          │ ScriptedAssistant  │      │
//! │  └────┬──────────────┘          └───────┬────────────┘      │
//! │       │        SimServiceController      │                   │
//! │  ┌────▼─────────────────────────────────▼────────────┐      │
//! │  │        ViewerHandle (omni_core::viewer)            │      │
//! │  │   timeline · actors · camera · projector · chat    │      │
//! │  └────────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//!          ▲ step_frame() / run_for()        │ SimExport
//!   ScenarioRunner (checks per scenario) ◄───┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use omni_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::MidSwap);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
pub mod fixtures;
mod runner;
pub mod scenarios;
mod services;
mod world;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{ActorPlacement, CameraSnapshot, SimEvent, SimExport, SimFrame};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use services::{CallPlan, FileGenerator, ScriptedAssistant, ScriptedGenerator, SimServiceController};
pub use world::{SimConfig, SimViewerHandle, SimWorld, WorldStats};
