//! Omni-Engine Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" boundary that lets the scene runtime
//! in `omni_core` run against both **Production** (tokio) and
//! **Simulation** (virtual clock) environments.
//!
//! # Core Concept: Everything external is injected
//!
//! The runtime never touches the outside world directly:
//! - Time (`now()`, `sleep()`) and task spawning come from an [`OmniContext`]
//! - The scene generator is a [`ContentGenerator`]
//! - The lab assistant is a [`ConversationalAssistant`]
//!
//! Swapping the context and the two services is enough to replay a whole
//! session deterministically from a seed.
//!
//! # Example
//!
//! ```ignore
//! use omni_env::{OmniContext, TokioContext};
//!
//! async fn frame_loop<Ctx: OmniContext>(ctx: &Ctx) {
//!     loop {
//!         ctx.sleep(Duration::from_millis(16)).await;
//!         render(ctx.now());
//!     }
//! }
//! ```

mod context;
mod services;
mod types;
mod error;
mod tokio_impl;

pub use context::OmniContext;
pub use services::{ContentGenerator, ConversationalAssistant, ServiceController};
pub use types::{
    AssistantCall, ChatMessage, ChatRole, GenerationMode, GenerationRequest, GeneratorCall,
    MessageId,
};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
