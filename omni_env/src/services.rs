//! External service abstractions: the scene generator and the lab assistant.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{AssistantCall, GeneratorCall};

/// The content generator: turns a prompt into raw Scene Document text.
///
/// # Implementations
///
/// - **Production**: a client for a hosted text-generation model
/// - **Simulation**: scripted or file-backed responses with fault injection
///
/// # Call Flow
///
/// ```text
/// Viewer                   Generator
///   |                          |
///   |-- generate(call) ------->|
///   |                          |-- [latency / failure] --
///   |<------------- raw JSON --|
/// ```
#[async_trait]
pub trait ContentGenerator: Send + Sync + 'static {
    /// Runs one generation.
    ///
    /// # Returns
    /// * `Ok(text)` - Raw response text (expected to be a JSON document)
    /// * `Err(EnvError)` - Transport or model failure; no retry is attempted
    async fn generate(&self, call: &GeneratorCall) -> Result<String, EnvError>;

    /// Returns a short name for logs.
    fn name(&self) -> &str;
}

/// The conversational assistant answering questions about a scene.
#[async_trait]
pub trait ConversationalAssistant: Send + Sync + 'static {
    /// Produces one reply.
    ///
    /// An empty string is a valid (if unhelpful) reply; callers decide how
    /// to present it.
    async fn reply(&self, call: &AssistantCall) -> Result<String, EnvError>;

    /// Returns a short name for logs.
    fn name(&self) -> &str;
}

/// Fault injection for simulated services.
pub trait ServiceController: Send + Sync {
    /// Makes the next `count` calls fail.
    fn fail_next(&self, count: usize);

    /// Sets the probability (0.0 - 1.0) that any call fails.
    fn set_failure_rate(&self, rate: f64);

    /// Sets the simulated latency range for calls.
    fn set_latency_ms(&self, min_ms: u64, max_ms: u64);

    /// Clears every injected fault.
    fn heal_all(&self);
}
