//! Core environment context trait for the scene runtime.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for environment interaction.
///
/// Abstracts the clock and the task scheduler so the viewer's timers and
/// frame loop run unchanged in production (tokio) and in the simulation
/// harness (virtual clock).
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`
/// - **Simulation**: `SimContext` (in `omni_sim`) - manually advanced clock
#[async_trait]
pub trait OmniContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// All timeline deadlines and frame deltas are measured on this clock.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    ///
    /// The frame loop is the only long-lived task the runtime spawns.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
