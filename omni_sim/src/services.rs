//! Simulated external services with fault injection.
//!
//! Both services sleep on their context for a latency drawn from a seeded
//! RNG, so a run is reproducible from its seed under the virtual clock and
//! still behaves sensibly on the tokio clock.

use async_trait::async_trait;
use omni_env::{
    AssistantCall, ContentGenerator, ConversationalAssistant, EnvError, GeneratorCall,
    OmniContext, ServiceController,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Latency and failure decision for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallPlan {
    pub latency: Duration,
    pub fail: bool,
}

struct FaultState {
    fail_next: usize,
    failure_rate: f64,
    latency_ms: (u64, u64),
    rng: ChaCha8Rng,
}

/// Fault injection shared by a simulated service and the scenario driving it.
#[derive(Clone)]
pub struct SimServiceController {
    state: Arc<Mutex<FaultState>>,
}

impl SimServiceController {
    pub fn new(seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(FaultState {
                fail_next: 0,
                failure_rate: 0.0,
                latency_ms: (0, 0),
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Decides the fate of the next call.
    pub fn plan(&self) -> CallPlan {
        let mut state = self.lock();
        let fail = if state.fail_next > 0 {
            state.fail_next -= 1;
            true
        } else {
            let rate = state.failure_rate;
            rate > 0.0 && state.rng.gen_bool(rate)
        };
        let (min, max) = state.latency_ms;
        let latency_ms = if min == max {
            min
        } else {
            state.rng.gen_range(min..=max)
        };
        CallPlan {
            latency: Duration::from_millis(latency_ms),
            fail,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FaultState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ServiceController for SimServiceController {
    fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    fn set_failure_rate(&self, rate: f64) {
        self.lock().failure_rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
    }

    fn set_latency_ms(&self, min_ms: u64, max_ms: u64) {
        self.lock().latency_ms = (min_ms.min(max_ms), min_ms.max(max_ms));
    }

    fn heal_all(&self) {
        let mut state = self.lock();
        state.fail_next = 0;
        state.failure_rate = 0.0;
        state.latency_ms = (0, 0);
    }
}

/// Generator answering from a queue of scripted responses.
///
/// An exhausted queue answers with the fallback response when one is set,
/// otherwise with an empty-response error.
pub struct ScriptedGenerator<Ctx: OmniContext> {
    context: Arc<Ctx>,
    controller: SimServiceController,
    responses: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    calls: AtomicUsize,
}

impl<Ctx: OmniContext> ScriptedGenerator<Ctx> {
    pub fn new(context: Arc<Ctx>, controller: SimServiceController) -> Self {
        Self {
            context,
            controller,
            responses: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answers every call without a queued response with `text`.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn push_response(&self, text: impl Into<String>) {
        self.queue().push_back(text.into());
    }

    pub fn controller(&self) -> &SimServiceController {
        &self.controller
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<Ctx: OmniContext> ContentGenerator for ScriptedGenerator<Ctx> {
    async fn generate(&self, call: &GeneratorCall) -> Result<String, EnvError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let plan = self.controller.plan();
        debug!(latency_ms = plan.latency.as_millis() as u64, fail = plan.fail, payload = %call.payload, "scripted generation");
        self.context.sleep(plan.latency).await;

        if plan.fail {
            return Err(EnvError::service("injected generator failure"));
        }
        let next = self.queue().pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| EnvError::empty(self.name()))
    }

    fn name(&self) -> &str {
        "scripted-generator"
    }
}

/// Generator that returns the contents of a document file.
pub struct FileGenerator {
    path: PathBuf,
}

impl FileGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContentGenerator for FileGenerator {
    async fn generate(&self, _call: &GeneratorCall) -> Result<String, EnvError> {
        std::fs::read_to_string(&self.path)
            .map_err(|e| EnvError::service(format!("{}: {}", self.path.display(), e)))
    }

    fn name(&self) -> &str {
        "file-generator"
    }
}

/// Assistant answering from scripted replies, or with a canned echo.
pub struct ScriptedAssistant<Ctx: OmniContext> {
    context: Arc<Ctx>,
    controller: SimServiceController,
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<AssistantCall>>,
}

impl<Ctx: OmniContext> ScriptedAssistant<Ctx> {
    pub fn new(context: Arc<Ctx>, controller: SimServiceController) -> Self {
        Self {
            context,
            controller,
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(text.into());
    }

    pub fn controller(&self) -> &SimServiceController {
        &self.controller
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<AssistantCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl<Ctx: OmniContext> ConversationalAssistant for ScriptedAssistant<Ctx> {
    async fn reply(&self, call: &AssistantCall) -> Result<String, EnvError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());
        let plan = self.controller.plan();
        self.context.sleep(plan.latency).await;

        if plan.fail {
            return Err(EnvError::service("injected assistant failure"));
        }
        let scripted = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        Ok(scripted.unwrap_or_else(|| format!("Here is what the simulation shows about \"{}\".", call.message)))
    }

    fn name(&self) -> &str {
        "scripted-assistant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use omni_env::GenerationMode;
    use proptest::prelude::*;

    fn call() -> GeneratorCall {
        omni_core::generation::build_generator_call("volcano", GenerationMode::Standard).unwrap()
    }

    #[test]
    fn test_controller_fail_next_and_heal() {
        let controller = SimServiceController::new(1);
        controller.fail_next(2);
        assert!(controller.plan().fail);
        assert!(controller.plan().fail);
        assert!(!controller.plan().fail);

        controller.set_failure_rate(1.0);
        assert!(controller.plan().fail);
        controller.heal_all();
        assert!(!controller.plan().fail);
    }

    #[test]
    fn test_controller_latency_is_seeded() {
        let a = SimServiceController::new(9);
        let b = SimServiceController::new(9);
        a.set_latency_ms(500, 100);
        b.set_latency_ms(100, 500);

        for _ in 0..10 {
            let (pa, pb) = (a.plan(), b.plan());
            assert_eq!(pa, pb);
            assert!(pa.latency >= Duration::from_millis(100));
            assert!(pa.latency <= Duration::from_millis(500));
        }
    }

    proptest! {
        #[test]
        fn prop_latency_stays_in_range(seed: u64, a in 0u64..5_000, b in 0u64..5_000, rate in -2.0f64..3.0) {
            let controller = SimServiceController::new(seed);
            controller.set_latency_ms(a, b);
            controller.set_failure_rate(rate);
            for _ in 0..8 {
                let plan = controller.plan();
                let ms = plan.latency.as_millis() as u64;
                prop_assert!(ms >= a.min(b) && ms <= a.max(b));
                if rate <= 0.0 {
                    prop_assert!(!plan.fail);
                }
                if rate >= 1.0 {
                    prop_assert!(plan.fail);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_scripted_generator() {
        let ctx = SimContext::shared(3);
        let controller = SimServiceController::new(3);
        controller.set_latency_ms(200, 200);
        let generator = ScriptedGenerator::new(ctx.clone(), controller);
        generator.push_response("{}");

        assert_eq!(generator.generate(&call()).await.unwrap(), "{}");
        assert_eq!(ctx.now(), Duration::from_millis(200));

        let err = generator.generate(&call()).await.unwrap_err();
        assert!(matches!(err, EnvError::EmptyResponse(_)));
        assert_eq!(generator.call_count(), 2);

        generator.controller().fail_next(1);
        generator.push_response("{}");
        assert!(generator.generate(&call()).await.is_err());
        // The queued response survives the injected failure.
        assert_eq!(generator.generate(&call()).await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_scripted_assistant_records_calls() {
        let ctx = SimContext::shared(5);
        let assistant = ScriptedAssistant::new(ctx, SimServiceController::new(5));
        assistant.push_reply("Because of gravity.");

        let call = AssistantCall {
            system_instruction: "brief".to_string(),
            history: Vec::new(),
            message: "Why?".to_string(),
        };
        assert_eq!(assistant.reply(&call).await.unwrap(), "Because of gravity.");
        assert!(assistant.reply(&call).await.unwrap().contains("Why?"));
        assert_eq!(assistant.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_file_generator_missing_file() {
        let generator = FileGenerator::new("/nonexistent/scene.json");
        let err = generator.generate(&call()).await.unwrap_err();
        assert!(matches!(err, EnvError::ServiceError(_)));
    }
}
