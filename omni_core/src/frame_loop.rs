//! The per-viewer frame task.
//!
//! One spawned task per live viewer: sleep for the frame interval, take
//! the viewer lock briefly to run timers and render, publish the frame on
//! a `watch` channel. The task ends when [`FrameLoopHandle::stop`] is
//! called or the handle is dropped.

use crate::projector::RenderFrame;
use crate::viewer::{lock_viewer, SharedViewer};

use omni_env::OmniContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::debug;

pub type FrameReceiver = watch::Receiver<Option<Arc<RenderFrame>>>;

/// Owner of a running frame loop.
pub struct FrameLoopHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    frames: FrameReceiver,
}

impl FrameLoopHandle {
    /// A receiver that observes every published frame.
    pub fn subscribe(&self) -> FrameReceiver {
        self.frames.clone()
    }

    pub fn latest(&self) -> Option<Arc<RenderFrame>> {
        self.frames.borrow().clone()
    }

    pub fn stop(mut self) {
        self.signal_stop();
    }

    fn signal_stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for FrameLoopHandle {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

/// Spawns the frame loop on the context.
pub fn start<Ctx: OmniContext>(
    ctx: Arc<Ctx>,
    viewer: SharedViewer,
    interval: Duration,
) -> FrameLoopHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let (frame_tx, frames) = watch::channel(None);
    let loop_ctx = ctx.clone();

    ctx.spawn("frame_loop", async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = loop_ctx.sleep(interval) => {}
            }

            let frame = {
                let mut viewer = lock_viewer(&viewer);
                viewer.frame(loop_ctx.now())
            };
            if frame_tx.send(Some(Arc::new(frame))).is_err() {
                break;
            }
        }
        debug!("frame loop stopped");
    });

    FrameLoopHandle {
        stop_tx: Some(stop_tx),
        frames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::SendOutcome;
    use crate::viewer::{GenerationOutcome, ViewerConfig, ViewerHandle};
    use async_trait::async_trait;
    use omni_env::{
        AssistantCall, ContentGenerator, ConversationalAssistant, EnvError, GeneratorCall,
        TokioContext,
    };

    struct Canned;

    #[async_trait]
    impl ContentGenerator for Canned {
        async fn generate(&self, _call: &GeneratorCall) -> Result<String, EnvError> {
            Ok(r#"{
                "meta_data": { "title": "Pendulum" },
                "stage_assets": [ { "id": "bob", "type": "sphere" } ],
                "sync_timeline": [ { "duration_seconds": 1 } ]
            }"#
            .to_string())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[async_trait]
    impl ConversationalAssistant for Canned {
        async fn reply(&self, call: &AssistantCall) -> Result<String, EnvError> {
            Ok(format!("You asked: {}", call.message))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn handle() -> ViewerHandle<TokioContext, Canned, Canned> {
        ViewerHandle::new(
            TokioContext::shared(),
            Arc::new(Canned),
            Arc::new(Canned),
            ViewerConfig {
                frame_rate_hz: 200,
                ..ViewerConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_frame_loop_publishes_and_stops() {
        let viewer = handle();
        assert_eq!(viewer.generate("pendulum").await.unwrap(), GenerationOutcome::Loaded);

        let frames = viewer.start_frame_loop();
        let mut rx = frames.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("no frame within timeout")
            .unwrap();

        let frame = frames.latest().unwrap();
        assert_eq!(frame.actors.len(), 1);
        assert_eq!(frame.actors[0].id, "bob");

        frames.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stopped_at = viewer.lock().frame_sequence();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(viewer.lock().frame_sequence(), stopped_at);
    }

    #[tokio::test]
    async fn test_handle_chat_round_trip() {
        let viewer = handle();
        viewer.generate("pendulum").await.unwrap();

        assert_eq!(viewer.send_chat("Why does it swing?").await, SendOutcome::Replied);
        let guard = viewer.lock();
        let messages = guard.chat().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].text, "You asked: Why does it swing?");
    }
}
