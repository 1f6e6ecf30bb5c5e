//! Chat Session - the assistant conversation beside the scene.
//!
//! At most one assistant call is in flight. Sending is split in two halves
//! so the owner can release its lock across the await:
//! [`ChatSession::begin_send`] records the user message and builds the
//! call, [`ChatSession::complete`] appends whatever came back. Failures
//! never surface to the caller; they turn into a fallback message.

use crate::document::SceneDocument;

use omni_env::{AssistantCall, ChatMessage, ConversationalAssistant, EnvError};
use tracing::{debug, warn};

/// Appended when the assistant call fails.
pub const SIGNAL_LOST: &str = "Signal lost. Retrying...";

/// Appended when the assistant answers with empty text.
pub const EMPTY_REPLY: &str = "I'm having trouble analyzing the data right now.";

/// Suggested prompts are only offered while the conversation is short.
const SUGGESTION_CUTOFF: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Replied,
    Fallback,
    /// Blank text, or another send was still pending
    Ignored,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    pending: bool,
    bot_name: String,
    context_brief: String,
    suggested: Vec<String>,
    history_window: usize,
}

impl ChatSession {
    pub fn new(history_window: usize) -> Self {
        Self {
            messages: Vec::new(),
            pending: false,
            bot_name: String::new(),
            context_brief: String::new(),
            suggested: Vec::new(),
            history_window,
        }
    }

    /// Clears the log and greets for a freshly loaded document.
    ///
    /// A reply still in flight for the previous scene will be appended to
    /// the new log when it lands.
    pub fn reset_for(&mut self, document: &SceneDocument) {
        self.messages.clear();
        self.bot_name = document.assistant.bot_name.clone();
        self.context_brief = document.assistant.context_brief.clone();
        self.suggested = document.assistant.suggested_questions.clone();
        self.messages.push(ChatMessage::assistant(format!(
            "Ready! I've loaded the simulation for: \"{}\". Ask me anything!",
            document.meta.title
        )));
    }

    /// Empties the log while a new scene is generated.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn suggested_questions(&self) -> &[String] {
        &self.suggested
    }

    pub fn suggestions_visible(&self) -> bool {
        !self.suggested.is_empty() && self.messages.len() < SUGGESTION_CUTOFF && !self.pending
    }

    pub fn system_instruction(&self) -> String {
        format!(
            "You are a helpful science lab assistant. \
             Your context brief for this simulation is: \"{}\". \
             Answer the user's questions based on this context. \
             Keep answers concise (under 50 words) and encouraging.",
            self.context_brief
        )
    }

    /// Records the user message and builds the assistant call.
    ///
    /// Returns `None` (and records nothing) for blank text or while a
    /// previous send is pending.
    pub fn begin_send(&mut self, text: &str) -> Option<AssistantCall> {
        if text.trim().is_empty() || self.pending {
            return None;
        }

        let start = self.messages.len().saturating_sub(self.history_window);
        let history = self.messages[start..].to_vec();

        self.messages.push(ChatMessage::user(text));
        self.pending = true;

        Some(AssistantCall {
            system_instruction: self.system_instruction(),
            history,
            message: text.to_string(),
        })
    }

    /// Appends the reply (or a fallback) and clears the pending flag.
    pub fn complete(&mut self, result: Result<String, EnvError>) -> SendOutcome {
        self.pending = false;
        match result {
            Ok(reply) if reply.trim().is_empty() => {
                debug!("assistant returned empty text");
                self.messages.push(ChatMessage::assistant(EMPTY_REPLY));
                SendOutcome::Replied
            }
            Ok(reply) => {
                self.messages.push(ChatMessage::assistant(reply));
                SendOutcome::Replied
            }
            Err(e) => {
                warn!("assistant call failed: {}", e);
                self.messages.push(ChatMessage::assistant(SIGNAL_LOST));
                SendOutcome::Fallback
            }
        }
    }

    /// Full send for callers that own the session across the await.
    pub async fn send<A>(&mut self, assistant: &A, text: &str) -> SendOutcome
    where
        A: ConversationalAssistant + ?Sized,
    {
        let Some(call) = self.begin_send(text) else {
            return SendOutcome::Ignored;
        };
        let result = assistant.reply(&call).await;
        self.complete(result)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use omni_env::ChatRole;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recording {
        reply: Result<String, ()>,
        calls: Mutex<Vec<AssistantCall>>,
    }

    impl Recording {
        fn new(reply: Result<&str, ()>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ConversationalAssistant for Recording {
        async fn reply(&self, call: &AssistantCall) -> Result<String, EnvError> {
            self.calls.lock().unwrap().push(call.clone());
            self.reply.clone().map_err(|_| EnvError::service("offline"))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn session() -> ChatSession {
        let doc = SceneDocument::from_value(&json!({
            "meta_data": { "title": "Volcano" },
            "lab_assistant_config": {
                "context_brief": "Magma rises.",
                "suggested_questions": ["Why does it erupt?"]
            }
        }))
        .unwrap();
        let mut chat = ChatSession::default();
        chat.reset_for(&doc);
        chat
    }

    #[test]
    fn test_greeting() {
        let chat = session();
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(
            chat.messages()[0].text,
            "Ready! I've loaded the simulation for: \"Volcano\". Ask me anything!"
        );
        assert!(chat.suggestions_visible());
        assert!(chat.system_instruction().contains("Magma rises."));
        assert!(chat.system_instruction().contains("under 50 words"));
    }

    #[test]
    fn test_single_flight() {
        let mut chat = session();
        assert!(chat.begin_send("first").is_some());
        assert!(chat.is_pending());
        assert!(!chat.suggestions_visible());

        assert!(chat.begin_send("second").is_none());
        assert_eq!(chat.messages().len(), 2);

        chat.complete(Ok("answer".to_string()));
        assert!(!chat.is_pending());
        assert_eq!(chat.messages().len(), 3);
    }

    #[test]
    fn test_blank_text_ignored() {
        let mut chat = session();
        assert!(chat.begin_send("   ").is_none());
        assert_eq!(chat.messages().len(), 1);
    }

    #[test]
    fn test_history_window() {
        let mut chat = session();
        for i in 0..5 {
            chat.begin_send(&format!("q{}", i));
            chat.complete(Ok(format!("a{}", i)));
        }
        let call = chat.begin_send("latest").unwrap();
        assert_eq!(call.history.len(), 6);
        assert_eq!(call.history.last().unwrap().text, "a4");
        assert_eq!(call.message, "latest");
    }

    #[tokio::test]
    async fn test_failure_appends_fallback() {
        let mut chat = session();
        let assistant = Recording::new(Err(()));

        let outcome = chat.send(&assistant, "Why?").await;

        assert_eq!(outcome, SendOutcome::Fallback);
        let last = chat.messages().last().unwrap();
        assert_eq!(last.text, SIGNAL_LOST);
        assert_eq!(last.role, ChatRole::Assistant);
        assert!(!chat.is_pending());
    }

    #[tokio::test]
    async fn test_reply_and_empty_reply() {
        let mut chat = session();
        let assistant = Recording::new(Ok("Because of pressure."));
        assert_eq!(chat.send(&assistant, "Why?").await, SendOutcome::Replied);
        assert_eq!(chat.messages().last().unwrap().text, "Because of pressure.");

        let calls = assistant.calls.lock().unwrap();
        assert_eq!(calls[0].history.len(), 1);
        drop(calls);

        let silent = Recording::new(Ok(""));
        chat.send(&silent, "And?").await;
        assert_eq!(chat.messages().last().unwrap().text, EMPTY_REPLY);
        assert_eq!(chat.send(&silent, "").await, SendOutcome::Ignored);
    }

    #[test]
    fn test_late_reply_after_reset() {
        let mut chat = session();
        chat.begin_send("slow question");
        chat.reset_for(&SceneDocument::default());
        chat.complete(Ok("late".to_string()));
        assert_eq!(chat.messages().len(), 2);
        assert_eq!(chat.messages()[1].text, "late");
    }
}
