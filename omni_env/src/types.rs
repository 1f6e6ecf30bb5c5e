//! Common types shared by the runtime and its external services.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a chat message.
///
/// Uses UUID v4 for uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Creates a new random MessageId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic MessageId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of the chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Generation mode selected by the mode toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationMode {
    #[default]
    Standard,
    WhatIfRemix,
}

impl GenerationMode {
    /// The other mode (what the toggle switches to).
    pub fn toggled(self) -> Self {
        match self {
            GenerationMode::Standard => GenerationMode::WhatIfRemix,
            GenerationMode::WhatIfRemix => GenerationMode::Standard,
        }
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationMode::Standard => write!(f, "STANDARD"),
            GenerationMode::WhatIfRemix => write!(f, "WHAT_IF_REMIX"),
        }
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STANDARD" => Ok(GenerationMode::Standard),
            "WHAT_IF_REMIX" | "REMIX" => Ok(GenerationMode::WhatIfRemix),
            _ => Err(format!("Unknown generation mode: {}", s)),
        }
    }
}

/// The textual payload sent next to the generator's system instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub user_query: String,
    pub mode: GenerationMode,
}

/// A complete call to the content generator.
#[derive(Debug, Clone)]
pub struct GeneratorCall {
    /// Fixed instruction describing the schema and generation rules
    pub system_instruction: String,

    /// Serialized [`GenerationRequest`]
    pub payload: String,

    /// Sampling temperature requested from the model
    pub temperature: f32,

    /// Requested response MIME type
    pub response_mime_type: &'static str,
}

/// A complete call to the conversational assistant.
#[derive(Debug, Clone)]
pub struct AssistantCall {
    /// Instruction embedding the scene's context brief
    pub system_instruction: String,

    /// Trailing window of prior messages, oldest first
    pub history: Vec<ChatMessage>,

    /// The new user text
    pub message: String,
}
