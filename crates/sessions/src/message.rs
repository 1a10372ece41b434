//! Typed records for conversation storage.
//!
//! These types represent the JSON layout of the file-backed store and the
//! rows of the SQLite store. A transcript is an ordered list of
//! [`TranscriptMessage`] entries; an escalation is tracked by an
//! [`EscalationRecord`] keyed by the raw sender identifier.

use {
    handoff_common::now_ms,
    serde::{Deserialize, Serialize},
};

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    /// The end user writing from the chat channel.
    User,
    /// The automated assistant.
    Assistant,
    /// A human agent answering from the agent surface.
    Agent,
    /// Fixed notices emitted by the system (e.g. the closing notice).
    System,
}

impl MessageSender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageSender {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "agent" => Ok(Self::Agent),
            "system" => Ok(Self::System),
            other => Err(crate::Error::message(format!(
                "unknown message sender: {other}"
            ))),
        }
    }
}

/// A single entry in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub sender: MessageSender,
    pub text: String,
    /// Epoch milliseconds.
    pub created_at: u64,
}

impl TranscriptMessage {
    pub fn new(sender: MessageSender, text: impl Into<String>, created_at: u64) -> Self {
        Self {
            sender,
            text: text.into(),
            created_at,
        }
    }

    /// Create a human agent message stamped with the current time.
    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(MessageSender::Agent, text, now_ms())
    }

    /// Create a system notice stamped with the current time.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageSender::System, text, now_ms())
    }
}

/// Marker that a sender is currently handled by a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub sender_id: String,
    /// Text of the message that caused the handoff.
    pub trigger_text: String,
    /// Epoch milliseconds.
    pub escalated_at: u64,
}

/// An escalated conversation as shown to human agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalatedConversation {
    #[serde(flatten)]
    pub escalation: EscalationRecord,
    pub transcript: Vec<TranscriptMessage>,
}

/// Clamp `created_at` so a transcript never goes back in time.
pub(crate) fn clamp_timestamp(transcript: &[TranscriptMessage], created_at: u64) -> u64 {
    transcript
        .last()
        .map_or(created_at, |last| created_at.max(last.created_at))
}
