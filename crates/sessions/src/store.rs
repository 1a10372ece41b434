use async_trait::async_trait;

use crate::{
    Result,
    message::{EscalatedConversation, EscalationRecord, TranscriptMessage},
};

/// Durable per-sender conversation state: the escalation marker and the
/// transcript shown to human agents.
///
/// All operations are keyed by the raw inbound sender identifier. The
/// escalated set and the transcript map must never disagree as observed by
/// a reader: releasing a conversation removes both in one step, and
/// [`record_escalation`](Self::record_escalation) makes the marker visible
/// together with the first transcript entries.
///
/// Implementations serialize their own writes. Callers that need a
/// read-modify-write sequence for one sender (check, then escalate, then
/// append) hold a [`SenderLocks`](crate::SenderLocks) guard around it.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Whether the sender is currently handled by a human. Unknown senders
    /// are not escalated.
    async fn is_escalated(&self, sender_id: &str) -> Result<bool>;

    /// Mark the sender as escalated. Returns `true` when a new marker was
    /// created and `false` when the sender was already escalated, in which
    /// case nothing changes. Initializes an empty transcript if absent.
    async fn escalate(&self, sender_id: &str, trigger_text: &str, escalated_at: u64)
    -> Result<bool>;

    /// Append to the sender's transcript, creating it if absent. Valid for
    /// senders that are not escalated.
    async fn append_message(&self, sender_id: &str, message: TranscriptMessage) -> Result<()>;

    /// Escalate and append `messages` in a single write. Returns whether a
    /// new marker was created; the messages are appended either way.
    async fn record_escalation(
        &self,
        sender_id: &str,
        trigger_text: &str,
        escalated_at: u64,
        messages: Vec<TranscriptMessage>,
    ) -> Result<bool>;

    /// Drop all but the newest `keep` transcript entries. Returns how many
    /// entries were removed.
    async fn trim_transcript(&self, sender_id: &str, keep: usize) -> Result<usize>;

    /// Remove the escalation marker and delete the transcript. Returns
    /// whether a marker existed. Repeated calls are harmless.
    async fn release(&self, sender_id: &str) -> Result<bool>;

    /// The escalation marker for a sender, if any.
    async fn escalation(&self, sender_id: &str) -> Result<Option<EscalationRecord>>;

    /// The sender's transcript in chronological order. Empty when absent.
    async fn transcript(&self, sender_id: &str) -> Result<Vec<TranscriptMessage>>;

    /// All escalated conversations, oldest escalation first. Ties keep
    /// insertion order.
    async fn list_escalated(&self) -> Result<Vec<EscalatedConversation>>;

    /// Release held resources at shutdown.
    async fn close(&self) {}
}
