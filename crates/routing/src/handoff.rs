use std::{sync::Arc, time::Duration};

use {
    serde::Serialize,
    tracing::{info, warn},
};

use {
    handoff_channels::ChannelOutbound,
    handoff_sessions::{ConversationStore, SenderLocks, TranscriptMessage},
    handoff_whatsapp_business::normalize_phone,
};

use crate::{
    Error, Result,
    engine::{RoutingSettings, deliver},
};

/// Result of closing a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    /// Whether the closing notice reached the user.
    pub notice_delivered: bool,
}

/// Operations human agents perform on escalated conversations.
pub struct HandoffController {
    store: Arc<dyn ConversationStore>,
    outbound: Arc<dyn ChannelOutbound>,
    locks: Arc<SenderLocks>,
    closing_notice: String,
    delivery_timeout: Duration,
}

impl HandoffController {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        outbound: Arc<dyn ChannelOutbound>,
        locks: Arc<SenderLocks>,
        settings: &RoutingSettings,
    ) -> Self {
        Self {
            store,
            outbound,
            locks,
            closing_notice: settings.closing_notice.clone(),
            delivery_timeout: settings.delivery_timeout,
        }
    }

    async fn ensure_escalated(&self, sender_id: &str) -> Result<()> {
        let _guard = self.locks.lock(sender_id).await;
        if self.store.is_escalated(sender_id).await? {
            Ok(())
        } else {
            Err(Error::not_escalated(sender_id))
        }
    }

    /// Log the closing notice and drop the conversation. Caller holds the
    /// sender lock.
    async fn clear(&self, sender_id: &str) -> handoff_sessions::Result<bool> {
        if self.store.is_escalated(sender_id).await? {
            self.store
                .append_message(sender_id, TranscriptMessage::system(&self.closing_notice))
                .await?;
        }
        self.store.release(sender_id).await
    }

    /// Send a message from a human agent to an escalated sender and log it.
    ///
    /// Nothing is logged when delivery fails.
    pub async fn send_as_agent(&self, sender_id: &str, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyMessage);
        }
        self.ensure_escalated(sender_id).await?;

        let to = normalize_phone(sender_id);
        deliver(self.outbound.as_ref(), &to, text, self.delivery_timeout)
            .await
            .map_err(|source| {
                warn!(sender_id, to = %to, error = %source, "agent message delivery failed");
                Error::Delivery {
                    to: to.clone(),
                    source,
                }
            })?;

        let _guard = self.locks.lock(sender_id).await;
        if self.store.is_escalated(sender_id).await? {
            self.store
                .append_message(sender_id, TranscriptMessage::agent(text))
                .await?;
        } else {
            warn!(sender_id, "conversation released while agent message was in flight");
        }
        info!(sender_id, "agent message sent");
        Ok(())
    }

    /// Close an escalated conversation: notify the user, then clear the
    /// escalation marker and transcript.
    ///
    /// The sender lock is held from the escalation check through the clear,
    /// so concurrent releases send one notice. A failed notice does not
    /// block the release; it is reported in the returned [`ReleaseReport`].
    pub async fn release_conversation(&self, sender_id: &str) -> Result<ReleaseReport> {
        let _guard = self.locks.lock(sender_id).await;
        if !self.store.is_escalated(sender_id).await? {
            return Err(Error::not_escalated(sender_id));
        }

        let to = normalize_phone(sender_id);
        let notice_delivered = match deliver(
            self.outbound.as_ref(),
            &to,
            &self.closing_notice,
            self.delivery_timeout,
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(sender_id, to = %to, error = %e, "closing notice delivery failed");
                false
            },
        };

        match self.clear(sender_id).await {
            Ok(existed) => {
                info!(sender_id, existed, notice_delivered, "conversation released");
                Ok(ReleaseReport { notice_delivered })
            },
            Err(source) => {
                warn!(sender_id, error = %source, "release failed after closing notice");
                Err(Error::ReleaseIncomplete {
                    sender_id: sender_id.to_string(),
                    notice_delivered,
                    source,
                })
            },
        }
    }

    /// Drop the automated-turn history of a sender nobody is handling.
    ///
    /// Escalated conversations are closed with
    /// [`release_conversation`](Self::release_conversation) instead. Returns
    /// whether any history existed.
    pub async fn clear_history(&self, sender_id: &str) -> Result<bool> {
        let _guard = self.locks.lock(sender_id).await;
        if self.store.is_escalated(sender_id).await? {
            return Err(Error::escalated(sender_id));
        }
        let existed = !self.store.transcript(sender_id).await?.is_empty();
        self.store.release(sender_id).await?;
        info!(sender_id, existed, "automated history cleared");
        Ok(existed)
    }
}
