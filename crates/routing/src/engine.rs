use std::{sync::Arc, time::Duration};

use {
    serde::Serialize,
    tracing::{debug, info, warn},
};

use {
    handoff_channels::ChannelOutbound,
    handoff_common::now_ms,
    handoff_config::HandoffConfig,
    handoff_providers::{AutomatedResponder, ResponderRequest},
    handoff_sessions::{ConversationStore, MessageSender, SenderLocks, TranscriptMessage},
    handoff_whatsapp_business::{InboundText, normalize_phone},
};

use crate::{Result, classify::EscalationClassifier, dedupe::RecentIds};

/// Texts, limits, and timeouts the engine and controller run with.
#[derive(Debug, Clone)]
pub struct RoutingSettings {
    pub system_prompt: String,
    pub acknowledgment: String,
    pub closing_notice: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub log_automated_turns: bool,
    /// 0 keeps the whole automated history.
    pub automated_history_limit: usize,
    pub dedupe_capacity: usize,
    pub responder_timeout: Duration,
    pub delivery_timeout: Duration,
}

impl RoutingSettings {
    pub fn from_config(config: &HandoffConfig) -> Self {
        Self {
            system_prompt: config.routing.system_prompt.clone(),
            acknowledgment: config.routing.acknowledgment.clone(),
            closing_notice: config.routing.closing_notice.clone(),
            max_tokens: config.responder.max_tokens,
            temperature: config.responder.temperature,
            log_automated_turns: config.routing.log_automated_turns,
            automated_history_limit: config.routing.automated_history_limit,
            dedupe_capacity: config.routing.dedupe_capacity,
            responder_timeout: Duration::from_secs(config.responder.timeout_secs.max(1)),
            delivery_timeout: Duration::from_secs(config.whatsapp.timeout_secs.max(1)),
        }
    }
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self::from_config(&HandoffConfig::default())
    }
}

/// One inbound text message, keyed by the raw sender identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Provider message id, used to drop redeliveries.
    pub message_id: Option<String>,
    pub sender_id: String,
    pub text: String,
    /// Epoch milliseconds.
    pub received_at: u64,
}

impl InboundMessage {
    pub fn new(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            message_id: None,
            sender_id: sender_id.into(),
            text: text.into(),
            received_at: now_ms(),
        }
    }

    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

impl From<InboundText> for InboundMessage {
    fn from(msg: InboundText) -> Self {
        Self {
            message_id: msg.message_id,
            sender_id: msg.from,
            text: msg.body,
            received_at: msg.sent_at.unwrap_or_else(now_ms),
        }
    }
}

/// What the engine did with an inbound message.
///
/// `delivered` is `false` when the outbound reply failed or timed out; the
/// conversation state is the same either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    /// The user asked for a person; the acknowledgment was sent.
    Escalated { delivered: bool },
    /// The responder could not answer; its reply was sent and a person
    /// takes over.
    EscalatedByFallback { delivered: bool },
    AutoReplied { delivered: bool },
    /// A person handles this sender; the message was only logged.
    Suppressed,
    /// Already processed this message id.
    Duplicate,
    /// The responder failed or timed out, or the message was blank.
    NoReply,
}

impl RouteOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Escalated { .. } => "escalated",
            Self::EscalatedByFallback { .. } => "escalated_by_fallback",
            Self::AutoReplied { .. } => "auto_replied",
            Self::Suppressed => "suppressed",
            Self::Duplicate => "duplicate",
            Self::NoReply => "no_reply",
        }
    }

    /// Whether an outbound reply was delivered, for outcomes that send one.
    #[must_use]
    pub fn delivered(&self) -> Option<bool> {
        match self {
            Self::Escalated { delivered }
            | Self::EscalatedByFallback { delivered }
            | Self::AutoReplied { delivered } => Some(*delivered),
            Self::Suppressed | Self::Duplicate | Self::NoReply => None,
        }
    }
}

impl std::fmt::Display for RouteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Send `text` to `to` with a deadline.
pub(crate) async fn deliver(
    outbound: &dyn ChannelOutbound,
    to: &str,
    text: &str,
    deadline: Duration,
) -> handoff_channels::Result<()> {
    match tokio::time::timeout(deadline, outbound.send_text(to, text, None)).await {
        Ok(result) => result,
        Err(elapsed) => Err(handoff_channels::Error::external(
            "delivery timed out",
            elapsed,
        )),
    }
}

/// Decides, per inbound message, between automated reply, escalation, and
/// silence.
pub struct RoutingEngine {
    store: Arc<dyn ConversationStore>,
    responder: Arc<dyn AutomatedResponder>,
    outbound: Arc<dyn ChannelOutbound>,
    classifier: EscalationClassifier,
    settings: RoutingSettings,
    locks: Arc<SenderLocks>,
    recent: RecentIds,
}

impl RoutingEngine {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        responder: Arc<dyn AutomatedResponder>,
        outbound: Arc<dyn ChannelOutbound>,
        classifier: EscalationClassifier,
        settings: RoutingSettings,
        locks: Arc<SenderLocks>,
    ) -> Self {
        let recent = RecentIds::new(settings.dedupe_capacity);
        Self {
            store,
            responder,
            outbound,
            classifier,
            settings,
            locks,
            recent,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Route one inbound message.
    ///
    /// Only store failures are returned as errors. Responder and delivery
    /// failures are logged and reflected in the outcome.
    pub async fn handle_inbound(&self, msg: InboundMessage) -> Result<RouteOutcome> {
        if let Some(id) = msg.message_id.as_deref()
            && !self.recent.insert(id)
        {
            debug!(sender_id = %msg.sender_id, message_id = id, "duplicate delivery ignored");
            return Ok(RouteOutcome::Duplicate);
        }

        let result = self.route(&msg).await;
        if result.is_err()
            && let Some(id) = msg.message_id.as_deref()
        {
            self.recent.forget(id);
        }
        if let Ok(outcome) = &result {
            info!(sender_id = %msg.sender_id, outcome = %outcome, "inbound message routed");
        }
        result
    }

    async fn route(&self, msg: &InboundMessage) -> Result<RouteOutcome> {
        let sender_id = msg.sender_id.as_str();
        let text = msg.text.trim();
        if text.is_empty() {
            debug!(sender_id, "blank message ignored");
            return Ok(RouteOutcome::NoReply);
        }
        let user_message = TranscriptMessage::new(MessageSender::User, text, msg.received_at);

        {
            let guard = self.locks.lock(sender_id).await;

            if self.store.is_escalated(sender_id).await? {
                self.store.append_message(sender_id, user_message).await?;
                return Ok(RouteOutcome::Suppressed);
            }

            if self.classifier.wants_human(text) {
                let created = self
                    .store
                    .record_escalation(sender_id, text, msg.received_at, vec![user_message])
                    .await?;
                drop(guard);
                info!(sender_id, created, "handoff requested by user");
                let delivered = self
                    .send(sender_id, &self.settings.acknowledgment)
                    .await;
                return Ok(RouteOutcome::Escalated { delivered });
            }
        }

        let Some(reply) = self.ask_responder(sender_id, text).await else {
            return Ok(RouteOutcome::NoReply);
        };
        let fallback = self.classifier.is_fallback_reply(&reply);
        let reply_message = TranscriptMessage::new(MessageSender::Assistant, &reply, now_ms());

        {
            let _guard = self.locks.lock(sender_id).await;

            if self.store.is_escalated(sender_id).await? {
                debug!(sender_id, "escalated while the responder was running, reply dropped");
                self.store.append_message(sender_id, user_message).await?;
                return Ok(RouteOutcome::Suppressed);
            }

            if fallback {
                let created = self
                    .store
                    .record_escalation(sender_id, text, msg.received_at, vec![
                        user_message,
                        reply_message,
                    ])
                    .await?;
                info!(sender_id, created, "responder fell back, handing off");
            } else if self.settings.log_automated_turns {
                self.store.append_message(sender_id, user_message).await?;
                self.store.append_message(sender_id, reply_message).await?;
                let limit = self.settings.automated_history_limit;
                if limit > 0 {
                    let dropped = self.store.trim_transcript(sender_id, limit).await?;
                    if dropped > 0 {
                        debug!(sender_id, dropped, "automated history trimmed");
                    }
                }
            }
        }

        let delivered = self.send(sender_id, &reply).await;
        Ok(if fallback {
            RouteOutcome::EscalatedByFallback { delivered }
        } else {
            RouteOutcome::AutoReplied { delivered }
        })
    }

    async fn ask_responder(&self, sender_id: &str, text: &str) -> Option<String> {
        let request = ResponderRequest {
            system_prompt: &self.settings.system_prompt,
            user_text: text,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        match tokio::time::timeout(
            self.settings.responder_timeout,
            self.responder.respond(request),
        )
        .await
        {
            Ok(Ok(reply)) => Some(reply),
            Ok(Err(e)) => {
                warn!(sender_id, responder = self.responder.name(), error = %e, "automated reply failed");
                None
            },
            Err(_) => {
                warn!(
                    sender_id,
                    responder = self.responder.name(),
                    timeout_ms = u64::try_from(self.settings.responder_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                    "automated reply timed out"
                );
                None
            },
        }
    }

    /// Deliver to the sender's normalized address. Failures are logged.
    async fn send(&self, sender_id: &str, text: &str) -> bool {
        let to = normalize_phone(sender_id);
        match deliver(
            self.outbound.as_ref(),
            &to,
            text,
            self.settings.delivery_timeout,
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(sender_id, to = %to, error = %e, "reply delivery failed");
                false
            },
        }
    }
}
