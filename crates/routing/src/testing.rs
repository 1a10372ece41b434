//! Fakes shared by the engine and controller tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    handoff_channels::{ChannelOutbound, ChannelType},
    handoff_providers::{AutomatedResponder, ResponderRequest},
    handoff_sessions::{
        ConversationStore, EscalatedConversation, EscalationRecord, FileConversationStore,
        SenderLocks, TranscriptMessage,
    },
};

use crate::{EscalationClassifier, HandoffController, RoutingEngine, RoutingSettings};

pub const SENDER: &str = "5491122334455";
pub const SENDER_ADDRESS: &str = "541122334455";

#[derive(Default)]
pub struct FakeResponder {
    calls: AtomicUsize,
    reply: Mutex<Option<String>>,
    last_user_text: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    fail: AtomicBool,
}

impl FakeResponder {
    pub fn reply_with(&self, reply: &str) {
        *self.reply.lock().unwrap() = Some(reply.to_string());
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_user_text(&self) -> Option<String> {
        self.last_user_text.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomatedResponder for FakeResponder {
    fn name(&self) -> &str {
        "fake"
    }

    async fn respond(&self, request: ResponderRequest<'_>) -> handoff_providers::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_user_text.lock().unwrap() = Some(request.user_text.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(handoff_providers::Error::EmptyReply);
        }
        Ok(self
            .reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "respuesta automática".to_string()))
    }
}

#[derive(Default)]
pub struct FakeOutbound {
    sent: Mutex<Vec<(String, String)>>,
    delay: Mutex<Option<Duration>>,
    fail: AtomicBool,
}

impl FakeOutbound {
    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelOutbound for FakeOutbound {
    fn channel_type(&self) -> ChannelType {
        ChannelType::WhatsappBusiness
    }

    async fn send_text(
        &self,
        to: &str,
        text: &str,
        _reply_to: Option<&str>,
    ) -> handoff_channels::Result<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(handoff_channels::Error::rejected(500, "gateway down"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }
}

pub struct Fixture {
    pub store: Arc<FileConversationStore>,
    pub responder: Arc<FakeResponder>,
    pub outbound: Arc<FakeOutbound>,
    pub engine: Arc<RoutingEngine>,
    pub controller: HandoffController,
    _dir: tempfile::TempDir,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_settings(RoutingSettings::default()).await
    }

    pub async fn with_settings(settings: RoutingSettings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileConversationStore::open(dir.path()).await.unwrap());
        let responder = Arc::new(FakeResponder::default());
        let outbound = Arc::new(FakeOutbound::default());
        let locks = Arc::new(SenderLocks::new());

        let engine = Arc::new(RoutingEngine::new(
            store.clone(),
            responder.clone(),
            outbound.clone(),
            EscalationClassifier::default(),
            settings.clone(),
            Arc::clone(&locks),
        ));
        let controller = HandoffController::new(store.clone(), outbound.clone(), locks, &settings);

        Self {
            store,
            responder,
            outbound,
            engine,
            controller,
            _dir: dir,
        }
    }
}

/// Delegates to a file store. Either only `release` fails or, until
/// [`FailingStore::recover`], every call does.
pub struct FailingStore {
    inner: Arc<FileConversationStore>,
    release_only: bool,
    failing: AtomicBool,
}

impl FailingStore {
    pub fn release(inner: Arc<FileConversationStore>) -> Self {
        Self {
            inner,
            release_only: true,
            failing: AtomicBool::new(true),
        }
    }

    pub fn all(inner: Arc<FileConversationStore>) -> Self {
        Self {
            inner,
            release_only: false,
            failing: AtomicBool::new(true),
        }
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    fn check(&self, is_release: bool) -> handoff_sessions::Result<()> {
        let failing = self.failing.load(Ordering::SeqCst) && (is_release || !self.release_only);
        if failing {
            Err(handoff_sessions::Error::message("disk full"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConversationStore for FailingStore {
    async fn is_escalated(&self, sender_id: &str) -> handoff_sessions::Result<bool> {
        self.check(false)?;
        self.inner.is_escalated(sender_id).await
    }

    async fn escalate(
        &self,
        sender_id: &str,
        trigger_text: &str,
        escalated_at: u64,
    ) -> handoff_sessions::Result<bool> {
        self.check(false)?;
        self.inner.escalate(sender_id, trigger_text, escalated_at).await
    }

    async fn append_message(
        &self,
        sender_id: &str,
        message: TranscriptMessage,
    ) -> handoff_sessions::Result<()> {
        self.check(false)?;
        self.inner.append_message(sender_id, message).await
    }

    async fn record_escalation(
        &self,
        sender_id: &str,
        trigger_text: &str,
        escalated_at: u64,
        messages: Vec<TranscriptMessage>,
    ) -> handoff_sessions::Result<bool> {
        self.check(false)?;
        self.inner
            .record_escalation(sender_id, trigger_text, escalated_at, messages)
            .await
    }

    async fn trim_transcript(&self, sender_id: &str, keep: usize) -> handoff_sessions::Result<usize> {
        self.check(false)?;
        self.inner.trim_transcript(sender_id, keep).await
    }

    async fn release(&self, sender_id: &str) -> handoff_sessions::Result<bool> {
        self.check(true)?;
        self.inner.release(sender_id).await
    }

    async fn escalation(
        &self,
        sender_id: &str,
    ) -> handoff_sessions::Result<Option<EscalationRecord>> {
        self.check(false)?;
        self.inner.escalation(sender_id).await
    }

    async fn transcript(&self, sender_id: &str) -> handoff_sessions::Result<Vec<TranscriptMessage>> {
        self.check(false)?;
        self.inner.transcript(sender_id).await
    }

    async fn list_escalated(&self) -> handoff_sessions::Result<Vec<EscalatedConversation>> {
        self.check(false)?;
        self.inner.list_escalated().await
    }
}
