//! Test server with a file-backed store and recording collaborators.

#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    secrecy::Secret,
    tokio::net::TcpListener,
};

use {
    handoff_channels::{ChannelOutbound, ChannelType},
    handoff_config::HandoffConfig,
    handoff_gateway::{GatewayState, build_gateway_app},
    handoff_providers::{AutomatedResponder, ResponderRequest},
    handoff_routing::{
        EscalationClassifier, HandoffController, RoutingEngine, RoutingSettings,
    },
    handoff_sessions::{FileConversationStore, SenderLocks},
};

pub const VERIFY_TOKEN: &str = "verify-me";
pub const PHONE_NUMBER_ID: &str = "PNID";

pub struct CountingResponder {
    pub calls: AtomicUsize,
    pub reply: String,
    pub delay: Option<Duration>,
}

#[async_trait]
impl AutomatedResponder for CountingResponder {
    fn name(&self) -> &str {
        "counting"
    }

    async fn respond(&self, _request: ResponderRequest<'_>) -> handoff_providers::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.reply.clone())
    }
}

#[derive(Default)]
pub struct RecordingOutbound {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingOutbound {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    fn channel_type(&self) -> ChannelType {
        ChannelType::WhatsappBusiness
    }

    async fn send_text(
        &self,
        to: &str,
        text: &str,
        _reply_to: Option<&str>,
    ) -> handoff_channels::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<FileConversationStore>,
    pub responder: Arc<CountingResponder>,
    pub outbound: Arc<RecordingOutbound>,
    pub client: reqwest::Client,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn responder_calls(&self) -> usize {
        self.responder.calls.load(Ordering::SeqCst)
    }
}

pub fn test_config() -> HandoffConfig {
    let mut config = HandoffConfig::default();
    config.whatsapp.verify_token = Secret::new(VERIFY_TOKEN.into());
    config.whatsapp.phone_number_id = PHONE_NUMBER_ID.into();
    config
}

pub async fn start_server(config: HandoffConfig, reply: &str) -> TestServer {
    start_server_with_delay(config, reply, None).await
}

/// Like [`start_server`], with a responder that sleeps before answering.
pub async fn start_server_with_delay(
    config: HandoffConfig,
    reply: &str,
    delay: Option<Duration>,
) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileConversationStore::open(dir.path()).await.unwrap());
    let responder = Arc::new(CountingResponder {
        calls: AtomicUsize::new(0),
        reply: reply.to_string(),
        delay,
    });
    let outbound = Arc::new(RecordingOutbound::default());
    let locks = Arc::new(SenderLocks::new());
    let settings = RoutingSettings::from_config(&config);

    let engine = Arc::new(RoutingEngine::new(
        store.clone(),
        responder.clone(),
        outbound.clone(),
        EscalationClassifier::from_config(&config.routing),
        settings.clone(),
        Arc::clone(&locks),
    ));
    let controller = Arc::new(HandoffController::new(
        store.clone(),
        outbound.clone(),
        locks,
        &settings,
    ));
    let state = GatewayState::new(&config, engine, controller);
    let app = build_gateway_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        store,
        responder,
        outbound,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

/// A webhook payload with one text message.
pub fn text_payload(from: &str, id: &str, body: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "5492910000000",
                        "phone_number_id": PHONE_NUMBER_ID
                    },
                    "contacts": [{ "profile": { "name": "Ana" }, "wa_id": from }],
                    "messages": [{
                        "from": from,
                        "id": id,
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": { "body": body }
                    }]
                }
            }]
        }]
    })
}
