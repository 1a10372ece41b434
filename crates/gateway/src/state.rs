use std::{sync::Arc, time::Duration};

use secrecy::Secret;

use {
    handoff_config::HandoffConfig,
    handoff_routing::{HandoffController, RoutingEngine},
    handoff_sessions::ConversationStore,
};

/// What the webhook needs to authenticate the provider.
pub struct WebhookSettings {
    pub verify_token: Secret<String>,
    /// `None` disables signature checks.
    pub app_secret: Option<Secret<String>>,
    /// Messages addressed to other phone number ids are ignored. Empty
    /// accepts all.
    pub phone_number_id: String,
}

/// Shared state behind every route.
pub struct GatewayState {
    pub engine: Arc<RoutingEngine>,
    pub controller: Arc<HandoffController>,
    pub store: Arc<dyn ConversationStore>,
    pub webhook: WebhookSettings,
    /// Bearer token for the agent API and inbox. `None` leaves them open.
    pub agent_token: Option<Secret<String>>,
    pub ack_timeout: Duration,
    pub inbox_enabled: bool,
    pub version: &'static str,
}

impl GatewayState {
    pub fn new(
        config: &HandoffConfig,
        engine: Arc<RoutingEngine>,
        controller: Arc<HandoffController>,
    ) -> Arc<Self> {
        let store = Arc::clone(engine.store());
        Arc::new(Self {
            engine,
            controller,
            store,
            webhook: WebhookSettings {
                verify_token: config.whatsapp.verify_token.clone(),
                app_secret: config.whatsapp.app_secret.clone(),
                phone_number_id: config.whatsapp.phone_number_id.clone(),
            },
            agent_token: config.gateway.agent_token.clone(),
            ack_timeout: Duration::from_secs(config.gateway.ack_timeout_secs.max(1)),
            inbox_enabled: config.gateway.inbox_enabled,
            version: env!("CARGO_PKG_VERSION"),
        })
    }
}
