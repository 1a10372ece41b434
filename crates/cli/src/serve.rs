use std::{path::Path, sync::Arc};

use {anyhow::Context, tracing::info};

use {
    handoff_config::{HandoffConfig, StorageBackend},
    handoff_gateway::{GatewayState, start_gateway},
    handoff_providers::OpenAiCompatResponder,
    handoff_routing::{EscalationClassifier, HandoffController, RoutingEngine, RoutingSettings},
    handoff_sessions::{
        ConversationStore, FileConversationStore, SenderLocks, SqliteConversationStore,
    },
    handoff_whatsapp_business::WhatsAppBusinessOutbound,
};

/// Wire the store, responder and WhatsApp client together and serve the
/// gateway until Ctrl-C. The store is closed once the gateway stops.
pub async fn run(config: HandoffConfig) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let outbound = Arc::new(
        WhatsAppBusinessOutbound::new(&config.whatsapp)
            .context("failed to build WhatsApp client")?,
    );
    let responder = Arc::new(
        OpenAiCompatResponder::new(&config.responder)
            .context("failed to build automated responder")?,
    );
    let locks = Arc::new(SenderLocks::new());
    let settings = RoutingSettings::from_config(&config);

    let engine = Arc::new(RoutingEngine::new(
        Arc::clone(&store),
        responder,
        outbound.clone(),
        EscalationClassifier::from_config(&config.routing),
        settings.clone(),
        Arc::clone(&locks),
    ));
    let controller = Arc::new(HandoffController::new(
        Arc::clone(&store),
        outbound,
        locks,
        &settings,
    ));
    let state = GatewayState::new(&config, engine, controller);

    let served = start_gateway(&config.server.bind, config.server.port, state).await;
    store.close().await;
    info!("conversation store closed");
    served
}

async fn open_store(config: &HandoffConfig) -> anyhow::Result<Arc<dyn ConversationStore>> {
    let data_dir = handoff_config::data_dir(config);
    match config.storage.backend {
        StorageBackend::File => {
            let store = FileConversationStore::open(data_dir.clone())
                .await
                .with_context(|| format!("failed to open store in {}", data_dir.display()))?;
            info!(dir = %data_dir.display(), backend = "file", "conversation store ready");
            Ok(Arc::new(store))
        },
        StorageBackend::Sqlite => {
            let url = match &config.storage.database_url {
                Some(url) => url.clone(),
                None => {
                    tokio::fs::create_dir_all(&data_dir).await.with_context(|| {
                        format!("failed to create data directory {}", data_dir.display())
                    })?;
                    default_database_url(&data_dir)
                },
            };
            let store = SqliteConversationStore::connect(&url)
                .await
                .with_context(|| format!("failed to open database {url}"))?;
            info!(backend = "sqlite", "conversation store ready");
            Ok(Arc::new(store))
        },
    }
}

fn default_database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("handoff.db").display())
}
