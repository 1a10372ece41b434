use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::{delete, get, post},
    },
    tower_http::trace::TraceLayer,
    tracing::info,
};

use crate::{api, auth_middleware::require_agent_token, inbox, state::GatewayState, webhook};

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let mut protected = Router::new()
        .route("/api/conversations", get(api::list_conversations))
        .route("/api/conversations/{id}", get(api::get_conversation))
        .route("/api/conversations/{id}/reply", post(api::reply))
        .route("/api/conversations/{id}/release", post(api::release))
        .route(
            "/api/conversations/{id}/history",
            delete(api::clear_history),
        );
    if state.inbox_enabled {
        protected = protected.route("/inbox", get(inbox::inbox_handler));
    }
    let protected = protected.layer(axum::middleware::from_fn_with_state(
        Arc::clone(&state),
        require_agent_token,
    ));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/webhook",
            get(webhook::verify_handler).post(webhook::receive_handler),
        )
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn start_gateway(bind: &str, port: u16, state: Arc<GatewayState>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    if state.agent_token.is_none() && !addr.ip().is_loopback() {
        tracing::warn!(%addr, "agent API is not protected by a token");
    }
    let app = build_gateway_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
    }))
}
