//! JSON endpoints for human agents.

use std::sync::Arc;

use {
    axum::{
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Json, Response},
    },
    serde::Deserialize,
    tracing::warn,
};

use {
    handoff_routing::Error as RoutingError,
    handoff_sessions::{EscalatedConversation, Error as StoreError},
};

use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub text: String,
}

/// Maps routing failures onto HTTP statuses.
pub struct ApiError(RoutingError);

impl From<RoutingError> for ApiError {
    fn from(err: RoutingError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(RoutingError::Store(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RoutingError::NotEscalated { .. } => StatusCode::NOT_FOUND,
            RoutingError::Escalated { .. } => StatusCode::CONFLICT,
            RoutingError::EmptyMessage => StatusCode::BAD_REQUEST,
            RoutingError::Delivery { .. } => StatusCode::BAD_GATEWAY,
            RoutingError::Store(_) | RoutingError::ReleaseIncomplete { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        };
        if status.is_server_error() {
            warn!(error = %self.0, "agent request failed");
        }
        let mut body = serde_json::json!({ "error": self.0.to_string() });
        if let RoutingError::ReleaseIncomplete {
            notice_delivered, ..
        } = &self.0
        {
            body["notice_delivered"] = serde_json::Value::Bool(*notice_delivered);
        }
        (status, Json(body)).into_response()
    }
}

/// `GET /api/conversations`: escalated conversations, oldest first.
pub async fn list_conversations(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<Vec<EscalatedConversation>>, ApiError> {
    Ok(Json(state.store.list_escalated().await?))
}

/// `GET /api/conversations/{id}`
pub async fn get_conversation(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<EscalatedConversation>, ApiError> {
    let escalation = state
        .store
        .escalation(&id)
        .await?
        .ok_or_else(|| RoutingError::not_escalated(&id))?;
    let transcript = state.store.transcript(&id).await?;
    Ok(Json(EscalatedConversation {
        escalation,
        transcript,
    }))
}

/// `POST /api/conversations/{id}/reply` with `{"text": "..."}`.
pub async fn reply(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    Json(req): Json<ReplyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.controller.send_as_agent(&id, &req.text).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/conversations/{id}/release`
pub async fn release(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<handoff_routing::ReleaseReport>, ApiError> {
    Ok(Json(state.controller.release_conversation(&id).await?))
}

/// `DELETE /api/conversations/{id}/history`: forget the automated-turn
/// history of a sender that is not escalated.
pub async fn clear_history(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let existed = state.controller.clear_history(&id).await?;
    Ok(Json(serde_json::json!({ "cleared": existed })))
}
