use std::sync::Arc;

use {
    axum::{
        body::Bytes,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
    },
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::{debug, error, info, warn},
};

use handoff_whatsapp_business::{
    WebhookPayload, extract_text_messages, verify_signature, verify_webhook_subscription,
};

use crate::state::GatewayState;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// `GET /webhook`: echo the challenge when the verify token matches.
pub async fn verify_handler(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match verify_webhook_subscription(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
        state.webhook.verify_token.expose_secret(),
    ) {
        Some(challenge) => {
            info!("webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        },
        None => {
            warn!(mode = ?params.mode, "webhook subscription rejected");
            StatusCode::FORBIDDEN.into_response()
        },
    }
}

/// `POST /webhook`: route every text message in the payload.
///
/// Always acknowledges with 200 so the provider does not redeliver, except
/// for signature failures. Routing runs on its own task; the response waits
/// for it up to the ack timeout and then returns while it keeps running.
pub async fn receive_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(ref secret) = state.webhook.app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(&body, signature, secret.expose_secret()) {
            warn!("webhook signature verification failed");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "ignoring malformed webhook payload");
            return StatusCode::OK.into_response();
        },
    };

    let messages = extract_text_messages(&payload, Some(&state.webhook.phone_number_id));
    if messages.is_empty() {
        return StatusCode::OK.into_response();
    }

    let engine = Arc::clone(&state.engine);
    let task = tokio::spawn(async move {
        for msg in messages {
            let sender_id = msg.from.clone();
            if let Err(e) = engine.handle_inbound(msg.into()).await {
                error!(sender_id = %sender_id, error = %e, "failed to route inbound message");
            }
        }
    });

    match tokio::time::timeout(state.ack_timeout, task).await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => error!(error = %e, "routing task panicked"),
        Err(_) => warn!(
            timeout_ms = u64::try_from(state.ack_timeout.as_millis()).unwrap_or(u64::MAX),
            "routing still running, acknowledging webhook"
        ),
    }
    StatusCode::OK.into_response()
}
