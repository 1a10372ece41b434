use std::sync::Arc;

use {
    axum::{
        body::Body,
        extract::State,
        http::{Request, StatusCode, header},
        middleware::Next,
        response::{IntoResponse, Json, Response},
    },
    secrecy::ExposeSecret,
    tracing::debug,
};

use crate::state::GatewayState;

/// Middleware that protects the agent routes.
///
/// When no agent token is configured all requests pass through. Otherwise an
/// `Authorization: Bearer <token>` header must match it.
pub async fn require_agent_token(
    State(state): State<Arc<GatewayState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(ref expected) = state.agent_token else {
        return next.run(request).await;
    };

    let authorized =
        bearer_token(&request).is_some_and(|token| token_matches(token, expected.expose_secret()));
    if authorized {
        return next.run(request).await;
    }

    debug!(path = %request.uri().path(), "rejected unauthenticated agent request");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "not authenticated"})),
    )
        .into_response()
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

fn token_matches(given: &str, expected: &str) -> bool {
    !expected.is_empty()
        && given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0, |acc, (x, y)| acc | (x ^ y))
            == 0
}
