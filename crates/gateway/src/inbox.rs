//! Read-only HTML view of escalated conversations.

use std::sync::Arc;

use {
    askama::Template,
    axum::{
        extract::State,
        http::StatusCode,
        response::{Html, IntoResponse, Response},
    },
    tracing::warn,
};

use handoff_sessions::{EscalatedConversation, MessageSender};

use crate::{api::ApiError, state::GatewayState};

#[derive(Template)]
#[template(path = "inbox.html", escape = "html")]
struct InboxTemplate {
    cards: Vec<InboxCard>,
}

struct InboxCard {
    sender_id: String,
    trigger_text: String,
    escalated_at: String,
    lines: Vec<TranscriptLine>,
}

struct TranscriptLine {
    class: &'static str,
    sender: String,
    text: String,
    at: String,
}

impl From<&EscalatedConversation> for InboxCard {
    fn from(conv: &EscalatedConversation) -> Self {
        Self {
            sender_id: conv.escalation.sender_id.clone(),
            trigger_text: conv.escalation.trigger_text.clone(),
            escalated_at: format_timestamp(conv.escalation.escalated_at),
            lines: conv
                .transcript
                .iter()
                .map(|msg| TranscriptLine {
                    class: match msg.sender {
                        MessageSender::Agent => "agent",
                        MessageSender::System => "system",
                        MessageSender::User | MessageSender::Assistant => "",
                    },
                    sender: msg.sender.to_string(),
                    text: msg.text.clone(),
                    at: format_timestamp(msg.created_at),
                })
                .collect(),
        }
    }
}

/// `GET /inbox`
pub async fn inbox_handler(State(state): State<Arc<GatewayState>>) -> Response {
    let list = match state.store.list_escalated().await {
        Ok(list) => list,
        Err(e) => return ApiError::from(e).into_response(),
    };
    match render_inbox(&list) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to render inbox template");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}

/// Render cards for `conversations`, newest escalation first.
pub fn render_inbox(conversations: &[EscalatedConversation]) -> Result<String, askama::Error> {
    InboxTemplate {
        cards: conversations.iter().rev().map(InboxCard::from).collect(),
    }
    .render()
}

fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default()
}
