//! HTTP surface: the WhatsApp webhook, the human-agent API, and the inbox
//! page.
//!
//! Routes:
//! - `GET /webhook` subscription handshake, `POST /webhook` inbound messages
//! - `GET /api/conversations[/{id}]`, `POST /api/conversations/{id}/reply`,
//!   `POST /api/conversations/{id}/release`
//! - `GET /inbox`
//! - `GET /health`

pub mod api;
pub mod auth_middleware;
pub mod inbox;
pub mod server;
pub mod state;
pub mod webhook;

pub use {
    server::{build_gateway_app, start_gateway},
    state::{GatewayState, WebhookSettings},
};
