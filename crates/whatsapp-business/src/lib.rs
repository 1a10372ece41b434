//! WhatsApp Business Cloud API channel.
//!
//! Parses inbound webhook payloads, verifies the subscription handshake and
//! `X-Hub-Signature-256` signatures, normalizes sender phone numbers into
//! deliverable addresses, and sends text replies through the Graph API.

pub mod outbound;
pub mod phone;
pub mod types;
pub mod webhook;

pub use {
    outbound::WhatsAppBusinessOutbound,
    phone::normalize_phone,
    types::{InboundText, WebhookPayload},
    webhook::{extract_text_messages, verify_signature, verify_webhook_subscription},
};
