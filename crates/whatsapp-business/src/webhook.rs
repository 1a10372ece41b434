//! WhatsApp webhook handling.

use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
    tracing::{debug, warn},
};

use crate::types::{InboundText, WebhookPayload};

type HmacSha256 = Hmac<Sha256>;

/// Verify the webhook signature from WhatsApp.
///
/// The signature is sent in the `X-Hub-Signature-256` header as `sha256=<hex>`.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let expected = match signature_header.strip_prefix("sha256=") {
        Some(hex) => hex,
        None => {
            warn!("invalid signature header format (missing sha256= prefix)");
            return false;
        },
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("failed to create HMAC");
            return false;
        },
    };

    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&computed, &expected.to_ascii_lowercase())
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Verify webhook subscription (GET request).
///
/// WhatsApp sends a GET request with:
/// - `hub.mode=subscribe`
/// - `hub.verify_token=<your_verify_token>`
/// - `hub.challenge=<random_string>`
///
/// Returns `Some(challenge)` if verification succeeds.
pub fn verify_webhook_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    verify_token: &str,
) -> Option<String> {
    let mode = mode?;
    let token = token?;
    let challenge = challenge?;

    if mode == "subscribe" && !verify_token.is_empty() && constant_time_eq(token, verify_token) {
        Some(challenge.to_string())
    } else {
        None
    }
}

/// Collect the routable text messages from a webhook payload.
///
/// Non-message changes, non-text messages, empty bodies, and messages for a
/// different phone number id (when `phone_number_id` is set) are skipped.
pub fn extract_text_messages(
    payload: &WebhookPayload,
    phone_number_id: Option<&str>,
) -> Vec<InboundText> {
    let mut out = Vec::new();

    for entry in &payload.entry {
        for change in &entry.changes {
            if change.field != "messages" {
                debug!(field = %change.field, "ignoring non-message webhook");
                continue;
            }

            let value = &change.value;

            if let (Some(expected), Some(metadata)) = (phone_number_id, value.metadata.as_ref())
                && !expected.is_empty()
                && metadata.phone_number_id != expected
            {
                warn!(
                    expected,
                    received = %metadata.phone_number_id,
                    "phone number ID mismatch"
                );
                continue;
            }

            for msg in &value.messages {
                let body = match msg.text_body() {
                    Some(t) if !t.trim().is_empty() => t,
                    _ => {
                        debug!(msg_type = %msg.message_type, "ignoring non-text message");
                        continue;
                    },
                };
                if msg.from.is_empty() {
                    debug!("ignoring message without sender");
                    continue;
                }

                out.push(InboundText {
                    message_id: (!msg.id.is_empty()).then(|| msg.id.clone()),
                    from: msg.from.clone(),
                    body: body.to_string(),
                    sent_at: msg.timestamp_ms(),
                });
            }
        }
    }

    out
}
