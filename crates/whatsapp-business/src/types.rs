//! WhatsApp Cloud API webhook payload types.
//!
//! Every field is defaulted so unexpected or partial payloads (status
//! callbacks, media messages, test pings) deserialize instead of failing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookPayload {
    pub object: String,
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookEntry {
    pub id: String,
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookChange {
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeValue {
    pub messaging_product: String,
    pub metadata: Option<Metadata>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub display_phone_number: String,
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub from: String,
    pub id: String,
    /// Unix seconds, as a decimal string.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextBody {
    pub body: String,
}

impl Message {
    /// The text body, for `type == "text"` messages only.
    pub fn text_body(&self) -> Option<&str> {
        if self.message_type != "text" {
            return None;
        }
        self.text.as_ref().map(|t| t.body.as_str())
    }

    /// Sent-at time in epoch milliseconds, if the timestamp parses.
    pub fn timestamp_ms(&self) -> Option<u64> {
        self.timestamp
            .parse::<u64>()
            .ok()
            .map(|secs| secs.saturating_mul(1000))
    }
}

/// A routable inbound text message extracted from a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    /// Provider message id (`wamid.*`), used to drop duplicate deliveries.
    pub message_id: Option<String>,
    /// Raw sender identifier as received.
    pub from: String,
    pub body: String,
    /// Epoch milliseconds, when the provider supplied one.
    pub sent_at: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_message() {
        let raw = serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "123",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": "5492910000000", "phone_number_id": "PNID"},
                        "contacts": [{"profile": {"name": "Ana"}, "wa_id": "5491122334455"}],
                        "messages": [{
                            "from": "5491122334455",
                            "id": "wamid.A",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": {"body": "Hola"}
                        }]
                    }
                }]
            }]
        });
        let payload: WebhookPayload = serde_json::from_value(raw).unwrap();
        let msg = &payload.entry[0].changes[0].value.messages[0];
        assert_eq!(msg.text_body(), Some("Hola"));
        assert_eq!(msg.timestamp_ms(), Some(1_700_000_000_000));
    }

    #[test]
    fn status_callbacks_deserialize() {
        let raw = serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{"changes": [{"field": "messages", "value": {"statuses": [{"id": "wamid.B"}]}}]}]
        });
        let payload: WebhookPayload = serde_json::from_value(raw).unwrap();
        assert!(payload.entry[0].changes[0].value.messages.is_empty());
    }

    #[test]
    fn non_text_message_has_no_body() {
        let msg = Message {
            message_type: "image".into(),
            text: Some(TextBody {
                body: "caption".into(),
            }),
            ..Default::default()
        };
        assert_eq!(msg.text_body(), None);
    }
}
