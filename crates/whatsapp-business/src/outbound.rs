use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, warn},
};

use {
    handoff_channels::{ChannelOutbound, ChannelType, Error, Result},
    handoff_config::WhatsAppConfig,
};

/// Sends text messages through the WhatsApp Cloud API.
pub struct WhatsAppBusinessOutbound {
    http: reqwest::Client,
    messages_url: String,
    access_token: Secret<String>,
}

impl WhatsAppBusinessOutbound {
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::external("build whatsapp http client", e))?;
        let messages_url = format!(
            "{}/{}/{}/messages",
            config.api_base.trim_end_matches('/'),
            config.api_version.trim_matches('/'),
            config.phone_number_id,
        );
        Ok(Self {
            http,
            messages_url,
            access_token: config.access_token.clone(),
        })
    }

    fn payload(to: &str, text: &str, reply_to: Option<&str>) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": text },
        });
        if let Some(reply_to) = reply_to
            && let Some(obj) = payload.as_object_mut()
        {
            obj.insert(
                "context".into(),
                serde_json::json!({ "message_id": reply_to }),
            );
        }
        payload
    }
}

#[async_trait]
impl ChannelOutbound for WhatsAppBusinessOutbound {
    fn channel_type(&self) -> ChannelType {
        ChannelType::WhatsappBusiness
    }

    async fn send_text(&self, to: &str, text: &str, reply_to: Option<&str>) -> Result<()> {
        if to.is_empty() {
            return Err(Error::invalid_input("empty recipient"));
        }
        if self.access_token.expose_secret().is_empty() {
            return Err(Error::unavailable("whatsapp access token is not configured"));
        }

        let resp = self
            .http
            .post(&self.messages_url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&Self::payload(to, text, reply_to))
            .send()
            .await
            .map_err(|e| Error::external("send whatsapp message", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(to, status = status.as_u16(), "whatsapp send rejected");
            return Err(Error::rejected(status.as_u16(), body));
        }

        debug!(to, len = text.len(), "whatsapp message sent");
        Ok(())
    }
}
