//! Chat completions against any OpenAI-compatible endpoint.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, warn},
};

use handoff_config::ResponderConfig;

use crate::{
    AutomatedResponder, ResponderRequest,
    error::{Context, Error, Result},
};

pub struct OpenAiCompatResponder {
    http: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    model: String,
}

impl OpenAiCompatResponder {
    pub fn new(config: &ResponderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn body(&self, request: &ResponderRequest<'_>) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_text },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        })
    }
}

/// Extract `choices[0].message.content` from a completion response.
fn reply_text(payload: &serde_json::Value) -> Result<String> {
    let content = payload
        .get("choices")
        .and_then(serde_json::Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(serde_json::Value::as_str)
        .context("completion response has no message content")?;

    let content = content.trim();
    if content.is_empty() {
        return Err(Error::EmptyReply);
    }
    Ok(content.to_string())
}

#[async_trait]
impl AutomatedResponder for OpenAiCompatResponder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn respond(&self, request: ResponderRequest<'_>) -> Result<String> {
        if self.api_key.expose_secret().is_empty() {
            return Err(Error::not_configured("missing API key"));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.body(&request))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(model = %self.model, status = status.as_u16(), "completion request failed");
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value = resp.json().await?;
        let reply = reply_text(&payload)?;
        debug!(model = %self.model, len = reply.len(), "automated reply generated");
        Ok(reply)
    }
}
