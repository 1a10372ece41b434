use {
    anyhow::{Context, Result, bail},
    clap::Subcommand,
    secrecy::{ExposeSecret, Secret},
    serde_json::Value,
};

use {handoff_config::HandoffConfig, handoff_sessions::EscalatedConversation};

#[derive(Subcommand)]
pub enum ConversationAction {
    /// List conversations waiting for a human, oldest first.
    List,
    /// Show one escalated conversation with its transcript.
    Show { id: String },
    /// Reply to an escalated user as a human agent.
    Reply { id: String, text: String },
    /// Send the closing notice and hand the user back to the assistant.
    Release { id: String },
    /// Delete the automated-turn history of a sender that is not escalated.
    Forget { id: String },
}

pub async fn handle_conversations(
    config: &HandoffConfig,
    url: Option<String>,
    action: ConversationAction,
) -> Result<()> {
    let client = AgentClient::from_config(config, url)?;
    match action {
        ConversationAction::List => {
            let conversations = client.list().await?;
            if conversations.is_empty() {
                println!("No escalated conversations.");
            }
            for conv in &conversations {
                println!(
                    "{}  {}  {}",
                    conv.escalation.sender_id,
                    format_timestamp(conv.escalation.escalated_at),
                    conv.escalation.trigger_text
                );
            }
        },
        ConversationAction::Show { id } => {
            let conv = client.show(&id).await?;
            println!("Sender:    {}", conv.escalation.sender_id);
            println!("Escalated: {}", format_timestamp(conv.escalation.escalated_at));
            println!("Trigger:   {}\n", conv.escalation.trigger_text);
            for msg in &conv.transcript {
                println!(
                    "[{}] {}: {}",
                    format_timestamp(msg.created_at),
                    msg.sender,
                    msg.text
                );
            }
        },
        ConversationAction::Reply { id, text } => {
            client.reply(&id, &text).await?;
            println!("Sent to {id}.");
        },
        ConversationAction::Release { id } => {
            if client.release(&id).await? {
                println!("Released {id}.");
            } else {
                println!("Released {id}, but the closing notice was not delivered.");
            }
        },
        ConversationAction::Forget { id } => {
            if client.forget(&id).await? {
                println!("Forgot history of {id}.");
            } else {
                println!("No history stored for {id}.");
            }
        },
    }
    Ok(())
}

/// HTTP client for the gateway's agent API.
pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<Secret<String>>,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>, token: Option<Secret<String>>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Target `url` when given, else the configured listen address.
    pub fn from_config(config: &HandoffConfig, url: Option<String>) -> Result<Self> {
        let base_url = url.unwrap_or_else(|| {
            let host = match config.server.bind.as_str() {
                "0.0.0.0" | "::" => "127.0.0.1",
                other => other,
            };
            format!("http://{host}:{}", config.server.port)
        });
        if base_url.is_empty() {
            bail!("gateway URL is empty");
        }
        Ok(Self::new(base_url, config.gateway.agent_token.clone()))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("could not reach gateway at {}", self.base_url))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        match body.get("error").and_then(Value::as_str) {
            Some(message) => bail!("gateway returned {status}: {message}"),
            None => bail!("gateway returned {status}"),
        }
    }

    pub async fn list(&self) -> Result<Vec<EscalatedConversation>> {
        let resp = self
            .send(self.request(reqwest::Method::GET, "/api/conversations"))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn show(&self, id: &str) -> Result<EscalatedConversation> {
        let resp = self
            .send(self.request(reqwest::Method::GET, &format!("/api/conversations/{id}")))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn reply(&self, id: &str, text: &str) -> Result<()> {
        let req = self
            .request(
                reqwest::Method::POST,
                &format!("/api/conversations/{id}/reply"),
            )
            .json(&serde_json::json!({ "text": text }));
        self.send(req).await?;
        Ok(())
    }

    /// Returns whether the closing notice reached the user.
    pub async fn release(&self, id: &str) -> Result<bool> {
        let resp = self
            .send(self.request(
                reqwest::Method::POST,
                &format!("/api/conversations/{id}/release"),
            ))
            .await?;
        let body: Value = resp.json().await?;
        Ok(body
            .get("notice_delivered")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Returns whether any history was stored.
    pub async fn forget(&self, id: &str) -> Result<bool> {
        let resp = self
            .send(self.request(
                reqwest::Method::DELETE,
                &format!("/api/conversations/{id}/history"),
            ))
            .await?;
        let body: Value = resp.json().await?;
        Ok(body.get("cleared").and_then(Value::as_bool).unwrap_or(false))
    }
}

fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}
