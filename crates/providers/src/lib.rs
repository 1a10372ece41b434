//! Automated responders: produce a reply to a user's message from a
//! business-knowledge system prompt.

pub mod error;
pub mod openai_compat;

use async_trait::async_trait;

pub use {
    error::{Error, Result},
    openai_compat::OpenAiCompatResponder,
};

/// One automated-reply request.
#[derive(Debug, Clone)]
pub struct ResponderRequest<'a> {
    pub system_prompt: &'a str,
    pub user_text: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Produces a candidate reply for an inbound message.
#[async_trait]
pub trait AutomatedResponder: Send + Sync {
    fn name(&self) -> &str;

    async fn respond(&self, request: ResponderRequest<'_>) -> Result<String>;
}
