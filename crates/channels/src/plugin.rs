use async_trait::async_trait;

use crate::Result;

/// Supported outbound channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    WhatsappBusiness,
}

impl ChannelType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhatsappBusiness => "whatsapp_business",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Send messages to a channel.
///
/// `to` is the canonical destination address for the channel (already
/// normalized). `reply_to` is an optional correlation token, e.g. the
/// inbound message id being answered.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    fn channel_type(&self) -> ChannelType;

    async fn send_text(&self, to: &str, text: &str, reply_to: Option<&str>) -> Result<()>;
}
