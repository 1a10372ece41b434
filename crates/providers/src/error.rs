use handoff_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("responder is not configured: {message}")]
    NotConfigured { message: String },

    #[error("responder request failed ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("responder returned no reply")]
    EmptyReply,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

handoff_common::impl_context!();
