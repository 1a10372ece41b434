#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("conversation store failed: {0}")]
    Store(#[from] handoff_sessions::Error),

    #[error("conversation {sender_id} is not escalated")]
    NotEscalated { sender_id: String },

    #[error("conversation {sender_id} is escalated")]
    Escalated { sender_id: String },

    #[error("agent message is empty")]
    EmptyMessage,

    #[error("delivery to {to} failed: {source}")]
    Delivery {
        to: String,
        #[source]
        source: handoff_channels::Error,
    },

    /// The closing notice step ran but the store could not be cleared; the
    /// conversation is still escalated.
    #[error("release of {sender_id} incomplete (notice delivered: {notice_delivered}): {source}")]
    ReleaseIncomplete {
        sender_id: String,
        notice_delivered: bool,
        #[source]
        source: handoff_sessions::Error,
    },
}

impl Error {
    #[must_use]
    pub fn not_escalated(sender_id: impl Into<String>) -> Self {
        Self::NotEscalated {
            sender_id: sender_id.into(),
        }
    }

    #[must_use]
    pub fn escalated(sender_id: impl Into<String>) -> Self {
        Self::Escalated {
            sender_id: sender_id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
