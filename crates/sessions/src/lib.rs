//! Conversation storage: escalation markers and transcripts per sender.
//!
//! The [`ConversationStore`] trait is the single source of truth for whether
//! a sender is handled by the automated assistant or by a human. Two
//! backends are provided:
//! - [`FileConversationStore`]: `escalations.json` + `transcripts.json` in a
//!   data directory
//! - [`SqliteConversationStore`]: sqlx/SQLite with migrations

pub mod error;
pub mod file_store;
pub mod lock;
pub mod message;
pub mod sqlite_store;
pub mod store;

pub use {
    error::{Error, Result},
    file_store::FileConversationStore,
    lock::SenderLocks,
    message::{EscalatedConversation, EscalationRecord, MessageSender, TranscriptMessage},
    sqlite_store::SqliteConversationStore,
    store::ConversationStore,
};

/// Run database migrations for the conversation tables.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
