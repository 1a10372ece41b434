//! SQLite-backed conversation store using sqlx.

use {
    async_trait::async_trait,
    sqlx::{Row, Sqlite, SqlitePool, Transaction, sqlite::SqlitePoolOptions},
};

use crate::{
    Result,
    message::{EscalatedConversation, EscalationRecord, TranscriptMessage},
    store::ConversationStore,
};

/// SQLite-backed persistence for escalation markers and transcripts.
///
/// Multi-row changes (escalate with messages, release) run in a single
/// transaction so readers see either the old or the new state.
pub struct SqliteConversationStore {
    pool: SqlitePool,
}

impl SqliteConversationStore {
    /// Create a new store with its own connection pool and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        crate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn insert_escalation(
    tx: &mut Transaction<'_, Sqlite>,
    sender_id: &str,
    trigger_text: &str,
    escalated_at: u64,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO escalations (sender_id, trigger_text, escalated_at) VALUES (?, ?, ?)
         ON CONFLICT(sender_id) DO NOTHING",
    )
    .bind(sender_id)
    .bind(trigger_text)
    .bind(to_sql_int(escalated_at))
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn insert_message(
    tx: &mut Transaction<'_, Sqlite>,
    sender_id: &str,
    message: &TranscriptMessage,
) -> Result<()> {
    let last: Option<i64> =
        sqlx::query_scalar("SELECT MAX(created_at) FROM transcript_messages WHERE sender_id = ?")
            .bind(sender_id)
            .fetch_one(&mut **tx)
            .await?;
    let created_at = to_sql_int(message.created_at);
    let created_at = last.map_or(created_at, |last| last.max(created_at));
    sqlx::query(
        "INSERT INTO transcript_messages (sender_id, sender, text, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(sender_id)
    .bind(message.sender.as_str())
    .bind(&message.text)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn row_to_escalation(row: &sqlx::sqlite::SqliteRow) -> EscalationRecord {
    EscalationRecord {
        sender_id: row.get("sender_id"),
        trigger_text: row.get("trigger_text"),
        escalated_at: u64::try_from(row.get::<i64, _>("escalated_at")).unwrap_or_default(),
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn is_escalated(&self, sender_id: &str) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM escalations WHERE sender_id = ?")
                .bind(sender_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn escalate(
        &self,
        sender_id: &str,
        trigger_text: &str,
        escalated_at: u64,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let created = insert_escalation(&mut tx, sender_id, trigger_text, escalated_at).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn append_message(&self, sender_id: &str, message: TranscriptMessage) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_message(&mut tx, sender_id, &message).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_escalation(
        &self,
        sender_id: &str,
        trigger_text: &str,
        escalated_at: u64,
        messages: Vec<TranscriptMessage>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let created = insert_escalation(&mut tx, sender_id, trigger_text, escalated_at).await?;
        for message in &messages {
            insert_message(&mut tx, sender_id, message).await?;
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn trim_transcript(&self, sender_id: &str, keep: usize) -> Result<usize> {
        let removed = sqlx::query(
            "DELETE FROM transcript_messages WHERE sender_id = ? AND id NOT IN (
                SELECT id FROM transcript_messages WHERE sender_id = ?
                ORDER BY id DESC LIMIT ?
             )",
        )
        .bind(sender_id)
        .bind(sender_id)
        .bind(i64::try_from(keep).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(usize::try_from(removed).unwrap_or(usize::MAX))
    }

    async fn release(&self, sender_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM escalations WHERE sender_id = ?")
            .bind(sender_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM transcript_messages WHERE sender_id = ?")
            .bind(sender_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn escalation(&self, sender_id: &str) -> Result<Option<EscalationRecord>> {
        let row = sqlx::query(
            "SELECT sender_id, trigger_text, escalated_at FROM escalations WHERE sender_id = ?",
        )
        .bind(sender_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_escalation))
    }

    async fn transcript(&self, sender_id: &str) -> Result<Vec<TranscriptMessage>> {
        let rows = sqlx::query(
            "SELECT sender, text, created_at FROM transcript_messages
             WHERE sender_id = ? ORDER BY id",
        )
        .bind(sender_id)
        .fetch_all(&self.pool)
        .await?;

        let mut transcript = Vec::with_capacity(rows.len());
        for row in rows {
            let sender: String = row.get("sender");
            transcript.push(TranscriptMessage {
                sender: sender.parse()?,
                text: row.get("text"),
                created_at: u64::try_from(row.get::<i64, _>("created_at")).unwrap_or_default(),
            });
        }
        Ok(transcript)
    }

    async fn list_escalated(&self) -> Result<Vec<EscalatedConversation>> {
        let rows = sqlx::query(
            "SELECT sender_id, trigger_text, escalated_at FROM escalations
             ORDER BY escalated_at, seq",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut list = Vec::with_capacity(rows.len());
        for row in &rows {
            let escalation = row_to_escalation(row);
            let transcript = self.transcript(&escalation.sender_id).await?;
            list.push(EscalatedConversation {
                escalation,
                transcript,
            });
        }
        Ok(list)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::message::MessageSender};

    const SENDER: &str = "5491122334455";

    // Every `sqlite::memory:` connection is its own database; pin the pool
    // to one.
    async fn test_store() -> SqliteConversationStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::run_migrations(&pool).await.unwrap();
        SqliteConversationStore::with_pool(pool)
    }

    #[tokio::test]
    async fn unknown_sender_is_not_escalated() {
        let store = test_store().await;
        assert!(!store.is_escalated(SENDER).await.unwrap());
        assert!(store.escalation(SENDER).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn escalate_twice_keeps_one_record() {
        let store = test_store().await;
        assert!(store.escalate(SENDER, "asesor", 1).await.unwrap());
        assert!(!store.escalate(SENDER, "humano", 2).await.unwrap());

        let list = store.list_escalated().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].escalation.trigger_text, "asesor");
        assert!(list[0].transcript.is_empty());
    }

    #[tokio::test]
    async fn record_escalation_appends_in_order() {
        let store = test_store().await;
        store
            .record_escalation(
                SENDER,
                "2x3",
                5,
                vec![
                    TranscriptMessage::new(MessageSender::User, "2x3", 5),
                    TranscriptMessage::new(MessageSender::Assistant, "Derivo tu consulta", 4),
                ],
            )
            .await
            .unwrap();

        let transcript = store.transcript(SENDER).await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].sender, MessageSender::User);
        assert_eq!(transcript[1].sender, MessageSender::Assistant);
        assert_eq!(transcript[1].created_at, 5);
    }

    #[tokio::test]
    async fn release_clears_everything() {
        let store = test_store().await;
        store
            .record_escalation(
                SENDER,
                "asesor",
                1,
                vec![TranscriptMessage::new(MessageSender::User, "asesor", 1)],
            )
            .await
            .unwrap();

        assert!(store.release(SENDER).await.unwrap());
        assert!(!store.is_escalated(SENDER).await.unwrap());
        assert!(store.transcript(SENDER).await.unwrap().is_empty());
        assert!(!store.release(SENDER).await.unwrap());
    }

    #[tokio::test]
    async fn list_orders_oldest_first() {
        let store = test_store().await;
        store.escalate("b", "x", 20).await.unwrap();
        store.escalate("a", "x", 10).await.unwrap();
        store.escalate("c", "x", 20).await.unwrap();

        let ids: Vec<String> = store
            .list_escalated()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.escalation.sender_id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn trim_keeps_newest_entries() {
        let store = test_store().await;
        for i in 0..4 {
            store
                .append_message(
                    SENDER,
                    TranscriptMessage::new(MessageSender::User, format!("m{i}"), i),
                )
                .await
                .unwrap();
        }
        store
            .append_message("otro", TranscriptMessage::new(MessageSender::User, "x", 1))
            .await
            .unwrap();

        assert_eq!(store.trim_transcript(SENDER, 1).await.unwrap(), 3);
        let transcript = store.transcript(SENDER).await.unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].text, "m3");
        assert_eq!(store.transcript("otro").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn close_shuts_the_pool() {
        let store = test_store().await;
        store.close().await;
        assert!(store.is_escalated(SENDER).await.is_err());
    }
}
