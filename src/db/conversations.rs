use super::client::{blob, int, opt_json, opt_text, text, RowExt, SqliteClient};
use crate::types::{MessageRole, NewMessage, Result, StoreMessageOutcome, StoredMessage};
use crate::utils::time::{minutes_ago, now_timestamp};
use libsql::{Row, Value};
use tracing::debug;
use uuid::Uuid;

/// Context recorded on sessions created implicitly by `store_message`.
pub const AUTO_SESSION_CONTEXT: &str = "auto-created";

const MESSAGE_COLUMNS: &str = "m.message_id, m.conversation_id, c.session_id, m.timestamp, \
     m.role, m.content, m.metadata, m.source_type";

/// Sessions, conversations and messages (`conversations.db`).
#[derive(Clone)]
pub struct ConversationStore {
    db: SqliteClient,
}

impl ConversationStore {
    pub async fn new(db: SqliteClient) -> Result<Self> {
        let store = Self { db };
        store.initialize_schema().await?;
        Ok(store)
    }

    pub fn client(&self) -> &SqliteClient {
        &self.db
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    session_id TEXT PRIMARY KEY,
                    start_timestamp TEXT NOT NULL,
                    end_timestamp TEXT,
                    context TEXT,
                    embedding BLOB,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS conversations (
                    conversation_id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    start_timestamp TEXT NOT NULL,
                    end_timestamp TEXT,
                    topic_summary TEXT,
                    embedding BLOB,
                    FOREIGN KEY (session_id) REFERENCES sessions(session_id)
                );
                CREATE TABLE IF NOT EXISTS messages (
                    message_id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    metadata TEXT,
                    source_type TEXT DEFAULT 'unknown',
                    embedding BLOB,
                    FOREIGN KEY (conversation_id) REFERENCES conversations(conversation_id)
                );
                CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);
                CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);
                CREATE INDEX IF NOT EXISTS idx_conversations_session ON conversations(session_id);",
            )
            .await
    }

    /// Persist a message, creating its session and conversation as needed.
    ///
    /// A message repeating the role and content of one stored in the same
    /// session within `duplicate_window_minutes` is not stored again; the
    /// existing id comes back with `duplicate = true`.
    pub async fn store_message(
        &self,
        message: &NewMessage,
        duplicate_window_minutes: i64,
    ) -> Result<StoreMessageOutcome> {
        if let Some(ref session_id) = message.session_id {
            if let Some(existing) = self
                .find_recent_duplicate(session_id, message.role, &message.content, duplicate_window_minutes)
                .await?
            {
                debug!(message_id = %existing, "Duplicate message skipped");
                return Ok(StoreMessageOutcome {
                    message_id: existing,
                    conversation_id: None,
                    session_id: session_id.clone(),
                    duplicate: true,
                });
            }
        }

        let now = now_timestamp();
        let session_id = match message.session_id {
            Some(ref id) => id.clone(),
            None => Uuid::new_v4().to_string(),
        };
        self.ensure_session(&session_id, &now).await?;

        let conversation_id = match message.conversation_id {
            Some(ref id) => id.clone(),
            None => Uuid::new_v4().to_string(),
        };
        self.ensure_conversation(&conversation_id, &session_id, &now)
            .await?;

        let message_id = Uuid::new_v4().to_string();
        self.db
            .execute(
                "INSERT INTO messages
                 (message_id, conversation_id, timestamp, role, content, metadata, source_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                vec![
                    text(message_id.as_str()),
                    text(conversation_id.as_str()),
                    text(now.as_str()),
                    text(message.role.as_str()),
                    text(message.content.as_str()),
                    opt_json(message.metadata.as_ref())?,
                    text(message.source_type.as_deref().unwrap_or("unknown")),
                ],
            )
            .await?;

        Ok(StoreMessageOutcome {
            message_id,
            conversation_id: Some(conversation_id),
            session_id,
            duplicate: false,
        })
    }

    async fn find_recent_duplicate(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
        window_minutes: i64,
    ) -> Result<Option<String>> {
        if window_minutes <= 0 {
            return Ok(None);
        }
        self.db
            .query_opt(
                "SELECT m.message_id FROM messages m
                 JOIN conversations c ON m.conversation_id = c.conversation_id
                 WHERE c.session_id = ?1 AND m.role = ?2 AND m.content = ?3 AND m.timestamp > ?4
                 ORDER BY m.timestamp DESC LIMIT 1",
                vec![
                    text(session_id),
                    text(role.as_str()),
                    text(content),
                    text(minutes_ago(window_minutes)?),
                ],
                |row| row.text(0),
            )
            .await
    }

    async fn ensure_session(&self, session_id: &str, now: &str) -> Result<()> {
        self.db
            .execute(
                "INSERT OR IGNORE INTO sessions (session_id, start_timestamp, context, created_at)
                 VALUES (?1, ?2, ?3, ?2)",
                vec![text(session_id), text(now), text(AUTO_SESSION_CONTEXT)],
            )
            .await?;
        Ok(())
    }

    async fn ensure_conversation(&self, conversation_id: &str, session_id: &str, now: &str) -> Result<()> {
        self.db
            .execute(
                "INSERT OR IGNORE INTO conversations (conversation_id, session_id, start_timestamp)
                 VALUES (?1, ?2, ?3)",
                vec![text(conversation_id), text(session_id), text(now)],
            )
            .await?;
        Ok(())
    }

    /// Newest messages first, optionally restricted to one session.
    pub async fn get_recent_messages(&self, limit: usize, session_id: Option<&str>) -> Result<Vec<StoredMessage>> {
        let mut sql = format!(
            "SELECT {} FROM messages m JOIN conversations c ON m.conversation_id = c.conversation_id",
            MESSAGE_COLUMNS
        );
        let mut params = Vec::new();
        if let Some(session_id) = session_id {
            sql.push_str(" WHERE c.session_id = ?1");
            params.push(text(session_id));
        }
        sql.push_str(&format!(
            " ORDER BY m.timestamp DESC, m.rowid DESC LIMIT ?{}",
            params.len() + 1
        ));
        params.push(int(limit as i64));

        self.db.query_map(&sql, params, map_message).await
    }

    pub async fn get_message(&self, message_id: &str) -> Result<Option<StoredMessage>> {
        self.db
            .query_opt(
                &format!(
                    "SELECT {} FROM messages m JOIN conversations c ON m.conversation_id = c.conversation_id
                     WHERE m.message_id = ?1",
                    MESSAGE_COLUMNS
                ),
                vec![text(message_id)],
                map_message,
            )
            .await
    }

    /// Messages of one conversation in the order they were written.
    pub async fn get_conversation_messages(&self, conversation_id: &str) -> Result<Vec<StoredMessage>> {
        self.db
            .query_map(
                &format!(
                    "SELECT {} FROM messages m JOIN conversations c ON m.conversation_id = c.conversation_id
                     WHERE m.conversation_id = ?1 ORDER BY m.timestamp ASC, m.rowid ASC",
                    MESSAGE_COLUMNS
                ),
                vec![text(conversation_id)],
                map_message,
            )
            .await
    }

    /// The newest `limit` messages that carry an embedding.
    pub async fn messages_with_embeddings(&self, limit: usize) -> Result<Vec<(StoredMessage, Vec<f32>)>> {
        self.db
            .query_map(
                &format!(
                    "SELECT {}, m.embedding FROM messages m
                     JOIN conversations c ON m.conversation_id = c.conversation_id
                     WHERE m.embedding IS NOT NULL
                     ORDER BY m.timestamp DESC LIMIT ?1",
                    MESSAGE_COLUMNS
                ),
                vec![int(limit as i64)],
                |row| Ok((map_message(row)?, row.embedding(8)?.unwrap_or_default())),
            )
            .await
    }

    /// Messages whose content contains any of `words` (case-insensitive).
    pub async fn text_search(&self, words: &[String], limit: usize) -> Result<Vec<StoredMessage>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }
        let mut params: Vec<Value> = Vec::new();
        let clauses: Vec<String> = words
            .iter()
            .map(|word| {
                params.push(text(format!("%{}%", word)));
                format!("LOWER(m.content) LIKE ?{}", params.len())
            })
            .collect();
        params.push(int(limit as i64));

        let sql = format!(
            "SELECT {} FROM messages m JOIN conversations c ON m.conversation_id = c.conversation_id
             WHERE {} ORDER BY m.timestamp DESC LIMIT ?{}",
            MESSAGE_COLUMNS,
            clauses.join(" OR "),
            params.len()
        );
        self.db.query_map(&sql, params, map_message).await
    }

    pub async fn set_embedding(&self, message_id: &str, embedding: Vec<u8>) -> Result<()> {
        self.db
            .execute(
                "UPDATE messages SET embedding = ?1 WHERE message_id = ?2",
                vec![blob(embedding), text(message_id)],
            )
            .await?;
        Ok(())
    }

    /// Conversation a stored message belongs to.
    pub async fn conversation_of_message(&self, message_id: &str) -> Result<Option<String>> {
        self.db
            .query_opt(
                "SELECT conversation_id FROM messages WHERE message_id = ?1",
                vec![text(message_id)],
                |row| row.text(0),
            )
            .await
    }

    /// Close a conversation with an optional summary.
    pub async fn end_conversation(&self, conversation_id: &str, topic_summary: Option<&str>) -> Result<bool> {
        let n = self
            .db
            .execute(
                "UPDATE conversations SET end_timestamp = ?1, topic_summary = COALESCE(?2, topic_summary)
                 WHERE conversation_id = ?3",
                vec![text(now_timestamp()), opt_text(topic_summary), text(conversation_id)],
            )
            .await?;
        Ok(n > 0)
    }

    pub async fn message_count(&self) -> Result<i64> {
        self.db.count("SELECT COUNT(*) FROM messages", vec![]).await
    }

    pub async fn session_count(&self) -> Result<i64> {
        self.db.count("SELECT COUNT(*) FROM sessions", vec![]).await
    }
}

fn map_message(row: &Row) -> Result<StoredMessage> {
    Ok(StoredMessage {
        message_id: row.text(0)?,
        conversation_id: row.text(1)?,
        session_id: row.text(2)?,
        timestamp: row.text(3)?,
        role: MessageRole::parse_lenient(&row.text(4)?),
        content: row.text(5)?,
        metadata: row.opt_json(6)?,
        source_type: row.opt_text(7)?,
    })
}
