use super::client::{blob, int, json, opt_text, text, RowExt, SqliteClient};
use crate::types::{
    validate_importance, AppError, MemoryRecord, MemoryUpdate, NewMemory, Result, HIGH_IMPORTANCE,
};
use crate::utils::time::now_timestamp;
use libsql::{Row, Value};
use uuid::Uuid;

const MEMORY_COLUMNS: &str = "memory_id, timestamp_created, timestamp_updated, source_conversation_id, \
     source_message_ids, memory_type, content, importance_level, tags";

/// Optional filters shared by memory listing and search.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub min_importance: Option<i64>,
    pub max_importance: Option<i64>,
    pub memory_type: Option<String>,
}

impl MemoryFilter {
    /// Append `AND ...` clauses and their parameters.
    fn apply(&self, sql: &mut String, params: &mut Vec<Value>) {
        if let Some(min) = self.min_importance {
            params.push(int(min));
            sql.push_str(&format!(" AND importance_level >= ?{}", params.len()));
        }
        if let Some(max) = self.max_importance {
            params.push(int(max));
            sql.push_str(&format!(" AND importance_level <= ?{}", params.len()));
        }
        if let Some(ref memory_type) = self.memory_type {
            params.push(text(memory_type.as_str()));
            sql.push_str(&format!(" AND memory_type = ?{}", params.len()));
        }
    }
}

/// Curated long-term memories (`ai_memories.db`).
#[derive(Clone)]
pub struct MemoryStore {
    db: SqliteClient,
}

impl MemoryStore {
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
                "CREATE TABLE IF NOT EXISTS curated_memories (
                    memory_id TEXT PRIMARY KEY,
                    timestamp_created TEXT NOT NULL,
                    timestamp_updated TEXT NOT NULL,
                    source_conversation_id TEXT,
                    source_message_ids TEXT,
                    memory_type TEXT,
                    content TEXT NOT NULL,
                    importance_level INTEGER DEFAULT 5,
                    tags TEXT,
                    embedding BLOB
                );
                CREATE INDEX IF NOT EXISTS idx_memories_importance ON curated_memories(importance_level);
                CREATE INDEX IF NOT EXISTS idx_memories_type ON curated_memories(memory_type);
                CREATE INDEX IF NOT EXISTS idx_memories_created ON curated_memories(timestamp_created);",
            )
            .await
    }

    pub async fn create_memory(&self, memory: &NewMemory) -> Result<String> {
        if memory.content.trim().is_empty() {
            return Err(AppError::InvalidInput("content must not be empty".to_string()));
        }
        validate_importance("importance_level", memory.importance_level)?;

        let memory_id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        self.db
            .execute(
                "INSERT INTO curated_memories
                 (memory_id, timestamp_created, timestamp_updated, source_conversation_id,
                  source_message_ids, memory_type, content, importance_level, tags)
                 VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                vec![
                    text(memory_id.as_str()),
                    text(now),
                    opt_text(memory.source_conversation_id.as_deref()),
                    json(&memory.source_message_ids)?,
                    opt_text(memory.memory_type.as_deref()),
                    text(memory.content.as_str()),
                    int(memory.importance_level),
                    json(&memory.tags)?,
                ],
            )
            .await?;

        Ok(memory_id)
    }

    /// Apply the provided fields and bump `timestamp_updated`.
    pub async fn update_memory(&self, memory_id: &str, update: &MemoryUpdate) -> Result<MemoryRecord> {
        if let Some(ref content) = update.content {
            if content.trim().is_empty() {
                return Err(AppError::InvalidInput("content must not be empty".to_string()));
            }
        }
        if let Some(level) = update.importance_level {
            validate_importance("importance_level", level)?;
        }

        let mut params = vec![text(now_timestamp())];
        let mut sets = vec!["timestamp_updated = ?1".to_string()];
        if let Some(ref content) = update.content {
            params.push(text(content.as_str()));
            sets.push(format!("content = ?{}", params.len()));
            // Stale until re-embedded
            sets.push("embedding = NULL".to_string());
        }
        if let Some(level) = update.importance_level {
            params.push(int(level));
            sets.push(format!("importance_level = ?{}", params.len()));
        }
        if let Some(ref tags) = update.tags {
            params.push(json(tags)?);
            sets.push(format!("tags = ?{}", params.len()));
        }
        if let Some(ref memory_type) = update.memory_type {
            params.push(text(memory_type.as_str()));
            sets.push(format!("memory_type = ?{}", params.len()));
        }
        params.push(text(memory_id));
        let sql = format!(
            "UPDATE curated_memories SET {} WHERE memory_id = ?{}",
            sets.join(", "),
            params.len()
        );

        let changed = self.db.execute(&sql, params).await?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("Memory {} not found", memory_id)));
        }

        self.get_memory(memory_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Memory {} not found", memory_id)))
    }

    pub async fn get_memory(&self, memory_id: &str) -> Result<Option<MemoryRecord>> {
        self.db
            .query_opt(
                &format!("SELECT {} FROM curated_memories WHERE memory_id = ?1", MEMORY_COLUMNS),
                vec![text(memory_id)],
                map_memory,
            )
            .await
    }

    /// Most important first, then newest.
    pub async fn get_memories(&self, limit: usize, memory_type: Option<&str>) -> Result<Vec<MemoryRecord>> {
        let filter = MemoryFilter {
            memory_type: memory_type.map(str::to_string),
            ..Default::default()
        };
        let mut sql = format!("SELECT {} FROM curated_memories WHERE 1 = 1", MEMORY_COLUMNS);
        let mut params = Vec::new();
        filter.apply(&mut sql, &mut params);
        params.push(int(limit as i64));
        sql.push_str(&format!(
            " ORDER BY importance_level DESC, timestamp_created DESC LIMIT ?{}",
            params.len()
        ));
        self.db.query_map(&sql, params, map_memory).await
    }

    pub async fn memories_with_embeddings(&self, filter: &MemoryFilter) -> Result<Vec<(MemoryRecord, Vec<f32>)>> {
        let mut sql = format!(
            "SELECT {}, embedding FROM curated_memories WHERE embedding IS NOT NULL",
            MEMORY_COLUMNS
        );
        let mut params = Vec::new();
        filter.apply(&mut sql, &mut params);
        self.db
            .query_map(&sql, params, |row| {
                Ok((map_memory(row)?, row.embedding(9)?.unwrap_or_default()))
            })
            .await
    }

    /// Memories matching any of `words`, most important first.
    pub async fn text_search(&self, words: &[String], filter: &MemoryFilter, limit: usize) -> Result<Vec<MemoryRecord>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }
        let mut params: Vec<Value> = Vec::new();
        let clauses: Vec<String> = words
            .iter()
            .map(|word| {
                params.push(text(format!("%{}%", word)));
                format!("LOWER(content) LIKE ?{}", params.len())
            })
            .collect();
        let mut sql = format!(
            "SELECT {} FROM curated_memories WHERE ({})",
            MEMORY_COLUMNS,
            clauses.join(" OR ")
        );
        filter.apply(&mut sql, &mut params);
        params.push(int(limit as i64));
        sql.push_str(&format!(
            " ORDER BY importance_level DESC, timestamp_created DESC LIMIT ?{}",
            params.len()
        ));
        self.db.query_map(&sql, params, map_memory).await
    }

    /// Store the embedding of `content`. Nothing is written if the memory's
    /// content has changed since, and `false` is returned.
    pub async fn set_embedding(&self, memory_id: &str, content: &str, embedding: Vec<u8>) -> Result<bool> {
        let updated = self
            .db
            .execute(
                "UPDATE curated_memories SET embedding = ?1 WHERE memory_id = ?2 AND content = ?3",
                vec![blob(embedding), text(memory_id), text(content)],
            )
            .await?;
        Ok(updated > 0)
    }

    pub async fn memory_count(&self) -> Result<i64> {
        self.db.count("SELECT COUNT(*) FROM curated_memories", vec![]).await
    }

    pub async fn high_importance_count(&self) -> Result<i64> {
        self.db
            .count(
                "SELECT COUNT(*) FROM curated_memories WHERE importance_level >= ?1",
                vec![int(HIGH_IMPORTANCE)],
            )
            .await
    }
}

fn map_memory(row: &Row) -> Result<MemoryRecord> {
    Ok(MemoryRecord {
        memory_id: row.text(0)?,
        timestamp_created: row.text(1)?,
        timestamp_updated: row.text(2)?,
        source_conversation_id: row.opt_text(3)?,
        source_message_ids: row.string_list(4)?,
        memory_type: row.opt_text(5)?,
        content: row.text(6)?,
        importance_level: row.opt_int(7)?.unwrap_or(crate::types::DEFAULT_IMPORTANCE),
        tags: row.string_list(8)?,
    })
}
