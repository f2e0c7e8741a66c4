pub mod client;
pub mod conversations;
pub mod memories;
pub mod projects;
pub mod schedule;
pub mod tool_calls;

pub use client::SqliteClient;
pub use conversations::ConversationStore;
pub use memories::{MemoryFilter, MemoryStore};
pub use projects::ProjectStore;
pub use schedule::ScheduleStore;
pub use tool_calls::ToolCallStore;

use crate::types::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub const CONVERSATIONS_DB: &str = "conversations.db";
pub const AI_MEMORIES_DB: &str = "ai_memories.db";
pub const SCHEDULE_DB: &str = "schedule.db";
pub const PROJECTS_DB: &str = "vscode_project.db";
pub const TOOL_CALLS_DB: &str = "mcp_tool_calls.db";

/// Size and row counts of one database.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub path: String,
    pub size_mb: f64,
    pub counts: BTreeMap<&'static str, i64>,
}

/// Bytes to megabytes, rounded to two decimals.
pub fn bytes_to_mb(bytes: i64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}

/// The five databases that make up a memory data directory.
#[derive(Clone)]
pub struct Stores {
    pub conversations: ConversationStore,
    pub memories: MemoryStore,
    pub schedule: ScheduleStore,
    pub projects: ProjectStore,
    pub tool_calls: ToolCallStore,
}

impl Stores {
    /// Open (creating as needed) every database under `data_dir`.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let stores = Self {
            conversations: ConversationStore::new(SqliteClient::new_local(dir.join(CONVERSATIONS_DB)).await?)
                .await?,
            memories: MemoryStore::new(SqliteClient::new_local(dir.join(AI_MEMORIES_DB)).await?).await?,
            schedule: ScheduleStore::new(SqliteClient::new_local(dir.join(SCHEDULE_DB)).await?).await?,
            projects: ProjectStore::new(SqliteClient::new_local(dir.join(PROJECTS_DB)).await?).await?,
            tool_calls: ToolCallStore::new(SqliteClient::new_local(dir.join(TOOL_CALLS_DB)).await?).await?,
        };

        info!(data_dir = %dir.display(), "Memory databases ready");
        Ok(stores)
    }

    /// Fully in-memory stores for tests and throwaway sessions.
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conversations: ConversationStore::new(SqliteClient::new_memory().await?).await?,
            memories: MemoryStore::new(SqliteClient::new_memory().await?).await?,
            schedule: ScheduleStore::new(SqliteClient::new_memory().await?).await?,
            projects: ProjectStore::new(SqliteClient::new_memory().await?).await?,
            tool_calls: ToolCallStore::new(SqliteClient::new_memory().await?).await?,
        })
    }

    /// `(name, client)` for each database, in a stable order.
    pub fn clients(&self) -> [(&'static str, &SqliteClient); 5] {
        [
            ("conversations", self.conversations.client()),
            ("ai_memories", self.memories.client()),
            ("schedule", self.schedule.client()),
            ("vscode_project", self.projects.client()),
            ("mcp_tool_calls", self.tool_calls.client()),
        ]
    }

    /// Row counts and file size for every database, keyed by name.
    pub async fn statistics(&self) -> Result<BTreeMap<&'static str, DatabaseStats>> {
        let mut stats = BTreeMap::new();
        for (name, client) in self.clients() {
            let counts: BTreeMap<&'static str, i64> = match name {
                "conversations" => BTreeMap::from([
                    ("message_count", self.conversations.message_count().await?),
                    ("session_count", self.conversations.session_count().await?),
                ]),
                "ai_memories" => BTreeMap::from([
                    ("memory_count", self.memories.memory_count().await?),
                    ("high_importance_count", self.memories.high_importance_count().await?),
                ]),
                "schedule" => BTreeMap::from([
                    ("appointment_count", self.schedule.appointment_count().await?),
                    ("reminder_count", self.schedule.reminder_count().await?),
                ]),
                "vscode_project" => BTreeMap::from([
                    ("session_count", self.projects.session_count().await?),
                    ("insight_count", self.projects.insight_count().await?),
                ]),
                _ => BTreeMap::from([("tool_call_count", self.tool_calls.call_count().await?)]),
            };
            stats.insert(
                name,
                DatabaseStats {
                    path: client.display_path(),
                    size_mb: bytes_to_mb(client.file_size().await as i64),
                    counts,
                },
            );
        }
        Ok(stats)
    }
}
