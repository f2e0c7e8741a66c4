//! Database maintenance: retention, deduplication, optimization and
//! schema upgrades across the five memory databases.

pub mod scheduler;

pub use scheduler::AutoMaintenance;

use crate::db::{bytes_to_mb, DatabaseStats, SqliteClient, Stores};
use crate::types::Result;
use crate::utils::time::{days_ago, now_timestamp};
use crate::utils::toml_config::{ConfigManager, RetentionPolicy};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::db::client::{int, text, RowExt};

/// Memory types never removed by retention.
const PROTECTED_MEMORY_TYPES: &str = "('safety', 'critical', 'preference')";

/// Conversations holding an important message, or at least ten messages.
const PRESERVED_CONVERSATIONS: &str = "conversation_id IN (
        SELECT DISTINCT conversation_id FROM messages
        WHERE CASE WHEN json_valid(metadata)
              THEN CAST(json_extract(metadata, '$.importance_level') AS INTEGER) >= 7
                   OR json_extract(metadata, '$.preserve') IN (1, 'true')
              ELSE 0 END
    )
    OR (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = conversations.conversation_id) >= 10";

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationCleanup {
    pub cutoff_date: String,
    pub conversations_before: i64,
    pub conversations_after: i64,
    pub conversations_deleted: i64,
    pub messages_before: i64,
    pub messages_after: i64,
    pub messages_deleted: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryCleanup {
    pub cutoff_date: String,
    pub memories_before: i64,
    pub memories_after: i64,
    pub memories_deleted: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleCleanup {
    pub cutoff_date: String,
    pub old_appointments_deleted: u64,
    pub old_reminders_deleted: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCallCleanup {
    pub cutoff_date: String,
    pub tool_calls_before: i64,
    pub tool_calls_after: i64,
    pub tool_calls_deleted: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub conversations: ConversationCleanup,
    pub curated_memories: MemoryCleanup,
    pub schedule: ScheduleCleanup,
    pub mcp_tool_calls: ToolCallCleanup,
    pub duplicate_messages_removed: u64,
}

impl CleanupReport {
    pub fn items_cleaned(&self) -> i64 {
        self.conversations.messages_deleted
            + self.conversations.conversations_deleted
            + self.curated_memories.memories_deleted
            + self.schedule.old_appointments_deleted as i64
            + self.schedule.old_reminders_deleted as i64
            + self.mcp_tool_calls.tool_calls_deleted
            + self.duplicate_messages_removed as i64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub optimized: bool,
    pub size_before_mb: f64,
    pub size_after_mb: f64,
    pub space_saved_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceReport {
    pub maintenance_timestamp: String,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub schema_upgrades: Vec<String>,
    pub cleanup_results: CleanupReport,
    pub optimization_results: BTreeMap<&'static str, OptimizationResult>,
    pub statistics: BTreeMap<&'static str, DatabaseStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MaintenanceReport {
    pub fn total_space_saved_mb(&self) -> f64 {
        let total: f64 = self.optimization_results.values().map(|r| r.space_saved_mb).sum();
        (total * 100.0).round() / 100.0
    }

    pub fn items_cleaned(&self) -> i64 {
        self.cleanup_results.items_cleaned()
    }
}

/// Runs maintenance passes over a set of stores.
#[derive(Clone)]
pub struct DatabaseMaintenance {
    stores: Stores,
    config: ConfigManager,
    last_run: Arc<Mutex<Option<Instant>>>,
}

impl DatabaseMaintenance {
    pub fn new(stores: Stores, config: ConfigManager) -> Self {
        Self {
            stores,
            config,
            last_run: Arc::new(Mutex::new(None)),
        }
    }

    /// Run a full pass. Without `force`, a pass within
    /// `maintenance.min_interval_minutes` of the previous one is skipped.
    ///
    /// A failing step stops the pass and is reported in `error`.
    pub async fn run_maintenance(&self, force: bool) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            maintenance_timestamp: now_timestamp(),
            ..Default::default()
        };

        let min_interval = self.config.config().maintenance.min_interval_minutes.max(0) as u64;
        if !force {
            if let Some(last) = *self.last_run.lock() {
                if last.elapsed() < Duration::from_secs(min_interval * 60) {
                    report.skipped = true;
                    report.reason = Some(format!(
                        "Maintenance ran less than {} minutes ago",
                        min_interval
                    ));
                    return report;
                }
            }
        }

        info!(force, "Starting database maintenance");
        if let Err(e) = self.run_steps(&mut report).await {
            error!("Database maintenance failed: {}", e);
            report.error = Some(e.to_string());
        } else {
            info!(
                items_cleaned = report.items_cleaned(),
                space_saved_mb = report.total_space_saved_mb(),
                "Database maintenance completed"
            );
        }
        *self.last_run.lock() = Some(Instant::now());
        report
    }

    async fn run_steps(&self, report: &mut MaintenanceReport) -> Result<()> {
        report.schema_upgrades = self.upgrade_schemas().await?;

        let retention = self.config.config().retention.clone();
        report.cleanup_results.conversations = self.cleanup_conversations(&retention.conversations).await?;
        report.cleanup_results.curated_memories = self.cleanup_memories(&retention.curated_memories).await?;
        report.cleanup_results.schedule = self.cleanup_schedule(&retention.schedule).await?;
        report.cleanup_results.mcp_tool_calls = self.cleanup_tool_calls(&retention.tool_calls).await?;
        report.cleanup_results.duplicate_messages_removed = self.remove_duplicate_messages().await?;

        report.optimization_results = self.optimize_databases().await;
        report.statistics = self.stores.statistics().await?;
        Ok(())
    }

    /// Add columns that databases created by older versions lack.
    pub async fn upgrade_schemas(&self) -> Result<Vec<String>> {
        let mut applied = Vec::new();

        let projects = self.stores.projects.client();
        if !projects
            .column_exists("development_conversations", "source_metadata")
            .await?
        {
            projects
                .execute("ALTER TABLE development_conversations ADD COLUMN source_metadata TEXT", vec![])
                .await?;
            info!("Added source_metadata column to development_conversations");
            applied.push("added_source_metadata_column".to_string());
        }

        let conversations = self.stores.conversations.client();
        if !conversations.column_exists("messages", "source_type").await? {
            conversations
                .execute(
                    "ALTER TABLE messages ADD COLUMN source_type TEXT DEFAULT 'unknown'",
                    vec![],
                )
                .await?;
            info!("Added source_type column to messages");
            applied.push("added_messages_source_type_column".to_string());
        }

        Ok(applied)
    }

    pub async fn cleanup_conversations(&self, policy: &RetentionPolicy) -> Result<ConversationCleanup> {
        let db = self.stores.conversations.client();
        let cutoff = days_ago(policy.max_age_days)?;
        let conversations_before = db.count("SELECT COUNT(*) FROM conversations", vec![]).await?;
        let messages_before = db.count("SELECT COUNT(*) FROM messages", vec![]).await?;

        let preserve = if policy.preserve_important {
            format!(" AND NOT ({})", PRESERVED_CONVERSATIONS)
        } else {
            String::new()
        };
        let expired = db
            .query_map(
                &format!(
                    "SELECT conversation_id FROM conversations WHERE start_timestamp < ?1{}",
                    preserve
                ),
                vec![text(cutoff.as_str())],
                |row| row.text(0),
            )
            .await?;
        for id in &expired {
            delete_conversation(db, id).await?;
        }

        db.execute(
            "DELETE FROM messages WHERE conversation_id NOT IN (SELECT conversation_id FROM conversations)",
            vec![],
        )
        .await?;

        if let Some(max_count) = policy.max_count {
            let total = db.count("SELECT COUNT(*) FROM messages", vec![]).await?;
            let mut excess = total - max_count;
            if excess > 0 {
                let oldest = db
                    .query_map(
                        &format!(
                            "SELECT conversation_id,
                                    (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = conversations.conversation_id)
                             FROM conversations WHERE 1 = 1{}
                             ORDER BY start_timestamp ASC",
                            preserve
                        ),
                        vec![],
                        |row| Ok((row.text(0)?, row.int(1)?)),
                    )
                    .await?;
                for (id, messages) in oldest {
                    if excess <= 0 {
                        break;
                    }
                    delete_conversation(db, &id).await?;
                    excess -= messages;
                }
            }
        }

        let conversations_after = db.count("SELECT COUNT(*) FROM conversations", vec![]).await?;
        let messages_after = db.count("SELECT COUNT(*) FROM messages", vec![]).await?;
        Ok(ConversationCleanup {
            cutoff_date: cutoff,
            conversations_before,
            conversations_after,
            conversations_deleted: conversations_before - conversations_after,
            messages_before,
            messages_after,
            messages_deleted: messages_before - messages_after,
        })
    }

    pub async fn cleanup_memories(&self, policy: &RetentionPolicy) -> Result<MemoryCleanup> {
        let db = self.stores.memories.client();
        let cutoff = days_ago(policy.max_age_days)?;
        let memories_before = db.count("SELECT COUNT(*) FROM curated_memories", vec![]).await?;

        // NOT IN leaves rows with a NULL type alone
        let expendable = if policy.preserve_important {
            format!(
                " AND importance_level < 5 AND memory_type NOT IN {}",
                PROTECTED_MEMORY_TYPES
            )
        } else {
            String::new()
        };

        db.execute(
            &format!(
                "DELETE FROM curated_memories WHERE timestamp_created < ?1{}",
                expendable
            ),
            vec![text(cutoff.as_str())],
        )
        .await?;

        if let Some(max_count) = policy.max_count {
            let excess = db.count("SELECT COUNT(*) FROM curated_memories", vec![]).await? - max_count;
            if excess > 0 {
                db.execute(
                    &format!(
                        "DELETE FROM curated_memories WHERE memory_id IN (
                            SELECT memory_id FROM curated_memories WHERE 1 = 1{}
                            ORDER BY timestamp_created ASC LIMIT ?1
                        )",
                        expendable
                    ),
                    vec![int(excess)],
                )
                .await?;
            }
        }

        let memories_after = db.count("SELECT COUNT(*) FROM curated_memories", vec![]).await?;
        Ok(MemoryCleanup {
            cutoff_date: cutoff,
            memories_before,
            memories_after,
            memories_deleted: memories_before - memories_after,
        })
    }

    pub async fn cleanup_schedule(&self, policy: &RetentionPolicy) -> Result<ScheduleCleanup> {
        let db = self.stores.schedule.client();
        let cutoff = days_ago(policy.max_age_days)?;

        let old_appointments_deleted = db
            .execute(
                "DELETE FROM appointments WHERE scheduled_datetime < ?1",
                vec![text(cutoff.as_str())],
            )
            .await?;
        let old_reminders_deleted = if policy.cleanup_completed {
            db.execute(
                "DELETE FROM reminders WHERE due_datetime < ?1 AND completed = 1",
                vec![text(cutoff.as_str())],
            )
            .await?
        } else {
            0
        };

        Ok(ScheduleCleanup {
            cutoff_date: cutoff,
            old_appointments_deleted,
            old_reminders_deleted,
        })
    }

    pub async fn cleanup_tool_calls(&self, policy: &RetentionPolicy) -> Result<ToolCallCleanup> {
        let db = self.stores.tool_calls.client();
        let cutoff = days_ago(policy.max_age_days)?;
        let tool_calls_before = db.count("SELECT COUNT(*) FROM tool_calls", vec![]).await?;

        db.execute(
            "DELETE FROM tool_calls WHERE timestamp < ?1",
            vec![text(cutoff.as_str())],
        )
        .await?;

        if let Some(max_count) = policy.max_count {
            let excess = db.count("SELECT COUNT(*) FROM tool_calls", vec![]).await? - max_count;
            if excess > 0 {
                db.execute(
                    "DELETE FROM tool_calls WHERE call_id IN (
                        SELECT call_id FROM tool_calls ORDER BY timestamp ASC LIMIT ?1
                    )",
                    vec![int(excess)],
                )
                .await?;
            }
        }

        let tool_calls_after = db.count("SELECT COUNT(*) FROM tool_calls", vec![]).await?;
        Ok(ToolCallCleanup {
            cutoff_date: cutoff,
            tool_calls_before,
            tool_calls_after,
            tool_calls_deleted: tool_calls_before - tool_calls_after,
        })
    }

    /// Remove messages repeating content, role and conversation within the
    /// same minute, keeping the first inserted.
    pub async fn remove_duplicate_messages(&self) -> Result<u64> {
        self.stores
            .conversations
            .client()
            .execute(
                "DELETE FROM messages WHERE rowid NOT IN (
                    SELECT MIN(rowid) FROM messages
                    GROUP BY content, role, conversation_id, substr(timestamp, 1, 16)
                )",
                vec![],
            )
            .await
    }

    /// `VACUUM`, `REINDEX` and `ANALYZE` every database. Failures are
    /// reported per database and do not stop the others.
    pub async fn optimize_databases(&self) -> BTreeMap<&'static str, OptimizationResult> {
        let mut results = BTreeMap::new();
        for (name, client) in self.stores.clients() {
            let before = client.file_size().await as i64;
            let outcome = client.execute_batch("VACUUM; REINDEX; ANALYZE;").await;
            let after = client.file_size().await as i64;

            let error = match outcome {
                Ok(()) => None,
                Err(e) => {
                    warn!(database = name, "Optimization failed: {}", e);
                    Some(e.to_string())
                }
            };
            results.insert(
                name,
                OptimizationResult {
                    optimized: error.is_none(),
                    size_before_mb: bytes_to_mb(before),
                    size_after_mb: bytes_to_mb(after),
                    space_saved_mb: bytes_to_mb(before - after),
                    error,
                },
            );
        }
        results
    }
}

async fn delete_conversation(db: &SqliteClient, conversation_id: &str) -> Result<()> {
    db.execute(
        "DELETE FROM messages WHERE conversation_id = ?1",
        vec![text(conversation_id)],
    )
    .await?;
    db.execute(
        "DELETE FROM conversations WHERE conversation_id = ?1",
        vec![text(conversation_id)],
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageRole, NewMemory, NewMessage, NewToolCall};
    use crate::utils::toml_config::{MemoriaConfig, RetentionConfig};

    async fn maintenance() -> (DatabaseMaintenance, Stores) {
        let stores = Stores::open_in_memory().await.unwrap();
        let config = ConfigManager::from_config(MemoriaConfig::default());
        (DatabaseMaintenance::new(stores.clone(), config), stores)
    }

    async fn backdate_conversation(stores: &Stores, conversation_id: &str, days: i64) {
        stores
            .conversations
            .client()
            .execute(
                "UPDATE conversations SET start_timestamp = ?1 WHERE conversation_id = ?2",
                vec![text(days_ago(days).unwrap()), text(conversation_id)],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_old_conversations_removed_unless_important() {
        let (maintenance, stores) = maintenance().await;

        let old = stores
            .conversations
            .store_message(&NewMessage::new(MessageRole::User, "stale chatter"), 0)
            .await
            .unwrap();
        let kept = stores
            .conversations
            .store_message(
                &NewMessage::new(MessageRole::User, "my blood type is O-")
                    .with_metadata(serde_json::json!({"importance_level": 9})),
                0,
            )
            .await
            .unwrap();
        backdate_conversation(&stores, old.conversation_id.as_deref().unwrap(), 200).await;
        backdate_conversation(&stores, kept.conversation_id.as_deref().unwrap(), 200).await;

        let policy = RetentionConfig::standard().conversations;
        let result = maintenance.cleanup_conversations(&policy).await.unwrap();

        assert_eq!(result.conversations_deleted, 1);
        assert_eq!(result.messages_deleted, 1);
        assert!(stores.conversations.get_message(&kept.message_id).await.unwrap().is_some());
        assert!(stores.conversations.get_message(&old.message_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conversation_max_count_trims_oldest() {
        let (maintenance, stores) = maintenance().await;
        let first = stores
            .conversations
            .store_message(&NewMessage::new(MessageRole::User, "first"), 0)
            .await
            .unwrap();
        backdate_conversation(&stores, first.conversation_id.as_deref().unwrap(), 2).await;
        stores
            .conversations
            .store_message(&NewMessage::new(MessageRole::User, "second"), 0)
            .await
            .unwrap();

        let policy = RetentionPolicy {
            max_count: Some(1),
            ..RetentionConfig::standard().conversations
        };
        let result = maintenance.cleanup_conversations(&policy).await.unwrap();
        assert_eq!(result.messages_after, 1);
        assert!(stores.conversations.get_message(&first.message_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_cleanup_spares_protected_types() {
        let (maintenance, stores) = maintenance().await;
        let trivial = stores
            .memories
            .create_memory(&NewMemory::new("likes the color teal").of_type("trivia").importance(2))
            .await
            .unwrap();
        let safety = stores
            .memories
            .create_memory(&NewMemory::new("allergic to penicillin").of_type("safety").importance(2))
            .await
            .unwrap();
        stores
            .memories
            .client()
            .execute(
                "UPDATE curated_memories SET timestamp_created = ?1",
                vec![text(days_ago(400).unwrap())],
            )
            .await
            .unwrap();

        let result = maintenance
            .cleanup_memories(&RetentionConfig::standard().curated_memories)
            .await
            .unwrap();
        assert_eq!(result.memories_deleted, 1);
        assert!(stores.memories.get_memory(&trivial).await.unwrap().is_none());
        assert!(stores.memories.get_memory(&safety).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tool_call_max_count() {
        let (maintenance, stores) = maintenance().await;
        for _ in 0..5 {
            stores
                .tool_calls
                .log_tool_call(&NewToolCall::success("search_memories", serde_json::json!({})))
                .await
                .unwrap();
        }
        let policy = RetentionPolicy {
            max_age_days: 30,
            max_count: Some(3),
            preserve_important: false,
            cleanup_completed: false,
        };
        let result = maintenance.cleanup_tool_calls(&policy).await.unwrap();
        assert_eq!(result.tool_calls_before, 5);
        assert_eq!(result.tool_calls_after, 3);
    }

    #[tokio::test]
    async fn test_duplicate_messages_removed() {
        let (maintenance, stores) = maintenance().await;
        let first = stores
            .conversations
            .store_message(&NewMessage::new(MessageRole::User, "echo").in_conversation("c1"), 0)
            .await
            .unwrap();
        stores
            .conversations
            .store_message(&NewMessage::new(MessageRole::User, "echo").in_conversation("c1"), 0)
            .await
            .unwrap();

        let removed = maintenance.remove_duplicate_messages().await.unwrap();
        assert_eq!(removed, 1);
        assert!(stores.conversations.get_message(&first.message_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_schema_upgrades_are_idempotent() {
        let (maintenance, _stores) = maintenance().await;
        assert!(maintenance.upgrade_schemas().await.unwrap().is_empty());
        assert!(maintenance.upgrade_schemas().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_min_interval_skips_unless_forced() {
        let (maintenance, _stores) = maintenance().await;
        let first = maintenance.run_maintenance(false).await;
        assert!(!first.skipped);
        assert!(first.error.is_none(), "{:?}", first.error);
        assert_eq!(first.statistics.len(), 5);

        let second = maintenance.run_maintenance(false).await;
        assert!(second.skipped);

        let forced = maintenance.run_maintenance(true).await;
        assert!(!forced.skipped);
    }
}
