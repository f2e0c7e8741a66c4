use super::client::{int, json, opt_json, opt_real, opt_text, real, text, RowExt, SqliteClient};
use crate::types::{
    AiReflection, DailyToolStats, NewToolCall, Result, ToolCallRecord, ToolCallStatus,
    ToolStatusCount, ToolUsageCount, ToolUsageSummary, UsagePattern,
};
use crate::utils::time::{days_ago, now_timestamp, today};
use libsql::Row;
use serde_json::Value as JsonValue;
use uuid::Uuid;

const CALL_COLUMNS: &str = "call_id, timestamp, client_id, tool_name, parameters, result, status, \
     execution_time_ms, error_message";

const REFLECTION_COLUMNS: &str = "reflection_id, timestamp_created, reflection_type, content, \
     insights, recommendations, confidence_level, source_period_days";

/// MCP tool-call telemetry and self-reflections (`mcp_tool_calls.db`).
#[derive(Clone)]
pub struct ToolCallStore {
    db: SqliteClient,
}

impl ToolCallStore {
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
                "CREATE TABLE IF NOT EXISTS tool_calls (
                    call_id TEXT PRIMARY KEY,
                    timestamp TEXT NOT NULL,
                    client_id TEXT,
                    tool_name TEXT NOT NULL,
                    parameters TEXT,
                    result TEXT,
                    status TEXT NOT NULL,
                    execution_time_ms REAL,
                    error_message TEXT
                );
                CREATE TABLE IF NOT EXISTS tool_usage_stats (
                    stat_id TEXT PRIMARY KEY,
                    tool_name TEXT NOT NULL,
                    date TEXT NOT NULL,
                    call_count INTEGER DEFAULT 0,
                    success_count INTEGER DEFAULT 0,
                    error_count INTEGER DEFAULT 0,
                    avg_execution_time_ms REAL DEFAULT 0,
                    UNIQUE(tool_name, date)
                );
                CREATE TABLE IF NOT EXISTS usage_patterns (
                    pattern_id TEXT PRIMARY KEY,
                    timestamp_created TEXT NOT NULL,
                    pattern_type TEXT NOT NULL,
                    description TEXT NOT NULL,
                    frequency INTEGER DEFAULT 1,
                    tools_involved TEXT,
                    confidence_score REAL DEFAULT 0.5
                );
                CREATE TABLE IF NOT EXISTS ai_reflections (
                    reflection_id TEXT PRIMARY KEY,
                    timestamp_created TEXT NOT NULL,
                    reflection_type TEXT NOT NULL,
                    content TEXT NOT NULL,
                    insights TEXT,
                    recommendations TEXT,
                    confidence_level REAL DEFAULT 0.5,
                    source_period_days INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_tool_calls_timestamp ON tool_calls(timestamp);
                CREATE INDEX IF NOT EXISTS idx_tool_calls_tool ON tool_calls(tool_name);
                CREATE INDEX IF NOT EXISTS idx_reflections_type ON ai_reflections(reflection_type);",
            )
            .await
    }

    /// Record a call and fold it into today's per-tool statistics.
    pub async fn log_tool_call(&self, call: &NewToolCall) -> Result<String> {
        let call_id = Uuid::new_v4().to_string();
        self.db
            .execute(
                "INSERT INTO tool_calls
                 (call_id, timestamp, client_id, tool_name, parameters, result, status,
                  execution_time_ms, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                vec![
                    text(call_id.as_str()),
                    text(now_timestamp()),
                    text(call.client_id.as_str()),
                    text(call.tool_name.as_str()),
                    json(&call.parameters)?,
                    opt_json(call.result.as_ref())?,
                    text(call.status.as_str()),
                    opt_real(call.execution_time_ms),
                    opt_text(call.error_message.as_deref()),
                ],
            )
            .await?;

        self.update_daily_stats(call).await?;
        Ok(call_id)
    }

    async fn update_daily_stats(&self, call: &NewToolCall) -> Result<()> {
        let (success, error) = match call.status {
            ToolCallStatus::Success => (1, 0),
            ToolCallStatus::Error => (0, 1),
        };
        let elapsed = call.execution_time_ms.unwrap_or(0.0);

        // Running mean over every call of the day
        self.db
            .execute(
                "INSERT INTO tool_usage_stats
                 (stat_id, tool_name, date, call_count, success_count, error_count, avg_execution_time_ms)
                 VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6)
                 ON CONFLICT(tool_name, date) DO UPDATE SET
                    call_count = call_count + 1,
                    success_count = success_count + excluded.success_count,
                    error_count = error_count + excluded.error_count,
                    avg_execution_time_ms =
                        (avg_execution_time_ms * call_count + excluded.avg_execution_time_ms)
                        / (call_count + 1)",
                vec![
                    text(Uuid::new_v4().to_string()),
                    text(call.tool_name.as_str()),
                    text(today()),
                    int(success),
                    int(error),
                    real(elapsed),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get_tool_usage_summary(&self, days: i64) -> Result<ToolUsageSummary> {
        let since = days_ago(days)?;

        let recent_calls = self
            .db
            .query_map(
                "SELECT tool_name, status, COUNT(*), AVG(execution_time_ms) FROM tool_calls
                 WHERE timestamp >= ?1
                 GROUP BY tool_name, status
                 ORDER BY COUNT(*) DESC, tool_name ASC",
                vec![text(since.as_str())],
                |row| {
                    Ok(ToolStatusCount {
                        tool_name: row.text(0)?,
                        status: ToolCallStatus::parse(&row.text(1)?),
                        count: row.int(2)?,
                        avg_execution_time_ms: row.opt_real(3)?,
                    })
                },
            )
            .await?;

        let since_date = &since[..10];
        let daily_stats = self
            .db
            .query_map(
                "SELECT tool_name, date, call_count, success_count, error_count, avg_execution_time_ms
                 FROM tool_usage_stats WHERE date >= ?1
                 ORDER BY date DESC, call_count DESC",
                vec![text(since_date)],
                |row| {
                    Ok(DailyToolStats {
                        tool_name: row.text(0)?,
                        date: row.text(1)?,
                        call_count: row.int(2)?,
                        success_count: row.int(3)?,
                        error_count: row.int(4)?,
                        avg_execution_time_ms: row.real(5)?,
                    })
                },
            )
            .await?;

        let most_used_tools = self
            .db
            .query_map(
                "SELECT tool_name, SUM(call_count) AS total FROM tool_usage_stats
                 WHERE date >= ?1
                 GROUP BY tool_name
                 ORDER BY total DESC, tool_name ASC
                 LIMIT 10",
                vec![text(since_date)],
                |row| {
                    Ok(ToolUsageCount {
                        tool_name: row.text(0)?,
                        total_calls: row.int(1)?,
                    })
                },
            )
            .await?;

        Ok(ToolUsageSummary {
            recent_calls,
            daily_stats,
            most_used_tools,
            period_days: days,
        })
    }

    /// Newest calls first, optionally for one tool.
    pub async fn get_tool_call_history(&self, tool_name: Option<&str>, limit: usize) -> Result<Vec<ToolCallRecord>> {
        match tool_name {
            Some(name) => {
                self.db
                    .query_map(
                        &format!(
                            "SELECT {} FROM tool_calls WHERE tool_name = ?1
                             ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
                            CALL_COLUMNS
                        ),
                        vec![text(name), int(limit as i64)],
                        map_call,
                    )
                    .await
            }
            None => {
                self.db
                    .query_map(
                        &format!(
                            "SELECT {} FROM tool_calls ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
                            CALL_COLUMNS
                        ),
                        vec![int(limit as i64)],
                        map_call,
                    )
                    .await
            }
        }
    }

    /// Calls made in the last `days` days, optionally for one client.
    pub async fn calls_since(&self, days: i64, client_id: Option<&str>) -> Result<Vec<ToolCallRecord>> {
        let mut sql = format!("SELECT {} FROM tool_calls WHERE timestamp >= ?1", CALL_COLUMNS);
        let mut params = vec![text(days_ago(days)?)];
        if let Some(client) = client_id {
            sql.push_str(" AND client_id = ?2");
            params.push(text(client));
        }
        sql.push_str(" ORDER BY timestamp ASC");
        self.db.query_map(&sql, params, map_call).await
    }

    pub async fn store_usage_pattern(
        &self,
        pattern_type: &str,
        description: &str,
        frequency: i64,
        tools_involved: &[String],
        confidence_score: f64,
    ) -> Result<String> {
        let pattern_id = Uuid::new_v4().to_string();
        self.db
            .execute(
                "INSERT INTO usage_patterns
                 (pattern_id, timestamp_created, pattern_type, description, frequency,
                  tools_involved, confidence_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                vec![
                    text(pattern_id.as_str()),
                    text(now_timestamp()),
                    text(pattern_type),
                    text(description),
                    int(frequency),
                    json(&tools_involved)?,
                    real(confidence_score),
                ],
            )
            .await?;
        Ok(pattern_id)
    }

    pub async fn get_usage_patterns(&self, limit: usize) -> Result<Vec<UsagePattern>> {
        self.db
            .query_map(
                "SELECT pattern_id, timestamp_created, pattern_type, description, frequency,
                        tools_involved, confidence_score
                 FROM usage_patterns ORDER BY timestamp_created DESC LIMIT ?1",
                vec![int(limit as i64)],
                |row| {
                    Ok(UsagePattern {
                        pattern_id: row.text(0)?,
                        timestamp_created: row.text(1)?,
                        pattern_type: row.text(2)?,
                        description: row.text(3)?,
                        frequency: row.opt_int(4)?.unwrap_or(1),
                        tools_involved: row.string_list(5)?,
                        confidence_score: row.real(6)?,
                    })
                },
            )
            .await
    }

    pub async fn store_reflection(
        &self,
        reflection_type: &str,
        content: &str,
        insights: &[String],
        recommendations: &[String],
        confidence_level: f64,
        source_period_days: i64,
    ) -> Result<String> {
        let reflection_id = Uuid::new_v4().to_string();
        self.db
            .execute(
                "INSERT INTO ai_reflections
                 (reflection_id, timestamp_created, reflection_type, content, insights,
                  recommendations, confidence_level, source_period_days)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                vec![
                    text(reflection_id.as_str()),
                    text(now_timestamp()),
                    text(reflection_type),
                    text(content),
                    json(&insights)?,
                    json(&recommendations)?,
                    real(confidence_level),
                    int(source_period_days),
                ],
            )
            .await?;
        Ok(reflection_id)
    }

    /// Newest reflections first, optionally of one type.
    pub async fn get_reflections(&self, limit: usize, reflection_type: Option<&str>) -> Result<Vec<AiReflection>> {
        let (sql, params) = match reflection_type {
            Some(kind) => (
                format!(
                    "SELECT {} FROM ai_reflections WHERE reflection_type = ?1
                     ORDER BY timestamp_created DESC, rowid DESC LIMIT ?2",
                    REFLECTION_COLUMNS
                ),
                vec![text(kind), int(limit as i64)],
            ),
            None => (
                format!(
                    "SELECT {} FROM ai_reflections ORDER BY timestamp_created DESC, rowid DESC LIMIT ?1",
                    REFLECTION_COLUMNS
                ),
                vec![int(limit as i64)],
            ),
        };
        self.db
            .query_map(&sql, params, |row| {
                Ok(AiReflection {
                    reflection_id: row.text(0)?,
                    timestamp_created: row.text(1)?,
                    reflection_type: row.text(2)?,
                    content: row.text(3)?,
                    insights: row.string_list(4)?,
                    recommendations: row.string_list(5)?,
                    confidence_level: row.real(6)?,
                    source_period_days: row.opt_int(7)?.unwrap_or(0),
                })
            })
            .await
    }

    pub async fn call_count(&self) -> Result<i64> {
        self.db.count("SELECT COUNT(*) FROM tool_calls", vec![]).await
    }
}

fn map_call(row: &Row) -> Result<ToolCallRecord> {
    Ok(ToolCallRecord {
        call_id: row.text(0)?,
        timestamp: row.text(1)?,
        client_id: row.opt_text(2)?.unwrap_or_else(|| "unknown".to_string()),
        tool_name: row.text(3)?,
        parameters: row.opt_json(4)?.unwrap_or(JsonValue::Null),
        result: row.opt_json(5)?,
        status: ToolCallStatus::parse(&row.text(6)?),
        execution_time_ms: row.opt_real(7)?,
        error_message: row.opt_text(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> ToolCallStore {
        ToolCallStore::new(SqliteClient::new_memory().await.unwrap())
            .await
            .unwrap()
    }

    fn call(tool: &str, ok: bool, ms: f64) -> NewToolCall {
        let mut call = if ok {
            NewToolCall::success(tool, json!({"q": "x"}))
        } else {
            NewToolCall::error(tool, json!({"q": "x"}), "boom")
        };
        call.execution_time_ms = Some(ms);
        call
    }

    #[tokio::test]
    async fn test_daily_stats_running_average() {
        let store = store().await;
        store.log_tool_call(&call("search_memories", true, 100.0)).await.unwrap();
        store.log_tool_call(&call("search_memories", true, 200.0)).await.unwrap();
        store.log_tool_call(&call("search_memories", false, 300.0)).await.unwrap();

        let summary = store.get_tool_usage_summary(7).await.unwrap();
        assert_eq!(summary.daily_stats.len(), 1);
        let stats = &summary.daily_stats[0];
        assert_eq!(stats.call_count, 3);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.error_count, 1);
        assert!((stats.avg_execution_time_ms - 200.0).abs() < 1e-9);
        assert_eq!(summary.most_used_tools[0].total_calls, 3);
        assert_eq!(summary.period_days, 7);
    }

    #[tokio::test]
    async fn test_summary_groups_by_status() {
        let store = store().await;
        store.log_tool_call(&call("a", true, 1.0)).await.unwrap();
        store.log_tool_call(&call("a", true, 1.0)).await.unwrap();
        store.log_tool_call(&call("a", false, 1.0)).await.unwrap();
        store.log_tool_call(&call("b", true, 1.0)).await.unwrap();

        let summary = store.get_tool_usage_summary(7).await.unwrap();
        assert_eq!(summary.recent_calls.len(), 3);
        assert_eq!(summary.recent_calls[0].tool_name, "a");
        assert_eq!(summary.recent_calls[0].status, ToolCallStatus::Success);
        assert_eq!(summary.recent_calls[0].count, 2);
    }

    #[tokio::test]
    async fn test_history_filter_and_order() {
        let store = store().await;
        store.log_tool_call(&call("a", true, 1.0)).await.unwrap();
        store.log_tool_call(&call("b", false, 2.0)).await.unwrap();
        store.log_tool_call(&call("a", true, 3.0)).await.unwrap();

        let history = store.get_tool_call_history(Some("a"), 50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].execution_time_ms, Some(3.0));

        let all = store.get_tool_call_history(None, 2).await.unwrap();
        assert_eq!(all.len(), 2);
        let failed = store.get_tool_call_history(Some("b"), 50).await.unwrap();
        assert_eq!(failed[0].status, ToolCallStatus::Error);
        assert_eq!(failed[0].error_message.as_deref(), Some("boom"));
        assert_eq!(failed[0].parameters, json!({"q": "x"}));
    }

    #[tokio::test]
    async fn test_calls_since_client_filter() {
        let store = store().await;
        let mut mine = call("a", true, 1.0);
        mine.client_id = "vscode".into();
        store.log_tool_call(&mine).await.unwrap();
        store.log_tool_call(&call("a", true, 1.0)).await.unwrap();

        assert_eq!(store.calls_since(7, None).await.unwrap().len(), 2);
        assert_eq!(store.calls_since(7, Some("vscode")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reflections_and_patterns() {
        let store = store().await;
        store
            .store_reflection("tool_usage_analysis", "All good", &["i1".into()], &["r1".into(), "r2".into()], 0.8, 7)
            .await
            .unwrap();
        store
            .store_reflection("other", "Other", &[], &[], 0.5, 1)
            .await
            .unwrap();
        store
            .store_usage_pattern("peak_usage", "search dominates", 12, &["search_memories".into()], 0.9)
            .await
            .unwrap();

        let analyses = store.get_reflections(10, Some("tool_usage_analysis")).await.unwrap();
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].recommendations.len(), 2);
        assert_eq!(analyses[0].source_period_days, 7);
        assert_eq!(store.get_reflections(10, None).await.unwrap().len(), 2);

        let patterns = store.get_usage_patterns(5).await.unwrap();
        assert_eq!(patterns[0].tools_involved, vec!["search_memories"]);
    }
}
