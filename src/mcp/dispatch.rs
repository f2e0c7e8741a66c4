//! Name-based tool dispatch shared by the MCP server and the CLI.
//!
//! Every call is timed and recorded in the tool-call log, whether it
//! succeeds or not.

use super::params::*;
use crate::db::MemoryFilter;
use crate::memory::MemorySystem;
use crate::search::{SearchRequest, SearchScope};
use crate::types::{
    AppError, MemoryUpdate, MessageRole, NewAppointment, NewCodeContext, NewDevelopmentConversation,
    NewDevelopmentSession, NewMemory, NewMessage, NewProjectInsight, NewReminder, NewToolCall, Result,
    DEFAULT_IMPORTANCE,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Every tool name the dispatcher answers to.
pub const TOOL_NAMES: &[&str] = &[
    "search_memories",
    "store_conversation",
    "create_memory",
    "store_memory",
    "update_memory",
    "get_recent_context",
    "create_appointment",
    "create_reminder",
    "complete_reminder",
    "get_upcoming_schedule",
    "get_system_health",
    "get_tool_usage_summary",
    "get_tool_call_history",
    "reflect_on_tool_usage",
    "get_ai_insights",
    "run_database_maintenance",
    "save_development_session",
    "store_development_conversation",
    "store_project_insight",
    "search_project_history",
    "link_code_context",
    "get_project_continuity",
];

const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_RECENT_LIMIT: usize = 5;
const DEFAULT_HISTORY_LIMIT: usize = 50;
const DEFAULT_INSIGHT_LIMIT: usize = 5;
const DEFAULT_DAYS: i64 = 7;

#[derive(Clone)]
pub struct ToolDispatcher {
    system: Arc<MemorySystem>,
    client_id: Option<String>,
}

impl ToolDispatcher {
    pub fn new(system: Arc<MemorySystem>) -> Self {
        Self { system, client_id: None }
    }

    /// Record calls under this client id instead of `[mcp].client_id`.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn system(&self) -> &Arc<MemorySystem> {
        &self.system
    }

    fn client_id(&self) -> String {
        match self.client_id {
            Some(ref id) => id.clone(),
            None => self.system.config().config().mcp.client_id.clone(),
        }
    }

    /// Run a tool by name and log the call.
    ///
    /// A failure to write the log entry is reported but never fails the call.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        let started = Instant::now();
        let outcome = self.execute(name, args.clone()).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut record = match outcome {
            Ok(ref value) => NewToolCall {
                result: Some(value.clone()),
                ..NewToolCall::success(name, args)
            },
            Err(ref e) => NewToolCall::error(name, args, e.to_string()),
        };
        record.client_id = self.client_id();
        record.execution_time_ms = Some(elapsed_ms);

        if let Err(e) = self.system.log_tool_call(record).await {
            warn!(tool = name, "Failed to log tool call: {}", e);
        }
        debug!(tool = name, elapsed_ms, ok = outcome.is_ok(), "Tool call finished");
        outcome
    }

    async fn execute(&self, name: &str, args: Value) -> Result<Value> {
        match name {
            "search_memories" => self.search_memories(decode(args)?).await,
            "store_conversation" => self.store_conversation(decode(args)?).await,
            "create_memory" | "store_memory" => self.create_memory(decode(args)?).await,
            "update_memory" => self.update_memory(decode(args)?).await,
            "get_recent_context" => {
                let p: RecentContextParams = decode(args)?;
                let messages = self
                    .system
                    .get_recent_context(p.limit.unwrap_or(DEFAULT_RECENT_LIMIT), p.session_id.as_deref())
                    .await?;
                success(json!({ "count": messages.len(), "messages": messages }))
            }
            "create_appointment" => {
                let p: CreateAppointmentParams = decode(args)?;
                let (appointment_id, scheduled_datetime) = self
                    .system
                    .create_appointment(NewAppointment {
                        title: p.title,
                        scheduled_datetime: p.scheduled_datetime,
                        description: p.description,
                        location: p.location,
                        source_conversation_id: p.source_conversation_id,
                    })
                    .await?;
                success(json!({
                    "appointment_id": appointment_id,
                    "scheduled_datetime": scheduled_datetime,
                }))
            }
            "create_reminder" => {
                let p: CreateReminderParams = decode(args)?;
                let (reminder_id, due_datetime) = self
                    .system
                    .create_reminder(NewReminder {
                        content: p.content,
                        due_datetime: p.due_datetime,
                        priority_level: p.priority_level.unwrap_or(DEFAULT_IMPORTANCE),
                        source_conversation_id: p.source_conversation_id,
                    })
                    .await?;
                success(json!({ "reminder_id": reminder_id, "due_datetime": due_datetime }))
            }
            "complete_reminder" => {
                let p: CompleteReminderParams = decode(args)?;
                self.system.complete_reminder(&p.reminder_id).await?;
                success(json!({ "reminder_id": p.reminder_id, "completed": true }))
            }
            "get_upcoming_schedule" => {
                let p: UpcomingScheduleParams = decode(args)?;
                let schedule = self
                    .system
                    .get_upcoming_schedule(p.days_ahead.unwrap_or(DEFAULT_DAYS))
                    .await?;
                success(schedule)
            }
            "get_system_health" => {
                let _: EmptyParams = decode(args)?;
                Ok(serde_json::to_value(self.system.get_system_health().await)?)
            }
            "get_tool_usage_summary" => {
                let p: DaysParams = decode(args)?;
                let summary = self
                    .system
                    .get_tool_usage_summary(p.days.unwrap_or(DEFAULT_DAYS))
                    .await?;
                success(summary)
            }
            "get_tool_call_history" => {
                let p: ToolHistoryParams = decode(args)?;
                let calls = self
                    .system
                    .get_tool_call_history(p.tool_name.as_deref(), p.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
                    .await?;
                success(json!({ "count": calls.len(), "tool_calls": calls }))
            }
            "reflect_on_tool_usage" => {
                let p: ReflectParams = decode(args)?;
                let reflection = self
                    .system
                    .reflect_on_tool_usage(p.days.unwrap_or(DEFAULT_DAYS), p.client_id.as_deref())
                    .await?;
                success(reflection)
            }
            "get_ai_insights" => {
                let p: AiInsightsParams = decode(args)?;
                let insights = self
                    .system
                    .get_ai_insights(p.limit.unwrap_or(DEFAULT_INSIGHT_LIMIT), p.insight_type.as_deref())
                    .await?;
                success(json!({ "count": insights.len(), "insights": insights }))
            }
            "run_database_maintenance" => {
                let p: MaintenanceParams = decode(args)?;
                let report = self
                    .system
                    .run_database_maintenance(p.force.unwrap_or(false))
                    .await;
                let status = if report.error.is_some() { "error" } else { "success" };
                let mut value = serde_json::to_value(report)?;
                if let Value::Object(ref mut map) = value {
                    map.insert("status".to_string(), Value::from(status));
                }
                Ok(value)
            }
            "save_development_session" => {
                let p: DevelopmentSessionParams = decode(args)?;
                let session_id = self
                    .system
                    .save_development_session(NewDevelopmentSession {
                        workspace_path: p.workspace_path,
                        active_files: p.active_files.unwrap_or_default(),
                        git_branch: p.git_branch,
                        session_summary: p.session_summary,
                    })
                    .await?;
                success(json!({ "session_id": session_id }))
            }
            "store_development_conversation" => {
                let p: DevelopmentConversationParams = decode(args)?;
                let conversation_id = self
                    .system
                    .store_development_conversation(NewDevelopmentConversation {
                        content: p.content,
                        session_id: p.session_id,
                        chat_context_id: p.chat_context_id,
                        decisions_made: p.decisions_made,
                        code_changes: p.code_changes,
                        source_metadata: p.source_metadata,
                    })
                    .await?;
                success(json!({ "conversation_id": conversation_id }))
            }
            "store_project_insight" => {
                let p: ProjectInsightParams = decode(args)?;
                let defaults = NewProjectInsight::default();
                let insight_id = self
                    .system
                    .store_project_insight(NewProjectInsight {
                        content: p.content,
                        insight_type: p.insight_type.unwrap_or(defaults.insight_type),
                        related_files: p.related_files.unwrap_or_default(),
                        importance_level: p.importance_level.unwrap_or(defaults.importance_level),
                        source_conversation_id: p.source_conversation_id,
                    })
                    .await?;
                success(json!({ "insight_id": insight_id }))
            }
            "search_project_history" => {
                let p: ProjectSearchParams = decode(args)?;
                let response = self
                    .system
                    .search_project_history(&p.query, p.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
                    .await?;
                Ok(serde_json::to_value(response)?)
            }
            "link_code_context" => {
                let p: CodeContextParams = decode(args)?;
                let context_id = self
                    .system
                    .link_code_context(NewCodeContext {
                        file_path: p.file_path,
                        description: p.description,
                        function_name: p.function_name,
                        purpose: p.purpose,
                        related_insights: p.related_insights.unwrap_or_default(),
                    })
                    .await?;
                success(json!({ "context_id": context_id }))
            }
            "get_project_continuity" => {
                let p: ProjectContinuityParams = decode(args)?;
                let continuity = self
                    .system
                    .get_project_continuity(p.workspace_path.as_deref(), p.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
                    .await?;
                success(continuity)
            }
            other => Err(AppError::InvalidInput(format!("Unknown tool: {}", other))),
        }
    }

    async fn search_memories(&self, p: SearchMemoriesParams) -> Result<Value> {
        let scope = match p.database_filter {
            Some(ref filter) => filter.parse::<SearchScope>()?,
            None => SearchScope::All,
        };
        let request = SearchRequest::new(p.query)
            .limit(p.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
            .scope(scope)
            .filter(MemoryFilter {
                min_importance: p.min_importance,
                max_importance: p.max_importance,
                memory_type: p.memory_type,
            });
        let response = self.system.search_memories(&request).await?;
        Ok(serde_json::to_value(response)?)
    }

    async fn store_conversation(&self, p: StoreConversationParams) -> Result<Value> {
        if p.user_message.is_some() || p.assistant_response.is_some() {
            return self.store_exchange(p).await;
        }

        let content = p
            .content
            .ok_or_else(|| AppError::InvalidInput("content is required".to_string()))?;
        let role = match p.role {
            Some(ref role) => role.parse::<MessageRole>()?,
            None => MessageRole::User,
        };
        let outcome = self
            .system
            .store_conversation(NewMessage {
                content,
                role,
                session_id: p.session_id,
                conversation_id: p.conversation_id,
                metadata: p.metadata,
                source_type: None,
            })
            .await?;
        success(outcome)
    }

    /// Store `user_message` then `assistant_response` in one conversation.
    async fn store_exchange(&self, p: StoreConversationParams) -> Result<Value> {
        let mut session_id = p.session_id;
        let mut conversation_id = p.conversation_id;
        let mut stored = Map::new();

        let turns = [
            ("user", MessageRole::User, p.user_message),
            ("assistant", MessageRole::Assistant, p.assistant_response),
        ];
        for (key, role, content) in turns {
            let Some(content) = content else { continue };
            let outcome = self
                .system
                .store_conversation(NewMessage {
                    content,
                    role,
                    session_id: session_id.clone(),
                    conversation_id: conversation_id.clone(),
                    metadata: p.metadata.clone(),
                    source_type: None,
                })
                .await?;
            session_id = Some(outcome.session_id.clone());
            if outcome.conversation_id.is_some() {
                conversation_id = outcome.conversation_id.clone();
            } else if conversation_id.is_none() {
                // A duplicate turn continues the conversation it was first stored in
                conversation_id = self
                    .system
                    .stores()
                    .conversations
                    .conversation_of_message(&outcome.message_id)
                    .await?;
            }
            stored.insert(key.to_string(), serde_json::to_value(outcome)?);
        }

        stored.insert("session_id".to_string(), json!(session_id));
        stored.insert("conversation_id".to_string(), json!(conversation_id));
        success(Value::Object(stored))
    }

    async fn create_memory(&self, p: CreateMemoryParams) -> Result<Value> {
        let memory_id = self
            .system
            .create_memory(NewMemory {
                content: p.content,
                memory_type: p.memory_type,
                importance_level: p.importance_level.unwrap_or(DEFAULT_IMPORTANCE),
                tags: p.tags.unwrap_or_default(),
                source_conversation_id: p.source_conversation_id,
                source_message_ids: Vec::new(),
            })
            .await?;
        success(json!({ "memory_id": memory_id }))
    }

    async fn update_memory(&self, p: UpdateMemoryParams) -> Result<Value> {
        let memory = self
            .system
            .update_memory(
                &p.memory_id,
                MemoryUpdate {
                    content: p.content,
                    importance_level: p.importance_level,
                    tags: p.tags,
                    memory_type: p.memory_type,
                },
            )
            .await?;
        success(json!({ "memory": memory }))
    }
}

/// Decode tool arguments; a missing argument object counts as `{}`.
fn decode<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| AppError::InvalidInput(format!("Invalid arguments: {}", e)))
}

/// Serialize `payload` and mark it successful, keeping an existing status.
fn success(payload: impl Serialize) -> Result<Value> {
    let value = serde_json::to_value(payload)?;
    match value {
        Value::Object(mut map) => {
            map.entry("status").or_insert_with(|| Value::from("success"));
            Ok(Value::Object(map))
        }
        other => Ok(json!({ "status": "success", "data": other })),
    }
}

/// Error payload returned to tool clients.
pub fn error_payload(error: &AppError) -> Value {
    json!({
        "status": "error",
        "error_type": error.kind(),
        "message": error.to_string(),
    })
}
