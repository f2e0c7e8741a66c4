//! Typed parameters of every memory tool.
//!
//! The same structs describe the MCP input schema (via `schemars`) and
//! decode the JSON arguments in the dispatcher.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for searching across memory databases
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct SearchMemoriesParams {
    /// Free-text query
    pub query: String,
    /// Maximum number of results (default 10)
    #[serde(default)]
    pub limit: Option<usize>,
    /// Only curated memories at or above this importance (1-10)
    #[serde(default)]
    pub min_importance: Option<i64>,
    /// Only curated memories at or below this importance (1-10)
    #[serde(default)]
    pub max_importance: Option<i64>,
    /// Only curated memories of this type
    #[serde(default)]
    pub memory_type: Option<String>,
    /// One of: all, ai_memories, conversations, schedule, projects
    #[serde(default)]
    pub database_filter: Option<String>,
}

/// Parameters for storing a conversation message.
///
/// Either `content` (with an optional `role`) or the pair
/// `user_message` / `assistant_response` must be given.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct StoreConversationParams {
    /// Message text
    #[serde(default)]
    pub content: Option<String>,
    /// user, assistant, system or tool (default user)
    #[serde(default)]
    pub role: Option<String>,
    /// Session to attach the message to; enables duplicate detection
    #[serde(default)]
    pub session_id: Option<String>,
    /// Conversation to attach the message to
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Arbitrary JSON metadata
    #[serde(default)]
    pub metadata: Option<Value>,
    /// User side of an exchange
    #[serde(default)]
    pub user_message: Option<String>,
    /// Assistant side of an exchange
    #[serde(default)]
    pub assistant_response: Option<String>,
}

/// Parameters for creating a curated memory
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct CreateMemoryParams {
    /// What to remember
    pub content: String,
    /// Category such as preference, fact, safety
    #[serde(default)]
    pub memory_type: Option<String>,
    /// 1-10, default 5
    #[serde(default)]
    pub importance_level: Option<i64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub source_conversation_id: Option<String>,
}

/// Parameters for updating a curated memory; omitted fields are unchanged
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct UpdateMemoryParams {
    pub memory_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub importance_level: Option<i64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub memory_type: Option<String>,
}

/// Parameters for fetching recent messages
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct RecentContextParams {
    /// Number of messages (default 5)
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Parameters for creating an appointment
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct CreateAppointmentParams {
    pub title: String,
    /// ISO 8601 date or datetime
    pub scheduled_datetime: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub source_conversation_id: Option<String>,
}

/// Parameters for creating a reminder
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct CreateReminderParams {
    pub content: String,
    /// ISO 8601 date or datetime
    pub due_datetime: String,
    /// 1-10, default 5
    #[serde(default)]
    pub priority_level: Option<i64>,
    #[serde(default)]
    pub source_conversation_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct CompleteReminderParams {
    pub reminder_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct UpcomingScheduleParams {
    /// Days to look ahead (default 7)
    #[serde(default)]
    pub days_ahead: Option<i64>,
}

/// Tools that take no arguments
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct EmptyParams {}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct DaysParams {
    /// Look-back window in days (default 7)
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ToolHistoryParams {
    /// Only calls of this tool
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Number of calls (default 50)
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ReflectParams {
    /// Look-back window in days (default 7)
    #[serde(default)]
    pub days: Option<i64>,
    /// Only calls from this client
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct AiInsightsParams {
    /// Number of reflections (default 5)
    #[serde(default)]
    pub limit: Option<usize>,
    /// Only reflections of this type, e.g. tool_usage_analysis
    #[serde(default)]
    pub insight_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct MaintenanceParams {
    /// Run even if maintenance ran recently
    #[serde(default)]
    pub force: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct DevelopmentSessionParams {
    pub workspace_path: String,
    #[serde(default)]
    pub active_files: Option<Vec<String>>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub session_summary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct DevelopmentConversationParams {
    pub content: String,
    /// Existing development session; one is created when omitted
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub chat_context_id: Option<String>,
    #[serde(default)]
    pub decisions_made: Option<String>,
    #[serde(default)]
    pub code_changes: Option<Value>,
    #[serde(default)]
    pub source_metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ProjectInsightParams {
    pub content: String,
    /// Default "general"
    #[serde(default)]
    pub insight_type: Option<String>,
    #[serde(default)]
    pub related_files: Option<Vec<String>>,
    /// 1-10, default 5
    #[serde(default)]
    pub importance_level: Option<i64>,
    #[serde(default)]
    pub source_conversation_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ProjectSearchParams {
    pub query: String,
    /// Maximum number of results (default 10)
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct CodeContextParams {
    pub file_path: String,
    pub description: String,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub related_insights: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ProjectContinuityParams {
    #[serde(default)]
    pub workspace_path: Option<String>,
    /// Items per section (default 5)
    #[serde(default)]
    pub limit: Option<usize>,
}
