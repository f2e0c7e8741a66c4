use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

// ============= Conversation Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    #[default]
    User,
    Assistant,
    Tool,
    Unknown,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
            MessageRole::Unknown => "unknown",
        }
    }

    /// Lenient mapping used for imported transcripts and stored rows.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "system" => MessageRole::System,
            "user" | "human" | "me" => MessageRole::User,
            "assistant" | "ai" | "bot" | "model" => MessageRole::Assistant,
            "tool" | "function" => MessageRole::Tool,
            _ => MessageRole::Unknown,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match MessageRole::parse_lenient(s) {
            MessageRole::Unknown if s.trim().to_lowercase() != "unknown" => {
                Err(AppError::InvalidInput(format!("Unknown role: {}", s)))
            }
            role => Ok(role),
        }
    }
}

/// A message to persist in the conversation store.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub content: String,
    pub role: MessageRole,
    pub session_id: Option<String>,
    pub conversation_id: Option<String>,
    pub metadata: Option<Value>,
    pub source_type: Option<String>,
}

impl NewMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_source(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMessageOutcome {
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub session_id: String,
    pub duplicate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub message_id: String,
    pub conversation_id: String,
    pub session_id: String,
    pub timestamp: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

// ============= Curated Memory Types =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub memory_id: String,
    pub timestamp_created: String,
    pub timestamp_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_conversation_id: Option<String>,
    #[serde(default)]
    pub source_message_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
    pub content: String,
    pub importance_level: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewMemory {
    pub content: String,
    pub memory_type: Option<String>,
    pub importance_level: i64,
    pub tags: Vec<String>,
    pub source_conversation_id: Option<String>,
    pub source_message_ids: Vec<String>,
}

impl Default for NewMemory {
    fn default() -> Self {
        Self {
            content: String::new(),
            memory_type: None,
            importance_level: DEFAULT_IMPORTANCE,
            tags: Vec::new(),
            source_conversation_id: None,
            source_message_ids: Vec::new(),
        }
    }
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn of_type(mut self, memory_type: impl Into<String>) -> Self {
        self.memory_type = Some(memory_type.into());
        self
    }

    pub fn importance(mut self, level: i64) -> Self {
        self.importance_level = level;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial update for a curated memory; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub importance_level: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub memory_type: Option<String>,
}

impl MemoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.importance_level.is_none()
            && self.tags.is_none()
            && self.memory_type.is_none()
    }
}

/// Default importance for memories, reminders and insights.
pub const DEFAULT_IMPORTANCE: i64 = 5;

/// Importance at or above which a memory or insight counts as high.
pub const HIGH_IMPORTANCE: i64 = 7;

pub fn validate_importance(field: &str, level: i64) -> Result<()> {
    if (1..=10).contains(&level) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "{} must be between 1 and 10, got {}",
            field, level
        )))
    }
}

// ============= Schedule Types =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: String,
    pub timestamp_created: String,
    pub scheduled_datetime: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_conversation_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAppointment {
    pub title: String,
    pub scheduled_datetime: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub source_conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder_id: String,
    pub timestamp_created: String,
    pub due_datetime: String,
    pub content: String,
    pub priority_level: i64,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_conversation_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub content: String,
    pub due_datetime: String,
    pub priority_level: i64,
    pub source_conversation_id: Option<String>,
}

impl Default for NewReminder {
    fn default() -> Self {
        Self {
            content: String::new(),
            due_datetime: String::new(),
            priority_level: DEFAULT_IMPORTANCE,
            source_conversation_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingSchedule {
    pub appointments: Vec<Appointment>,
    pub active_reminders: Vec<Reminder>,
    pub period_days: i64,
}

// ============= Development Project Types =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevelopmentSession {
    pub session_id: String,
    pub start_timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<String>,
    pub workspace_path: String,
    #[serde(default)]
    pub active_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_summary: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDevelopmentSession {
    pub workspace_path: String,
    pub active_files: Vec<String>,
    pub git_branch: Option<String>,
    pub session_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevelopmentConversation {
    pub conversation_id: String,
    pub session_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_context_id: Option<String>,
    pub conversation_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decisions_made: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_changes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_metadata: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDevelopmentConversation {
    pub content: String,
    pub session_id: Option<String>,
    pub chat_context_id: Option<String>,
    pub decisions_made: Option<String>,
    pub code_changes: Option<Value>,
    pub source_metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInsight {
    pub insight_id: String,
    pub timestamp_created: String,
    pub timestamp_updated: String,
    pub insight_type: String,
    pub content: String,
    #[serde(default)]
    pub related_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_conversation_id: Option<String>,
    pub importance_level: i64,
}

#[derive(Debug, Clone)]
pub struct NewProjectInsight {
    pub content: String,
    pub insight_type: String,
    pub related_files: Vec<String>,
    pub importance_level: i64,
    pub source_conversation_id: Option<String>,
}

impl Default for NewProjectInsight {
    fn default() -> Self {
        Self {
            content: String::new(),
            insight_type: "general".to_string(),
            related_files: Vec::new(),
            importance_level: DEFAULT_IMPORTANCE,
            source_conversation_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeContext {
    pub context_id: String,
    pub timestamp: String,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default)]
    pub related_insights: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCodeContext {
    pub file_path: String,
    pub description: String,
    pub function_name: Option<String>,
    pub purpose: Option<String>,
    pub related_insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContinuity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<String>,
    pub recent_sessions: Vec<DevelopmentSession>,
    pub recent_conversations: Vec<DevelopmentConversation>,
    pub important_insights: Vec<ProjectInsight>,
    pub recent_code_context: Vec<CodeContext>,
}

// ============= Tool Telemetry Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Success,
    Error,
}

impl ToolCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCallStatus::Success => "success",
            ToolCallStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("success") {
            ToolCallStatus::Success
        } else {
            ToolCallStatus::Error
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewToolCall {
    pub tool_name: String,
    pub parameters: Value,
    pub client_id: String,
    pub result: Option<Value>,
    pub status: ToolCallStatus,
    pub execution_time_ms: Option<f64>,
    pub error_message: Option<String>,
}

impl NewToolCall {
    pub fn success(tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
            client_id: "unknown".to_string(),
            result: None,
            status: ToolCallStatus::Success,
            execution_time_ms: None,
            error_message: None,
        }
    }

    pub fn error(tool_name: impl Into<String>, parameters: Value, message: impl Into<String>) -> Self {
        Self {
            status: ToolCallStatus::Error,
            error_message: Some(message.into()),
            ..Self::success(tool_name, parameters)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub timestamp: String,
    pub client_id: String,
    pub tool_name: String,
    pub parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub status: ToolCallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyToolStats {
    pub tool_name: String,
    pub date: String,
    pub call_count: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub avg_execution_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStatusCount {
    pub tool_name: String,
    pub status: ToolCallStatus,
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_execution_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUsageCount {
    pub tool_name: String,
    pub total_calls: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUsageSummary {
    pub recent_calls: Vec<ToolStatusCount>,
    pub daily_stats: Vec<DailyToolStats>,
    pub most_used_tools: Vec<ToolUsageCount>,
    pub period_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsagePattern {
    pub pattern_id: String,
    pub timestamp_created: String,
    pub pattern_type: String,
    pub description: String,
    pub frequency: i64,
    #[serde(default)]
    pub tools_involved: Vec<String>,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiReflection {
    pub reflection_id: String,
    pub timestamp_created: String,
    pub reflection_type: String,
    pub content: String,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub confidence_level: f64,
    pub source_period_days: i64,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable kind used in tool error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Embedding(_) => "embedding",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Configuration(_) => "configuration",
            AppError::Io(_) => "io",
            AppError::Serialization(_) => "serialization",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<memoria_vector::Error> for AppError {
    fn from(err: memoria_vector::Error) -> Self {
        AppError::Embedding(err.to_string())
    }
}

impl From<crate::utils::toml_config::ConfigError> for AppError {
    fn from(err: crate::utils::toml_config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
