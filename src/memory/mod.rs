//! The memory system facade.
//!
//! [`MemorySystem`] ties the five stores, the embedding provider, search and
//! maintenance together behind one API. Writes are persisted immediately;
//! their embeddings are computed by background tasks so callers never wait
//! on the embedding service.

pub mod context;

use crate::db::{DatabaseStats, Stores};
use crate::embeddings::{self, EmbeddingProvider};
use crate::maintenance::{DatabaseMaintenance, MaintenanceReport};
use crate::monitor::{ConversationSink, MonitorStatus, SharedMonitorStatus};
use crate::reflection::{reflect, Reflection, UsageStats, REFLECTION_CONFIDENCE, TOOL_USAGE_REFLECTION};
use crate::search::{SearchEngine, SearchHit, SearchRequest, SearchResponse, SearchScope};
use crate::types::{
    AiReflection, AppError, MemoryRecord, MemoryUpdate, NewAppointment, NewCodeContext,
    NewDevelopmentConversation, NewDevelopmentSession, NewMemory, NewMessage, NewProjectInsight,
    NewReminder, NewToolCall, ProjectContinuity, Result, StoreMessageOutcome, StoredMessage,
    ToolCallRecord, ToolUsageSummary, UpcomingSchedule,
};
use crate::utils::time::now_timestamp;
use crate::utils::toml_config::ConfigManager;
use async_trait::async_trait;
use memoria_vector::encode_embedding;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Record whose embedding a background task fills in.
#[derive(Debug, Clone)]
enum EmbeddingTarget {
    Message(String),
    /// Memory id and the content the embedding is computed from.
    Memory(String, String),
    Appointment(String),
    Reminder(String),
    Insight(String),
    DevConversation(String),
    CodeContext(String),
}

impl EmbeddingTarget {
    async fn store(&self, stores: &Stores, blob: Vec<u8>) -> Result<()> {
        match self {
            EmbeddingTarget::Message(id) => stores.conversations.set_embedding(id, blob).await,
            EmbeddingTarget::Memory(id, content) => {
                if !stores.memories.set_embedding(id, content, blob).await? {
                    debug!(memory_id = %id, "Discarded embedding of replaced memory content");
                }
                Ok(())
            }
            EmbeddingTarget::Appointment(id) => stores.schedule.set_appointment_embedding(id, blob).await,
            EmbeddingTarget::Reminder(id) => stores.schedule.set_reminder_embedding(id, blob).await,
            EmbeddingTarget::Insight(id) => stores.projects.set_insight_embedding(id, blob).await,
            EmbeddingTarget::DevConversation(id) => stores.projects.set_dev_conversation_embedding(id, blob).await,
            EmbeddingTarget::CodeContext(id) => stores.projects.set_code_context_embedding(id, blob).await,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingHealth {
    /// `healthy`, `disabled` or `unavailable`
    pub status: &'static str,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub timestamp: String,
    pub data_dir: String,
    pub databases: BTreeMap<&'static str, DatabaseStats>,
    pub file_monitoring: MonitorStatus,
    pub embedding_service: EmbeddingHealth,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolUsageReflection {
    pub reflection_id: String,
    pub period_days: i64,
    pub stats: UsageStats,
    pub reflection: Reflection,
}

/// Persistent memory for an assistant.
pub struct MemorySystem {
    stores: Stores,
    embedder: Arc<dyn EmbeddingProvider>,
    config: ConfigManager,
    search: SearchEngine,
    maintenance: DatabaseMaintenance,
    background: Mutex<JoinSet<()>>,
    monitor_status: SharedMonitorStatus,
}

impl MemorySystem {
    /// Open the data directory and embedding provider named by the config.
    pub async fn open(config: ConfigManager) -> Result<Self> {
        let current = config.config();
        let stores = Stores::open(&current.storage.data_dir).await?;
        let embedder = embeddings::from_config(&current)?;
        info!(
            data_dir = %current.storage.data_dir.display(),
            model = embedder.model_name(),
            "Memory system ready"
        );
        Ok(Self::with_parts(stores, embedder, config))
    }

    pub fn with_parts(stores: Stores, embedder: Arc<dyn EmbeddingProvider>, config: ConfigManager) -> Self {
        let search = SearchEngine::new(stores.clone(), Arc::clone(&embedder));
        let maintenance = DatabaseMaintenance::new(stores.clone(), config.clone());
        Self {
            stores,
            embedder,
            config,
            search,
            maintenance,
            background: Mutex::new(JoinSet::new()),
            monitor_status: SharedMonitorStatus::default(),
        }
    }

    /// A system backed by in-memory databases.
    pub async fn open_in_memory(embedder: Arc<dyn EmbeddingProvider>, config: ConfigManager) -> Result<Self> {
        Ok(Self::with_parts(Stores::open_in_memory().await?, embedder, config))
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Handle the file monitor publishes its state through.
    pub fn monitor_status(&self) -> SharedMonitorStatus {
        Arc::clone(&self.monitor_status)
    }

    pub fn maintenance(&self) -> DatabaseMaintenance {
        self.maintenance.clone()
    }

    fn embed_in_background(&self, target: EmbeddingTarget, text: String) {
        let embedder = Arc::clone(&self.embedder);
        let stores = self.stores.clone();
        let mut tasks = self.background.lock();
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            match embedder.embed(&text).await {
                Ok(vector) => {
                    if let Err(e) = target.store(&stores, encode_embedding(&vector)).await {
                        warn!(record = ?target, "Failed to store embedding: {}", e);
                    }
                }
                Err(e) => debug!(record = ?target, "Embedding skipped: {}", e),
            }
        });
    }

    /// Wait for every pending background embedding.
    pub async fn wait_for_embeddings(&self) {
        let mut tasks = std::mem::take(&mut *self.background.lock());
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                warn!("Embedding task failed: {}", e);
            }
        }
    }

    // ============= Conversations =============

    pub async fn store_conversation(&self, message: NewMessage) -> Result<StoreMessageOutcome> {
        if message.content.trim().is_empty() {
            return Err(AppError::InvalidInput("content must not be empty".to_string()));
        }
        let window = self.config.config().search.duplicate_window_minutes;
        let outcome = self.stores.conversations.store_message(&message, window).await?;
        if !outcome.duplicate {
            self.embed_in_background(EmbeddingTarget::Message(outcome.message_id.clone()), message.content);
        }
        Ok(outcome)
    }

    /// Newest messages first.
    pub async fn get_conversation_history(&self, limit: usize, session_id: Option<&str>) -> Result<Vec<StoredMessage>> {
        self.stores.conversations.get_recent_messages(limit, session_id).await
    }

    /// The last `limit` messages in chronological order, ready for a prompt.
    pub async fn get_recent_context(&self, limit: usize, session_id: Option<&str>) -> Result<Vec<StoredMessage>> {
        let mut messages = self.stores.conversations.get_recent_messages(limit, session_id).await?;
        messages.reverse();
        Ok(messages)
    }

    // ============= Curated memories =============

    pub async fn create_memory(&self, memory: NewMemory) -> Result<String> {
        let memory_id = self.stores.memories.create_memory(&memory).await?;
        self.embed_in_background(
            EmbeddingTarget::Memory(memory_id.clone(), memory.content.clone()),
            memory.content,
        );
        Ok(memory_id)
    }

    pub async fn update_memory(&self, memory_id: &str, update: MemoryUpdate) -> Result<MemoryRecord> {
        if update.is_empty() {
            return Err(AppError::InvalidInput("update must change at least one field".to_string()));
        }
        let record = self.stores.memories.update_memory(memory_id, &update).await?;
        if update.content.is_some() {
            self.embed_in_background(
                EmbeddingTarget::Memory(record.memory_id.clone(), record.content.clone()),
                record.content.clone(),
            );
        }
        Ok(record)
    }

    pub async fn get_memory(&self, memory_id: &str) -> Result<Option<MemoryRecord>> {
        self.stores.memories.get_memory(memory_id).await
    }

    pub async fn get_memories(&self, limit: usize, memory_type: Option<&str>) -> Result<Vec<MemoryRecord>> {
        self.stores.memories.get_memories(limit, memory_type).await
    }

    /// Curated memories most relevant to `query`, best first.
    pub async fn retrieve_memories(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let request = SearchRequest::new(query)
            .limit(limit)
            .scope(SearchScope::AiMemories);
        let response = self.search_memories(&request).await?;
        Ok(response
            .results
            .into_iter()
            .filter_map(|r| match r.hit {
                SearchHit::AiMemory(memory) => Some(memory),
                _ => None,
            })
            .collect())
    }

    // ============= Schedule =============

    /// Returns the appointment id and the normalized datetime.
    pub async fn create_appointment(&self, appointment: NewAppointment) -> Result<(String, String)> {
        let (id, scheduled) = self.stores.schedule.create_appointment(&appointment).await?;
        let text = match appointment.description {
            Some(ref description) => format!("{} {}", appointment.title, description),
            None => appointment.title.clone(),
        };
        self.embed_in_background(EmbeddingTarget::Appointment(id.clone()), text);
        Ok((id, scheduled))
    }

    /// Returns the reminder id and the normalized due datetime.
    pub async fn create_reminder(&self, reminder: NewReminder) -> Result<(String, String)> {
        let (id, due) = self.stores.schedule.create_reminder(&reminder).await?;
        self.embed_in_background(EmbeddingTarget::Reminder(id.clone()), reminder.content);
        Ok((id, due))
    }

    pub async fn complete_reminder(&self, reminder_id: &str) -> Result<()> {
        self.stores.schedule.complete_reminder(reminder_id).await
    }

    pub async fn get_upcoming_schedule(&self, days_ahead: i64) -> Result<UpcomingSchedule> {
        if days_ahead < 0 {
            return Err(AppError::InvalidInput("days_ahead must not be negative".to_string()));
        }
        Ok(UpcomingSchedule {
            appointments: self.stores.schedule.get_upcoming_appointments(days_ahead).await?,
            active_reminders: self.stores.schedule.get_active_reminders().await?,
            period_days: days_ahead,
        })
    }

    // ============= Development projects =============

    pub async fn save_development_session(&self, session: NewDevelopmentSession) -> Result<String> {
        self.stores.projects.save_development_session(&session).await
    }

    pub async fn store_development_conversation(&self, conversation: NewDevelopmentConversation) -> Result<String> {
        let id = self.stores.projects.store_development_conversation(&conversation).await?;
        self.embed_in_background(EmbeddingTarget::DevConversation(id.clone()), conversation.content);
        Ok(id)
    }

    pub async fn store_project_insight(&self, insight: NewProjectInsight) -> Result<String> {
        let id = self.stores.projects.store_project_insight(&insight).await?;
        self.embed_in_background(EmbeddingTarget::Insight(id.clone()), insight.content);
        Ok(id)
    }

    pub async fn link_code_context(&self, context: NewCodeContext) -> Result<String> {
        let id = self.stores.projects.link_code_context(&context).await?;
        self.embed_in_background(EmbeddingTarget::CodeContext(id.clone()), context.description);
        Ok(id)
    }

    pub async fn get_project_continuity(&self, workspace_path: Option<&str>, limit: usize) -> Result<ProjectContinuity> {
        self.stores.projects.get_project_continuity(workspace_path, limit).await
    }

    pub async fn search_project_history(&self, query: &str, limit: usize) -> Result<SearchResponse> {
        let request = SearchRequest::new(query).limit(limit).scope(SearchScope::Projects);
        self.search_memories(&request).await
    }

    // ============= Tool telemetry =============

    pub async fn log_tool_call(&self, call: NewToolCall) -> Result<String> {
        self.stores.tool_calls.log_tool_call(&call).await
    }

    pub async fn get_tool_usage_summary(&self, days: i64) -> Result<ToolUsageSummary> {
        self.stores.tool_calls.get_tool_usage_summary(days).await
    }

    pub async fn get_tool_call_history(&self, tool_name: Option<&str>, limit: usize) -> Result<Vec<ToolCallRecord>> {
        self.stores.tool_calls.get_tool_call_history(tool_name, limit).await
    }

    /// Analyze recent tool calls and store the resulting reflection, plus a
    /// `peak_usage` pattern for the most used tool.
    pub async fn reflect_on_tool_usage(&self, days: i64, client_id: Option<&str>) -> Result<ToolUsageReflection> {
        let calls = self.stores.tool_calls.calls_since(days, client_id).await?;
        let stats = UsageStats::from_calls(&calls, days);
        let reflection = reflect(&stats);

        let reflection_id = self
            .stores
            .tool_calls
            .store_reflection(
                TOOL_USAGE_REFLECTION,
                &reflection.content,
                &reflection.insights,
                &reflection.recommendations,
                REFLECTION_CONFIDENCE,
                days,
            )
            .await?;

        if let Some(peak) = reflection.patterns.peak_usage_tools.first() {
            self.stores
                .tool_calls
                .store_usage_pattern(
                    "peak_usage",
                    &peak.insight,
                    peak.count as i64,
                    &[peak.tool.clone()],
                    peak.percentage / 100.0,
                )
                .await?;
        }

        info!(days, calls = stats.total_calls, "Stored tool usage reflection");
        Ok(ToolUsageReflection {
            reflection_id,
            period_days: days,
            stats,
            reflection,
        })
    }

    pub async fn get_ai_insights(&self, limit: usize, reflection_type: Option<&str>) -> Result<Vec<AiReflection>> {
        self.stores.tool_calls.get_reflections(limit, reflection_type).await
    }

    // ============= Search =============

    pub async fn search_memories(&self, request: &SearchRequest) -> Result<SearchResponse> {
        if let (Some(min), Some(max)) = (request.filter.min_importance, request.filter.max_importance) {
            if min > max {
                return Err(AppError::InvalidInput(format!(
                    "min_importance ({}) is greater than max_importance ({})",
                    min, max
                )));
            }
        }
        let settings = self.config.config().search.clone();
        self.search.search(request, &settings).await
    }

    pub async fn get_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed(text).await
    }

    // ============= Health and maintenance =============

    pub async fn get_system_health(&self) -> SystemHealth {
        let mut issues = Vec::new();
        let mut status = HealthStatus::Healthy;

        let databases = match self.stores.statistics().await {
            Ok(stats) => stats,
            Err(e) => {
                status = HealthStatus::Error;
                issues.push(format!("Database check failed: {}", e));
                BTreeMap::new()
            }
        };

        let model = self.embedder.model_name().to_string();
        let embedding_service = if !self.config.config().embeddings.enabled {
            EmbeddingHealth {
                status: "disabled",
                model,
                dimensions: None,
                error: None,
            }
        } else {
            match self.embedder.embed("test").await {
                Ok(vector) => EmbeddingHealth {
                    status: "healthy",
                    model,
                    dimensions: Some(vector.len()),
                    error: None,
                },
                Err(e) => {
                    if status == HealthStatus::Healthy {
                        status = HealthStatus::Degraded;
                    }
                    issues.push("Embedding service unavailable; search falls back to text matching".to_string());
                    EmbeddingHealth {
                        status: "unavailable",
                        model,
                        dimensions: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        };

        SystemHealth {
            status,
            timestamp: now_timestamp(),
            data_dir: self.config.config().storage.data_dir.display().to_string(),
            databases,
            file_monitoring: self.monitor_status.read().clone(),
            embedding_service,
            issues,
        }
    }

    pub async fn run_database_maintenance(&self, force: bool) -> MaintenanceReport {
        self.maintenance.run_maintenance(force).await
    }
}

#[async_trait]
impl ConversationSink for MemorySystem {
    async fn store_imported_message(&self, message: NewMessage) -> Result<StoreMessageOutcome> {
        self.store_conversation(message).await
    }
}
