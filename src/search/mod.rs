//! Cross-database search.
//!
//! A query is embedded once and scored against the stored embeddings of
//! every selected database. Curated memories and project insights get a
//! small boost proportional to their importance. If the query cannot be
//! embedded the search degrades to SQL `LIKE` matching on lowercase words.

use crate::db::{MemoryFilter, Stores};
use crate::embeddings::EmbeddingProvider;
use crate::types::{
    AppError, Appointment, CodeContext, DevelopmentConversation, MemoryRecord, ProjectInsight,
    Reminder, Result, StoredMessage,
};
use crate::utils::toml_config::SearchConfig;
use memoria_vector::{rank_by_similarity, sort_scored, Scored};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Score given to every text-fallback hit.
pub const TEXT_MATCH_SCORE: f32 = 0.5;

/// Note attached to responses produced without embeddings.
pub const TEXT_FALLBACK_NOTE: &str = "Used text-based search (embeddings unavailable)";

/// Which databases a search covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    #[default]
    All,
    AiMemories,
    Conversations,
    Schedule,
    Projects,
}

impl SearchScope {
    fn includes(self, other: SearchScope) -> bool {
        self == SearchScope::All || self == other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchScope::All => "all",
            SearchScope::AiMemories => "ai_memories",
            SearchScope::Conversations => "conversations",
            SearchScope::Schedule => "schedule",
            SearchScope::Projects => "projects",
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchScope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(SearchScope::All),
            "ai_memories" | "memories" => Ok(SearchScope::AiMemories),
            "conversations" => Ok(SearchScope::Conversations),
            "schedule" => Ok(SearchScope::Schedule),
            "projects" | "vscode_project" => Ok(SearchScope::Projects),
            other => Err(AppError::InvalidInput(format!(
                "Unknown database_filter '{}': expected all, ai_memories, conversations, schedule or projects",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    /// Falls back to `search.default_limit`
    pub limit: Option<usize>,
    /// Applies to curated memories only
    pub filter: MemoryFilter,
    pub scope: SearchScope,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn filter(mut self, filter: MemoryFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// A matched record, tagged with the kind of record it is.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SearchHit {
    AiMemory(MemoryRecord),
    Conversation(StoredMessage),
    Appointment(Appointment),
    Reminder(Reminder),
    ProjectInsight(ProjectInsight),
    DevelopmentConversation(DevelopmentConversation),
    CodeContext(CodeContext),
}

impl SearchHit {
    pub fn kind(&self) -> &'static str {
        match self {
            SearchHit::AiMemory(_) => "ai_memory",
            SearchHit::Conversation(_) => "conversation",
            SearchHit::Appointment(_) => "appointment",
            SearchHit::Reminder(_) => "reminder",
            SearchHit::ProjectInsight(_) => "project_insight",
            SearchHit::DevelopmentConversation(_) => "development_conversation",
            SearchHit::CodeContext(_) => "code_context",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SearchHit::AiMemory(m) => &m.memory_id,
            SearchHit::Conversation(m) => &m.message_id,
            SearchHit::Appointment(a) => &a.appointment_id,
            SearchHit::Reminder(r) => &r.reminder_id,
            SearchHit::ProjectInsight(i) => &i.insight_id,
            SearchHit::DevelopmentConversation(c) => &c.conversation_id,
            SearchHit::CodeContext(c) => &c.context_id,
        }
    }

    /// The main text of the record.
    pub fn text(&self) -> &str {
        match self {
            SearchHit::AiMemory(m) => &m.content,
            SearchHit::Conversation(m) => &m.content,
            SearchHit::Appointment(a) => &a.title,
            SearchHit::Reminder(r) => &r.content,
            SearchHit::ProjectInsight(i) => &i.content,
            SearchHit::DevelopmentConversation(c) => &c.conversation_content,
            SearchHit::CodeContext(c) => &c.description,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub hit: SearchHit,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Semantic,
    TextBased,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub status: &'static str,
    pub query: String,
    pub results: Vec<SearchResult>,
    pub count: usize,
    pub search_type: SearchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Runs searches over a set of stores.
#[derive(Clone)]
pub struct SearchEngine {
    stores: Stores,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SearchEngine {
    pub fn new(stores: Stores, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { stores, embedder }
    }

    pub async fn search(&self, request: &SearchRequest, settings: &SearchConfig) -> Result<SearchResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("query must not be empty".to_string()));
        }
        let limit = request.limit.unwrap_or(settings.default_limit).max(1);

        match self.embedder.embed(query).await {
            Ok(query_vector) => {
                let results = self
                    .semantic_search(&query_vector, request, settings, limit)
                    .await?;
                debug!(query, count = results.len(), "Semantic search complete");
                Ok(SearchResponse {
                    status: "success",
                    query: query.to_string(),
                    count: results.len(),
                    results,
                    search_type: SearchType::Semantic,
                    note: None,
                })
            }
            Err(e) => {
                warn!("Query embedding failed, falling back to text search: {}", e);
                let results = self.text_search(query, request, limit).await?;
                Ok(SearchResponse {
                    status: "success",
                    query: query.to_string(),
                    count: results.len(),
                    results,
                    search_type: SearchType::TextBased,
                    note: Some(TEXT_FALLBACK_NOTE.to_string()),
                })
            }
        }
    }

    async fn semantic_search(
        &self,
        query: &[f32],
        request: &SearchRequest,
        settings: &SearchConfig,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let threshold = settings.similarity_threshold;
        let scope = request.scope;
        let mut scored: Vec<Scored<SearchHit>> = Vec::new();

        if scope.includes(SearchScope::AiMemories) {
            let candidates = self.stores.memories.memories_with_embeddings(&request.filter).await?;
            for mut hit in rank_by_similarity(query, candidates, threshold) {
                hit.score += importance_boost(hit.item.importance_level, settings.memory_importance_boost);
                scored.push(map_scored(hit, SearchHit::AiMemory));
            }
        }

        if scope.includes(SearchScope::Conversations) {
            let candidates = self
                .stores
                .conversations
                .messages_with_embeddings(settings.conversation_candidate_limit)
                .await?;
            scored.extend(
                rank_by_similarity(query, candidates, threshold)
                    .into_iter()
                    .map(|s| map_scored(s, SearchHit::Conversation)),
            );
        }

        if scope.includes(SearchScope::Schedule) {
            let appointments = self.stores.schedule.appointments_with_embeddings().await?;
            scored.extend(
                rank_by_similarity(query, appointments, threshold)
                    .into_iter()
                    .map(|s| map_scored(s, SearchHit::Appointment)),
            );
            let reminders = self.stores.schedule.reminders_with_embeddings().await?;
            scored.extend(
                rank_by_similarity(query, reminders, threshold)
                    .into_iter()
                    .map(|s| map_scored(s, SearchHit::Reminder)),
            );
        }

        if scope.includes(SearchScope::Projects) {
            scored.extend(self.score_projects(query, settings).await?);
        }

        sort_scored(&mut scored);
        scored.truncate(limit);
        Ok(scored
            .into_iter()
            .map(|s| SearchResult {
                hit: s.item,
                similarity_score: s.score,
            })
            .collect())
    }

    async fn score_projects(&self, query: &[f32], settings: &SearchConfig) -> Result<Vec<Scored<SearchHit>>> {
        let threshold = settings.similarity_threshold;
        let projects = &self.stores.projects;
        let mut scored = Vec::new();

        for mut hit in rank_by_similarity(query, projects.insights_with_embeddings().await?, threshold) {
            hit.score += importance_boost(hit.item.importance_level, settings.insight_importance_boost);
            scored.push(map_scored(hit, SearchHit::ProjectInsight));
        }
        scored.extend(
            rank_by_similarity(query, projects.dev_conversations_with_embeddings().await?, threshold)
                .into_iter()
                .map(|s| map_scored(s, SearchHit::DevelopmentConversation)),
        );
        scored.extend(
            rank_by_similarity(query, projects.code_context_with_embeddings().await?, threshold)
                .into_iter()
                .map(|s| map_scored(s, SearchHit::CodeContext)),
        );
        Ok(scored)
    }

    async fn text_search(&self, query: &str, request: &SearchRequest, limit: usize) -> Result<Vec<SearchResult>> {
        let words = query_words(query);
        let scope = request.scope;
        let mut hits: Vec<SearchHit> = Vec::new();

        if scope.includes(SearchScope::AiMemories) {
            let memories = self.stores.memories.text_search(&words, &request.filter, limit).await?;
            hits.extend(memories.into_iter().map(SearchHit::AiMemory));
        }
        if scope.includes(SearchScope::Conversations) {
            let messages = self.stores.conversations.text_search(&words, limit).await?;
            hits.extend(messages.into_iter().map(SearchHit::Conversation));
        }
        if scope.includes(SearchScope::Projects) {
            let projects = &self.stores.projects;
            hits.extend(
                projects
                    .search_insights_text(&words, limit)
                    .await?
                    .into_iter()
                    .map(SearchHit::ProjectInsight),
            );
            hits.extend(
                projects
                    .search_dev_conversations_text(&words, limit)
                    .await?
                    .into_iter()
                    .map(SearchHit::DevelopmentConversation),
            );
            hits.extend(
                projects
                    .search_code_context_text(&words, limit)
                    .await?
                    .into_iter()
                    .map(SearchHit::CodeContext),
            );
        }

        let mut seen = HashSet::new();
        Ok(hits
            .into_iter()
            .filter(|hit| seen.insert((hit.kind(), hit.id().to_string())))
            .take(limit)
            .map(|hit| SearchResult {
                hit,
                similarity_score: TEXT_MATCH_SCORE,
            })
            .collect())
    }
}

fn map_scored<T>(scored: Scored<T>, wrap: fn(T) -> SearchHit) -> Scored<SearchHit> {
    Scored {
        item: wrap(scored.item),
        score: scored.score,
    }
}

fn importance_boost(importance: i64, weight: f32) -> f32 {
    importance as f32 / 10.0 * weight
}

/// Lowercase, whitespace-separated query terms with `LIKE` wildcards escaped away.
pub fn query_words(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.replace(['%', '_'], ""))
        .filter(|w| !w.is_empty())
        .collect()
}
