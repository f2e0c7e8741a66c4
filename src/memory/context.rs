//! Prompt context built from stored memory.
//!
//! This module provides utilities for:
//! - Formatting search hits and recent messages for LLM prompts
//! - Keeping that context inside a token budget
//! - Recording both sides of an exchange after the model answers

use super::MemorySystem;
use crate::search::{SearchRequest, SearchResult};
use crate::types::{MessageRole, NewMessage, Result, StoreMessageOutcome, StoredMessage};

/// Default number of recent messages to include in context.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Default number of memories retrieved per query.
pub const DEFAULT_MEMORY_LIMIT: usize = 5;

/// Default token budget for the assembled system prompt.
pub const DEFAULT_CONTEXT_TOKENS: usize = 2000;

/// Limits applied while assembling prompt context.
#[derive(Debug, Clone)]
pub struct ContextBudget {
    pub max_tokens: usize,
    pub memory_limit: usize,
    pub history_window: usize,
    /// Restrict history to one session
    pub session_id: Option<String>,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_CONTEXT_TOKENS,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            history_window: DEFAULT_HISTORY_WINDOW,
            session_id: None,
        }
    }
}

impl ContextBudget {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }
}

/// System prompt plus the pieces it was assembled from.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub system_prompt: String,
    pub memories: Vec<SearchResult>,
    pub history: Vec<StoredMessage>,
    pub estimated_tokens: usize,
}

/// Estimates token count for a piece of text.
///
/// Uses a simple heuristic of ~4 characters per token for English text.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

fn memory_line(result: &SearchResult) -> String {
    format!(
        "- [{}] {} (relevance {:.2})",
        result.hit.kind(),
        result.hit.text(),
        result.similarity_score
    )
}

/// Formats search hits into a prompt section, or an empty string when
/// there are none.
///
/// ```ignore
/// let block = format_memory_block(&response.results);
/// // "Relevant memories:\n- [ai_memory] Prefers concise answers (relevance 0.87)"
/// ```
pub fn format_memory_block(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = results.iter().map(memory_line).collect();
    format!("Relevant memories:\n{}", lines.join("\n"))
}

/// Formats messages as `role: content` lines under a heading.
pub fn format_history_block(history: &[StoredMessage]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = history
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect();
    format!("Recent conversation:\n{}", lines.join("\n"))
}

/// Truncates chronological history to fit within a token budget.
///
/// Removes the oldest messages first.
pub fn truncate_history_to_tokens(history: &[StoredMessage], token_budget: usize) -> Vec<StoredMessage> {
    let mut result: Vec<StoredMessage> = Vec::new();
    let mut total_tokens = 0;

    for msg in history.iter().rev() {
        let msg_tokens = estimate_tokens(&msg.content);
        if total_tokens + msg_tokens > token_budget {
            break;
        }
        result.push(msg.clone());
        total_tokens += msg_tokens;
    }

    result.reverse();
    result
}

/// Build a system prompt enriched with memories relevant to `query` and
/// the recent conversation.
///
/// Memories are kept best-first while they fit; history fills what is left
/// of the budget, dropping its oldest messages first.
pub async fn build_prompt_context(
    system: &MemorySystem,
    base_prompt: &str,
    query: &str,
    budget: &ContextBudget,
) -> Result<PromptContext> {
    let mut remaining = budget.max_tokens.saturating_sub(estimate_tokens(base_prompt));

    let mut memories = Vec::new();
    if !query.trim().is_empty() && budget.memory_limit > 0 {
        let response = system
            .search_memories(&SearchRequest::new(query).limit(budget.memory_limit))
            .await?;
        for result in response.results {
            let cost = estimate_tokens(&memory_line(&result));
            if cost > remaining {
                break;
            }
            remaining -= cost;
            memories.push(result);
        }
    }

    let recent = system
        .get_recent_context(budget.history_window, budget.session_id.as_deref())
        .await?;
    let history = truncate_history_to_tokens(&recent, remaining);

    let system_prompt = [
        base_prompt.trim().to_string(),
        format_memory_block(&memories),
        format_history_block(&history),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("\n\n");

    Ok(PromptContext {
        estimated_tokens: estimate_tokens(&system_prompt),
        system_prompt,
        memories,
        history,
    })
}

/// Store a user message and the assistant's reply in the same conversation.
pub async fn remember_exchange(
    system: &MemorySystem,
    user_message: &str,
    assistant_response: &str,
    session_id: &str,
) -> Result<(StoreMessageOutcome, StoreMessageOutcome)> {
    let user = system
        .store_conversation(NewMessage::new(MessageRole::User, user_message).in_session(session_id))
        .await?;

    let mut reply = NewMessage::new(MessageRole::Assistant, assistant_response).in_session(session_id);
    if let Some(ref conversation_id) = user.conversation_id {
        reply = reply.in_conversation(conversation_id.as_str());
    }
    let assistant = system.store_conversation(reply).await?;
    Ok((user, assistant))
}
