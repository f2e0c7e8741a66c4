//! Mock implementations for testing.
//!
//! Embedding providers that need no network, shared by the integration
//! test files.

use async_trait::async_trait;
use memoria::types::{AppError, Result};
use memoria::EmbeddingProvider;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Keyword groups; each one is a dimension of the mock embedding space.
const TOPICS: &[&[&str]] = &[
    &["coffee", "espresso", "latte", "tea", "milk"],
    &["rust", "python", "code", "compiler", "function", "refactor"],
    &["flight", "trip", "travel", "hotel", "airport"],
    &["doctor", "dentist", "allergy", "peanuts", "health"],
    &["birthday", "party", "gift", "cake"],
];

/// Deterministic embedder: counts topic keywords, so texts about the same
/// topic are similar and texts about different topics are orthogonal.
///
/// ```ignore
/// let embedder = MockEmbedder::new();
/// let a = embedder.embed("oat milk latte").await?;   // coffee axis
/// let b = embedder.embed("book a hotel").await?;     // travel axis
/// ```
#[derive(Default)]
pub struct MockEmbedder {
    calls: AtomicUsize,
    failing: AtomicBool,
    slow_keyword: Option<(&'static str, Duration)>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that fails every request, like an unreachable endpoint.
    pub fn failing() -> Self {
        let mock = Self::default();
        mock.failing.store(true, Ordering::SeqCst);
        mock
    }

    /// Delay every text containing `keyword`, so its embedding finishes
    /// after later requests.
    pub fn with_delay_for(mut self, keyword: &'static str, delay: Duration) -> Self {
        self.slow_keyword = Some((keyword, delay));
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        TOPICS
            .iter()
            .map(|topic| words.iter().filter(|w| topic.contains(w)).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Embedding("Mock embedding failure".to_string()));
        }
        if let Some((keyword, delay)) = self.slow_keyword {
            if text.to_lowercase().contains(keyword) {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(Self::vector_for(text))
    }

    fn model_name(&self) -> &str {
        "mock-keywords"
    }
}
