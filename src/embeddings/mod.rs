//! Text embeddings.
//!
//! Memoria talks to any server exposing the OpenAI `/v1/embeddings` API
//! (LM Studio by default). Servers that load models just in time answer the
//! first requests with "model does not exist"-style errors while the model
//! warms up, so those responses are retried with a linear backoff.

use crate::types::{AppError, Result};
use crate::utils::toml_config::MemoriaConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Produces an embedding vector for a piece of text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier reported in health output.
    fn model_name(&self) -> &str;
}

/// Build the provider described by `[embeddings]`.
pub fn from_config(config: &MemoriaConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    if !config.embeddings.enabled {
        info!("Embeddings disabled; search will use text matching");
        return Ok(Arc::new(DisabledEmbeddings));
    }
    let api_key = config
        .embeddings_api_key()
        .map_err(|e| AppError::Configuration(e.to_string()))?;
    let cfg = &config.embeddings;
    let provider = OpenAiCompatibleEmbeddings::new(&cfg.base_url, &cfg.model)?
        .with_api_key(api_key)
        .with_timeout(Duration::from_secs(cfg.timeout_secs))?
        .with_retries(cfg.warmup_retries, cfg.max_retries)
        .with_retry_delay(Duration::from_secs(cfg.retry_delay_secs));
    Ok(Arc::new(provider))
}

/// Substrings of error bodies that mean "the model is still loading".
const MODEL_LOADING_MARKERS: [&str; 3] = [
    "model does not exist",
    "failed to load model",
    "cannot read properties of null",
];

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings endpoint.
pub struct OpenAiCompatibleEmbeddings {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    warmup_attempts: u32,
    attempts: u32,
    retry_delay: Duration,
    warmed_up: AtomicBool,
}

impl OpenAiCompatibleEmbeddings {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: embeddings_endpoint(base_url),
            model: model.to_string(),
            api_key: None,
            warmup_attempts: 5,
            attempts: 3,
            retry_delay: Duration::from_secs(5),
            warmed_up: AtomicBool::new(false),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to build HTTP client: {}", e)))?;
        Ok(self)
    }

    /// Attempt budgets before and after the first successful request.
    pub fn with_retries(mut self, warmup_attempts: u32, attempts: u32) -> Self {
        self.warmup_attempts = warmup_attempts.max(1);
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn attempt_budget(&self) -> u32 {
        if self.warmed_up.load(Ordering::Relaxed) {
            self.attempts
        } else {
            self.warmup_attempts
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let budget = self.attempt_budget();
        let body = EmbeddingRequest {
            input: text,
            model: &self.model,
        };

        for attempt in 0..budget {
            let mut request = self.client.post(&self.endpoint).json(&body);
            if let Some(ref key) = self.api_key {
                request = request.bearer_auth(key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| AppError::Embedding(format!("Embedding request failed: {}", e)))?;
            let status = response.status();

            if status.is_success() {
                let parsed: EmbeddingResponse = response
                    .json()
                    .await
                    .map_err(|e| AppError::Embedding(format!("Malformed embedding response: {}", e)))?;
                let embedding = parsed
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .filter(|e| !e.is_empty())
                    .ok_or_else(|| AppError::Embedding("Empty embedding response".to_string()))?;

                if !self.warmed_up.swap(true, Ordering::Relaxed) {
                    info!(model = %self.model, dimensions = embedding.len(), "Embedding model ready");
                }
                return Ok(embedding);
            }

            let detail = response.text().await.unwrap_or_default();
            let loading = matches!(status.as_u16(), 400 | 404) && is_model_loading(&detail);
            if loading && attempt + 1 < budget {
                let wait = self.retry_delay * (attempt + 1);
                warn!(
                    model = %self.model,
                    attempt = attempt + 1,
                    budget,
                    "Embedding model not loaded yet, retrying in {:?}",
                    wait
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            debug!(status = %status, body = %detail, "Embedding request rejected");
            return Err(AppError::Embedding(format!(
                "Embedding endpoint returned {}: {}",
                status,
                truncate(&detail, 200)
            )));
        }

        Err(AppError::Embedding(format!(
            "Embedding model {} did not load after {} attempts",
            self.model, budget
        )))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Provider used when embeddings are switched off; every call fails so
/// callers fall back to text search.
pub struct DisabledEmbeddings;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AppError::Embedding("Embeddings are disabled".to_string()))
    }

    fn model_name(&self) -> &str {
        "disabled"
    }
}

fn is_model_loading(body: &str) -> bool {
    let body = body.to_lowercase();
    MODEL_LOADING_MARKERS.iter().any(|m| body.contains(m))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

/// `{base}/v1/embeddings`, respecting bases that already carry a version
/// segment or the full path.
pub fn embeddings_endpoint(base_url: &str) -> String {
    let normalized = normalize_base_url(base_url);
    if normalized.ends_with("/embeddings") {
        return normalized;
    }
    if has_version_suffix(&normalized) {
        return format!("{normalized}/embeddings");
    }
    format!("{normalized}/v1/embeddings")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://localhost:1234", "http://localhost:1234/v1/embeddings")]
    #[case("http://localhost:1234/", "http://localhost:1234/v1/embeddings")]
    #[case("http://localhost:11434/v1", "http://localhost:11434/v1/embeddings")]
    #[case("https://api.example.com/v2/", "https://api.example.com/v2/embeddings")]
    #[case("http://host/v1/embeddings", "http://host/v1/embeddings")]
    fn test_endpoint_normalization(#[case] base: &str, #[case] expected: &str) {
        assert_eq!(embeddings_endpoint(base), expected);
    }

    #[rstest]
    #[case(r#"{"error":"Model does not exist"}"#, true)]
    #[case("Failed to load model 'nomic'", true)]
    #[case("TypeError: Cannot read properties of null (reading 'x')", true)]
    #[case("invalid input", false)]
    fn test_model_loading_detection(#[case] body: &str, #[case] expected: bool) {
        assert_eq!(is_model_loading(body), expected);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[tokio::test]
    async fn test_disabled_always_fails() {
        assert!(DisabledEmbeddings.embed("x").await.is_err());
        assert_eq!(DisabledEmbeddings.model_name(), "disabled");
    }

    #[test]
    fn test_from_config_disabled() {
        let mut config = MemoriaConfig::default();
        config.embeddings.enabled = false;
        let provider = from_config(&config).unwrap();
        assert_eq!(provider.model_name(), "disabled");
    }
}
