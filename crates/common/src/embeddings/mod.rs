//! Embedding provider abstraction
//!
//! Two provider stacks exist side by side, selected by `ProviderKey`:
//! `CohereStyleEmbedder` (1024 dimensions, `embed-english-v3.0`-shaped API)
//! and `GoogleStyleEmbedder` (768 dimensions, `text-embedding-004`-shaped
//! API). A deterministic `MockEmbedder` backs tests and local development.

use crate::config::{EmbeddingConfig, ProviderKey};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// What the embedded text is used for; providers that support it use this
/// to pick an asymmetric encoding ("search query" vs "search document").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    SearchQuery,
    SearchDocument,
}

impl InputType {
    fn as_cohere_str(self) -> &'static str {
        match self {
            InputType::SearchQuery => "search_query",
            InputType::SearchDocument => "search_document",
        }
    }

    fn as_google_str(self) -> &'static str {
        match self {
            InputType::SearchQuery => "RETRIEVAL_QUERY",
            InputType::SearchDocument => "RETRIEVAL_DOCUMENT",
        }
    }
}

/// Maximum texts embedded in a single upstream request before the embedder
/// splits into sequential batches.
const MAX_BATCH_SIZE: usize = 96;

const MAX_RETRIES: u32 = 3;

/// Trait for embedding generation, shared by both provider stacks.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, input_type: InputType) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;
}

/// Classifies an upstream HTTP failure so the retry loop can decide whether
/// to back off and retry or fail immediately.
enum ProviderFailure {
    RateLimited(String),
    Auth(String),
    Transient(String),
}

impl From<ProviderFailure> for AppError {
    fn from(failure: ProviderFailure) -> Self {
        match failure {
            ProviderFailure::RateLimited(message) => AppError::EmbeddingRateLimited { message },
            ProviderFailure::Auth(message) => AppError::EmbeddingAuth { message },
            ProviderFailure::Transient(message) => AppError::EmbeddingError { message },
        }
    }
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> ProviderFailure {
    match status.as_u16() {
        401 | 403 => ProviderFailure::Auth(format!("{status}: {body}")),
        429 => ProviderFailure::RateLimited(format!("{status}: {body}")),
        _ => ProviderFailure::Transient(format!("{status}: {body}")),
    }
}

/// Runs `attempt` up to `MAX_RETRIES` times with exponential backoff
/// (1s, 2s, 4s) on rate-limit/transient failures; authentication failures
/// fail immediately without retrying.
async fn with_retry<F, Fut, T>(attempt: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, ProviderFailure>>,
{
    let mut last_err = None;

    for retry in 0..MAX_RETRIES {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(ProviderFailure::Auth(message)) => {
                return Err(AppError::EmbeddingAuth { message });
            }
            Err(failure) => {
                let delay = Duration::from_secs(2_u64.pow(retry));
                tracing::warn!(retry, delay_secs = delay.as_secs(), "embedding request failed, retrying");
                last_err = Some(failure);
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_err
        .map(AppError::from)
        .unwrap_or(AppError::EmbeddingError {
            message: "exhausted retries with no recorded error".to_string(),
        }))
}

// ============================================================================
// Cohere-style provider (1024 dimensions)
// ============================================================================

pub struct CohereStyleEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    texts: &'a [String],
    model: &'a str,
    input_type: &'a str,
}

#[derive(Deserialize)]
struct CohereResponse {
    embeddings: Vec<Vec<f32>>,
}

impl CohereStyleEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "embedding.api_key is required for the cohere-style provider".into(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build embedding HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.cohere.ai/v1".to_string()),
        })
    }

    async fn make_request(&self, texts: &[String], input_type: InputType) -> std::result::Result<Vec<Vec<f32>>, ProviderFailure> {
        let url = format!("{}/embed", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CohereRequest {
                texts,
                model: &self.model,
                input_type: input_type.as_cohere_str(),
            })
            .send()
            .await
            .map_err(|e| ProviderFailure::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: CohereResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Transient(format!("failed to parse response: {e}")))?;

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for CohereStyleEmbedder {
    async fn embed(&self, text: &str, input_type: InputType) -> Result<Vec<f32>> {
        let batch = self.embed_batch(std::slice::from_ref(&text.to_string()), input_type).await?;
        batch.into_iter().next().ok_or_else(|| AppError::EmbeddingError {
            message: "empty embedding response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH_SIZE) {
            let embeddings = with_retry(|| self.make_request(chunk, input_type)).await?;
            all.extend(embeddings);
        }
        Ok(all)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        1024
    }
}

// ============================================================================
// Google-style provider (768 dimensions)
// ============================================================================

pub struct GoogleStyleEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct GoogleEmbedRequest<'a> {
    content: GoogleContent<'a>,
    task_type: &'a str,
}

#[derive(Serialize)]
struct GoogleContent<'a> {
    parts: Vec<GooglePart<'a>>,
}

#[derive(Serialize)]
struct GooglePart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GoogleEmbedResponse {
    embedding: GoogleEmbeddingValues,
}

#[derive(Deserialize)]
struct GoogleEmbeddingValues {
    values: Vec<f32>,
}

impl GoogleStyleEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "embedding.api_key is required for the google-style provider".into(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build embedding HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
        })
    }

    async fn embed_one(&self, text: &str, input_type: InputType) -> std::result::Result<Vec<f32>, ProviderFailure> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&GoogleEmbedRequest {
                content: GoogleContent {
                    parts: vec![GooglePart { text }],
                },
                task_type: input_type.as_google_str(),
            })
            .send()
            .await
            .map_err(|e| ProviderFailure::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: GoogleEmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Transient(format!("failed to parse response: {e}")))?;

        Ok(parsed.embedding.values)
    }
}

#[async_trait]
impl Embedder for GoogleStyleEmbedder {
    async fn embed(&self, text: &str, input_type: InputType) -> Result<Vec<f32>> {
        with_retry(|| self.embed_one(text, input_type)).await
    }

    async fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        // This provider has no batch endpoint; issue sequential single calls.
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text, input_type).await?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        768
    }
}

// ============================================================================
// Mock provider
// ============================================================================

/// Deterministic embedder for tests: the vector is derived from the text's
/// hash rather than randomized, so identical inputs produce identical
/// embeddings and similarity comparisons in tests are reproducible.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn deterministic_vector(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        (0..self.dimension)
            .map(|i| {
                let mixed = seed.wrapping_add(i as u64).wrapping_mul(0x9E3779B97F4A7C15);
                ((mixed >> 40) as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str, _input_type: InputType) -> Result<Vec<f32>> {
        Ok(self.deterministic_vector(text))
    }

    async fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text, input_type).await?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Build the configured embedder.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider_key {
        ProviderKey::CohereStyle => Ok(Arc::new(CohereStyleEmbedder::new(config)?)),
        ProviderKey::GoogleStyle => Ok(Arc::new(GoogleStyleEmbedder::new(config)?)),
        ProviderKey::Mock => Ok(Arc::new(MockEmbedder::new(768))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedder_dimension() {
        let embedder = MockEmbedder::new(768);
        let embedding = embedder.embed("test text", InputType::SearchQuery).await.unwrap();
        assert_eq!(embedding.len(), 768);
    }

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(768);
        let a = embedder.embed("zero moment point", InputType::SearchQuery).await.unwrap();
        let b = embedder.embed("zero moment point", InputType::SearchQuery).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_mock_embedder_varies_by_text() {
        let embedder = MockEmbedder::new(768);
        let a = embedder.embed("locomotion", InputType::SearchQuery).await.unwrap();
        let b = embedder.embed("something else entirely", InputType::SearchQuery).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_mock_batch_matches_count() {
        let embedder = MockEmbedder::new(768);
        let texts = vec!["text1".to_string(), "text2".to_string()];
        let embeddings = embedder.embed_batch(&texts, InputType::SearchDocument).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 768);
    }
}
