//! Generator
//!
//! Calls the external LLM with a system prompt carrying the retrieved
//! context, guarded by a circuit breaker and a bounded retry loop. Two
//! concrete providers exist side by side (a vendor migration history),
//! selected together with the embedding provider via the same
//! `ProviderKey`, plus a deterministic mock for tests.

use crate::circuit_breaker::CircuitBreaker;
use crate::prompt::build_system_prompt;
use bookrag_common::config::{GenerationConfig, ProviderKey};
use bookrag_common::errors::{AppError, Result};
use bookrag_retrieval::RetrievedChunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MAX_RETRIES: u32 = 3;

pub const FALLBACK_MESSAGE: &str =
    "I don't have enough information in the retrieved sections to answer this question.";

/// Accounting returned alongside the generated text, persisted verbatim in
/// the response record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub prompt_version: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub response_text: String,
    pub generation_params: GenerationParams,
    pub latency_ms: u64,
}

enum ProviderFailure {
    RateLimited(String),
    Auth(String),
    Transient(String),
}

impl From<ProviderFailure> for AppError {
    fn from(failure: ProviderFailure) -> Self {
        match failure {
            ProviderFailure::RateLimited(message) => AppError::GenerationError {
                message: format!("rate limited: {message}"),
            },
            ProviderFailure::Auth(message) => AppError::GenerationError {
                message: format!("authentication failed: {message}"),
            },
            ProviderFailure::Transient(message) => AppError::GenerationError { message },
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
/// fail immediately. On exhaustion, records the failure against `breaker`.
async fn with_retry<F, Fut, T>(breaker: &CircuitBreaker, attempt: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, ProviderFailure>>,
{
    let mut last_err = None;

    for retry in 0..MAX_RETRIES {
        match attempt().await {
            Ok(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Err(ProviderFailure::Auth(message)) => {
                breaker.record_failure();
                return Err(AppError::GenerationError {
                    message: format!("authentication failed: {message}"),
                });
            }
            Err(failure) => {
                let delay = Duration::from_secs(2_u64.pow(retry));
                tracing::warn!(retry, delay_secs = delay.as_secs(), "generation request failed, retrying");
                last_err = Some(failure);
                tokio::time::sleep(delay).await;
            }
        }
    }

    breaker.record_failure();
    Err(last_err.map(AppError::from).unwrap_or(AppError::GenerationError {
        message: "exhausted retries with no recorded error".to_string(),
    }))
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        user_query: &str,
        chunks: &[RetrievedChunk],
        book_title: &str,
    ) -> Result<GenerationOutcome>;
}

fn empty_context_outcome(started: Instant) -> GenerationOutcome {
    GenerationOutcome {
        response_text: FALLBACK_MESSAGE.to_string(),
        generation_params: GenerationParams {
            model: "fallback".to_string(),
            temperature: 0.0,
            max_tokens: 0,
            prompt_version: "v1".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
        },
        latency_ms: started.elapsed().as_millis() as u64,
    }
}

/// Rough token estimate (4 characters per token) used when a provider does
/// not return usage accounting.
fn estimate_tokens(text: &str) -> u32 {
    ((text.len() as f32) / 4.0).ceil() as u32
}

// ============================================================================
// Cohere-style provider
// ============================================================================

pub struct CohereStyleGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    breaker: CircuitBreaker,
}

#[derive(Serialize)]
struct CohereChatRequest<'a> {
    model: &'a str,
    message: &'a str,
    preamble: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CohereChatResponse {
    text: String,
    #[serde(default)]
    meta: Option<CohereMeta>,
}

#[derive(Deserialize)]
struct CohereMeta {
    #[serde(default)]
    billed_units: Option<CohereBilledUnits>,
}

#[derive(Deserialize)]
struct CohereBilledUnits {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

impl CohereStyleGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "generation.api_key is required for the cohere-style provider".into(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build generation HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.cohere.ai/v1".to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            breaker: CircuitBreaker::new(
                "generator-cohere",
                config.circuit_failure_threshold,
                config.circuit_reset_secs,
            ),
        })
    }

    async fn call(&self, prompt: &str, query: &str) -> std::result::Result<(String, u32, u32), ProviderFailure> {
        let url = format!("{}/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CohereChatRequest {
                model: &self.model,
                message: query,
                preamble: prompt,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .send()
            .await
            .map_err(|e| ProviderFailure::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: CohereChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Transient(format!("failed to parse response: {e}")))?;

        let (prompt_tokens, completion_tokens) = parsed
            .meta
            .and_then(|m| m.billed_units)
            .map(|u| (u.input_tokens.unwrap_or(0), u.output_tokens.unwrap_or(0)))
            .unwrap_or((estimate_tokens(prompt), estimate_tokens(&parsed.text)));

        Ok((parsed.text.trim().to_string(), prompt_tokens, completion_tokens))
    }
}

#[async_trait]
impl Generator for CohereStyleGenerator {
    async fn generate(
        &self,
        user_query: &str,
        chunks: &[RetrievedChunk],
        book_title: &str,
    ) -> Result<GenerationOutcome> {
        let started = Instant::now();
        if chunks.is_empty() {
            return Ok(empty_context_outcome(started));
        }

        self.breaker.check()?;
        let prompt = build_system_prompt(book_title, chunks, user_query);
        let (text, prompt_tokens, completion_tokens) =
            with_retry(&self.breaker, || self.call(&prompt, user_query)).await?;

        Ok(GenerationOutcome {
            response_text: text,
            generation_params: GenerationParams {
                model: self.model.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                prompt_version: "v1".to_string(),
                prompt_tokens,
                completion_tokens,
            },
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

// ============================================================================
// Google-style provider
// ============================================================================

pub struct GoogleStyleGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    breaker: CircuitBreaker,
}

#[derive(Serialize)]
struct GoogleGenerateRequest<'a> {
    contents: Vec<GoogleContent<'a>>,
    #[serde(rename = "systemInstruction")]
    system_instruction: GoogleContent<'a>,
    #[serde(rename = "generationConfig")]
    generation_config: GoogleGenerationConfig,
}

#[derive(Serialize)]
struct GoogleContent<'a> {
    parts: Vec<GooglePart<'a>>,
}

#[derive(Serialize)]
struct GooglePart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GoogleGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GoogleGenerateResponse {
    candidates: Vec<GoogleCandidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<GoogleUsageMetadata>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: GoogleResponseContent,
}

#[derive(Deserialize)]
struct GoogleResponseContent {
    parts: Vec<GoogleResponsePart>,
}

#[derive(Deserialize)]
struct GoogleResponsePart {
    text: String,
}

#[derive(Deserialize)]
struct GoogleUsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
}

impl GoogleStyleGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "generation.api_key is required for the google-style provider".into(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build generation HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            breaker: CircuitBreaker::new(
                "generator-google",
                config.circuit_failure_threshold,
                config.circuit_reset_secs,
            ),
        })
    }

    async fn call(&self, prompt: &str, query: &str) -> std::result::Result<(String, u32, u32), ProviderFailure> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(&GoogleGenerateRequest {
                contents: vec![GoogleContent {
                    parts: vec![GooglePart { text: query }],
                }],
                system_instruction: GoogleContent {
                    parts: vec![GooglePart { text: prompt }],
                },
                generation_config: GoogleGenerationConfig {
                    temperature: self.temperature,
                    max_output_tokens: self.max_tokens,
                },
            })
            .send()
            .await
            .map_err(|e| ProviderFailure::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: GoogleGenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Transient(format!("failed to parse response: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ProviderFailure::Transient("empty candidates list".to_string()))?;

        let (prompt_tokens, completion_tokens) = parsed
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((estimate_tokens(prompt), estimate_tokens(&text)));

        Ok((text.trim().to_string(), prompt_tokens, completion_tokens))
    }
}

#[async_trait]
impl Generator for GoogleStyleGenerator {
    async fn generate(
        &self,
        user_query: &str,
        chunks: &[RetrievedChunk],
        book_title: &str,
    ) -> Result<GenerationOutcome> {
        let started = Instant::now();
        if chunks.is_empty() {
            return Ok(empty_context_outcome(started));
        }

        self.breaker.check()?;
        let prompt = build_system_prompt(book_title, chunks, user_query);
        let (text, prompt_tokens, completion_tokens) =
            with_retry(&self.breaker, || self.call(&prompt, user_query)).await?;

        Ok(GenerationOutcome {
            response_text: text,
            generation_params: GenerationParams {
                model: self.model.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                prompt_version: "v1".to_string(),
                prompt_tokens,
                completion_tokens,
            },
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

// ============================================================================
// Mock provider
// ============================================================================

/// Deterministic generator for tests and local development: echoes back a
/// templated answer referencing the first retrieved chunk's source.
pub struct MockGenerator {
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            model: "mock-generation".to_string(),
            max_tokens: 500,
            temperature: 0.0,
        }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(
        &self,
        user_query: &str,
        chunks: &[RetrievedChunk],
        _book_title: &str,
    ) -> Result<GenerationOutcome> {
        let started = Instant::now();
        if chunks.is_empty() {
            return Ok(empty_context_outcome(started));
        }

        let first = &chunks[0];
        let response_text = format!(
            "Based on {} ({}), here is an answer to \"{}\": {}",
            first.chapter_title, first.section, user_query, first.content
        );

        Ok(GenerationOutcome {
            response_text: response_text.clone(),
            generation_params: GenerationParams {
                model: self.model.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                prompt_version: "v1".to_string(),
                prompt_tokens: estimate_tokens(user_query),
                completion_tokens: estimate_tokens(&response_text),
            },
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Build the configured generator.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider_key {
        ProviderKey::CohereStyle => Ok(Arc::new(CohereStyleGenerator::new(config)?)),
        ProviderKey::GoogleStyle => Ok(Arc::new(GoogleStyleGenerator::new(config)?)),
        ProviderKey::Mock => Ok(Arc::new(MockGenerator::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chunk() -> RetrievedChunk {
        RetrievedChunk {
            id: Uuid::new_v4(),
            score: 0.9,
            book_id: "physical-ai-robotics".to_string(),
            chapter_number: 0,
            chapter_title: "Module 0 - Foundations".to_string(),
            section: "Locomotion and Motor Control".to_string(),
            section_slug: "locomotion-motor-control".to_string(),
            source_file: "docs/chapters/module-0/04-locomotion.md".to_string(),
            content: "Zero moment point is a key stability criterion.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_context_short_circuits_to_fallback() {
        let generator = MockGenerator::new();
        let outcome = generator.generate("What is ZMP?", &[], "Physical AI").await.unwrap();
        assert_eq!(outcome.response_text, FALLBACK_MESSAGE);
        assert_eq!(outcome.generation_params.model, "fallback");
        assert_eq!(outcome.generation_params.prompt_tokens, 0);
        assert_eq!(outcome.generation_params.completion_tokens, 0);
    }

    #[tokio::test]
    async fn test_mock_generator_references_top_chunk() {
        let generator = MockGenerator::new();
        let chunks = vec![chunk()];
        let outcome = generator.generate("What is ZMP?", &chunks, "Physical AI").await.unwrap();
        assert!(outcome.response_text.contains("Module 0 - Foundations"));
        assert!(outcome.response_text.contains("Zero moment point"));
    }

    #[test]
    fn test_circuit_breaker_blocks_after_threshold() {
        let breaker = CircuitBreaker::new("test", 5, 60);
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.check().is_err());
    }
}
