//! Query Orchestrator
//!
//! Sequences the request path: rate limit, embed, retrieve, pre-LLM
//! refusal, generate, post-LLM refusal, citations, confidence, audit,
//! respond.

use crate::state::{book_title_from_id, AppState};
use axum::{extract::State, Json};
use bookrag_common::auth::ClientIdentity;
use bookrag_common::embeddings::InputType;
use bookrag_common::errors::{AppError, Result};
use bookrag_common::metrics::{self, QueryMetrics};
use bookrag_generation::{build_refusal_message, has_external_reference, is_refusal, should_refuse, QueryMode, RefusalReason};
use bookrag_retrieval::{Citation, CitationBuilder, RetrievedChunk, Retriever};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
pub struct BookContext {
    pub book_id: String,
    pub chapter_number: Option<i32>,
    pub page_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 500, message = "query must be 1-500 characters"))]
    pub query: String,

    #[validate(length(max = 1000, message = "selected_text must be at most 1000 characters"))]
    pub selected_text: Option<String>,

    pub book_context: BookContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query_id: Uuid,
    pub response_text: String,
    pub source_references: Vec<Citation>,
    pub confidence_score: f32,
    pub latency_ms: u64,
    pub timestamp: chrono::DateTime<Utc>,
}

#[tracing::instrument(skip(state, identity, request), fields(query_id))]
pub async fn submit_query(
    State(state): State<AppState>,
    identity: ClientIdentity,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let query_text = request.query.trim();
    if query_text.is_empty() {
        return Err(AppError::Validation {
            message: "query must not be whitespace-only".to_string(),
            field: Some("query".to_string()),
        });
    }

    if !state.rate_limiter.check_and_record(&identity.user_id) {
        metrics::record_rate_limit_rejection();
        return Err(AppError::RateLimited {
            limit: state.config.rate_limit.requests_per_hour,
        });
    }

    let query_id = Uuid::new_v4();
    tracing::Span::current().record("query_id", tracing::field::display(query_id));
    let query_metrics = QueryMetrics::start();
    let started = std::time::Instant::now();

    let query_mode = if request.selected_text.is_some() {
        QueryMode::SelectedText
    } else {
        QueryMode::BookWide
    };

    let embed_started = std::time::Instant::now();
    let embedding = state
        .embedder
        .embed(query_text, InputType::SearchQuery)
        .await
        .map_err(|_| {
            metrics::record_embedding(embed_started.elapsed().as_secs_f64(), false);
            AppError::EmbeddingError {
                message: "embedding provider unavailable".to_string(),
            }
        })?;
    metrics::record_embedding(embed_started.elapsed().as_secs_f64(), true);

    let top_k = state.config.vector.top_k;
    let threshold = state.config.vector.similarity_threshold;

    let retrieval_started = std::time::Instant::now();
    let chunks: Vec<RetrievedChunk> = state
        .retriever
        .retrieve(
            &embedding,
            &request.book_context.book_id,
            request.book_context.chapter_number,
            top_k,
            threshold,
        )
        .await?;
    metrics::record_retrieval(retrieval_started.elapsed().as_secs_f64(), chunks.len());

    let scores: Vec<f32> = chunks.iter().map(|c| c.score).collect();

    let (response_text, mut citations, mut refusal_triggered, mut refusal_reason, generation_params) =
        if should_refuse(&scores, threshold) {
            metrics::record_refusal(RefusalReason::LowSimilarity.as_str());
            (
                build_refusal_message(query_mode, RefusalReason::LowSimilarity).to_string(),
                Vec::new(),
                true,
                Some(RefusalReason::LowSimilarity.as_str().to_string()),
                serde_json::json!({"model": "none", "reason": "pre_llm_refusal"}),
            )
        } else {
            let book_title = book_title_from_id(&request.book_context.book_id);
            let generation_started = std::time::Instant::now();
            let outcome = state
                .generator
                .generate(query_text, &chunks, &book_title)
                .await
                .map_err(|e| {
                    metrics::record_generation(generation_started.elapsed().as_secs_f64(), false);
                    match e {
                        AppError::CircuitBreakerOpen { service } => AppError::CircuitBreakerOpen { service },
                        _ => AppError::GenerationError {
                            message: "generation provider unavailable".to_string(),
                        },
                    }
                })?;
            metrics::record_generation(generation_started.elapsed().as_secs_f64(), true);

            let mut text = outcome.response_text;
            let mut triggered = is_refusal(&text);
            let mut reason = if triggered {
                Some(RefusalReason::InsufficientContext.as_str().to_string())
            } else {
                None
            };

            if query_mode == QueryMode::SelectedText && has_external_reference(&text) {
                text = build_refusal_message(QueryMode::SelectedText, RefusalReason::ExternalReference).to_string();
                triggered = true;
                reason = Some(RefusalReason::ExternalReference.as_str().to_string());
            }

            if triggered {
                metrics::record_refusal(reason.as_deref().unwrap_or("unknown"));
            }

            let generation_params = serde_json::json!({
                "model": outcome.generation_params.model,
                "temperature": outcome.generation_params.temperature,
                "max_tokens": outcome.generation_params.max_tokens,
                "prompt_version": outcome.generation_params.prompt_version,
                "prompt_tokens": outcome.generation_params.prompt_tokens,
                "completion_tokens": outcome.generation_params.completion_tokens,
            });

            (text, Vec::new(), triggered, reason, generation_params)
        };

    if !refusal_triggered {
        citations = CitationBuilder::build(&chunks);
    } else {
        refusal_reason = refusal_reason.or(Some(RefusalReason::InsufficientContext.as_str().to_string()));
    }

    let confidence_score = Retriever::confidence_score(&chunks);
    let latency_ms = started.elapsed().as_millis() as u64;
    let timestamp = Utc::now();

    write_audit_trail(
        &state,
        query_id,
        &identity,
        query_text,
        request.selected_text.as_deref(),
        &embedding,
        &request.book_context,
        &chunks,
        &scores,
        top_k,
        threshold,
        &response_text,
        &citations,
        &generation_params,
        latency_ms,
        confidence_score,
        refusal_triggered,
        refusal_reason.as_deref(),
    )
    .await;

    query_metrics.finish();
    tracing::info!(
        query_id = %query_id,
        latency_ms,
        confidence = confidence_score,
        "query completed"
    );

    Ok(Json(QueryResponse {
        query_id,
        response_text,
        source_references: citations,
        confidence_score,
        latency_ms,
        timestamp,
    }))
}

#[allow(clippy::too_many_arguments)]
async fn write_audit_trail(
    state: &AppState,
    query_id: Uuid,
    identity: &ClientIdentity,
    query_text: &str,
    selected_text: Option<&str>,
    embedding: &[f32],
    book_context: &BookContext,
    chunks: &[RetrievedChunk],
    scores: &[f32],
    top_k: usize,
    threshold: f32,
    response_text: &str,
    citations: &[Citation],
    generation_params: &serde_json::Value,
    latency_ms: u64,
    confidence_score: f32,
    refusal_triggered: bool,
    refusal_reason: Option<&str>,
) {
    let insert_result = state
        .repository
        .insert_query(
            query_id,
            &identity.user_id,
            &identity.ip_address_hash,
            query_text,
            selected_text,
            Some(embedding),
            &book_context.book_id,
            book_context.chapter_number,
            book_context.page_url.as_deref(),
        )
        .await;
    if let Err(e) = insert_result {
        tracing::error!(query_id = %query_id, error = %e, "failed to persist query record");
    }

    let chunk_ids: Vec<Uuid> = chunks.iter().map(|c| c.id).collect();
    let chapter_filter = book_context.chapter_number;
    if let Err(e) = state
        .repository
        .insert_retrieved_context(query_id, &chunk_ids, scores, top_k, threshold, chapter_filter)
        .await
    {
        tracing::error!(query_id = %query_id, error = %e, "failed to persist retrieved context record");
    }

    let source_references = serde_json::json!(citations);
    if let Err(e) = state
        .repository
        .insert_query_response(
            query_id,
            response_text,
            &source_references,
            generation_params,
            latency_ms as i64,
            confidence_score,
            refusal_triggered,
            refusal_reason,
        )
        .await
    {
        tracing::error!(query_id = %query_id, error = %e, "failed to persist response record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_rejects_empty_query() {
        let request = QueryRequest {
            query: "".to_string(),
            selected_text: None,
            book_context: BookContext {
                book_id: "physical-ai-robotics".to_string(),
                chapter_number: None,
                page_url: None,
            },
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_query_request_accepts_normal_query() {
        let request = QueryRequest {
            query: "What is Zero Moment Point used for?".to_string(),
            selected_text: None,
            book_context: BookContext {
                book_id: "physical-ai-robotics".to_string(),
                chapter_number: None,
                page_url: None,
            },
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_selected_text_over_limit_is_rejected() {
        let request = QueryRequest {
            query: "What is ZMP?".to_string(),
            selected_text: Some("x".repeat(1001)),
            book_context: BookContext {
                book_id: "physical-ai-robotics".to_string(),
                chapter_number: None,
                page_url: None,
            },
        };
        assert!(request.validate().is_err());
    }
}
