//! Analytics summary endpoint
//!
//! Fans out five independent sub-aggregations concurrently, joins them,
//! and caches the result for 5 minutes keyed by `start|end|book_or_all`.

use crate::analytics::{estimated_minutes_saved, percentile, top_topics};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use bookrag_common::errors::{AppError, Result};
use bookrag_common::metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsQuery {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub book_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50_ms: i64,
    pub p95_ms: i64,
    pub p99_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRates {
    pub responded: u64,
    pub helpful: u64,
    pub helpful_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_queries: u64,
    pub distinct_users: u64,
    pub latency: LatencyPercentiles,
    pub feedback: FeedbackRates,
    pub average_confidence: f64,
    pub top_topics: Vec<(String, u32)>,
    pub estimated_minutes_saved: f64,
}

pub async fn get_analytics_summary(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsSummary>> {
    if params.end_date <= params.start_date {
        return Err(AppError::Validation {
            message: "end_date must be after start_date".to_string(),
            field: Some("end_date".to_string()),
        });
    }
    if params.start_date > Utc::now() || params.end_date > Utc::now() {
        return Err(AppError::Validation {
            message: "date range must not be in the future".to_string(),
            field: None,
        });
    }

    let cache_key = bookrag_common::cache::AnalyticsCache::key(
        &params.start_date.to_rfc3339(),
        &params.end_date.to_rfc3339(),
        params.book_id.as_deref(),
    );

    if let Some(cached) = state.analytics_cache.get::<AnalyticsSummary>(&cache_key) {
        metrics::record_analytics_cache(true);
        return Ok(Json(cached));
    }
    metrics::record_analytics_cache(false);

    let book_id = params.book_id.as_deref();
    let repository = &state.repository;

    let (total_queries, distinct_users, latencies, average_confidence, feedback, query_texts) = tokio::join!(
        repository.count_queries(params.start_date, params.end_date, book_id),
        repository.count_distinct_users(params.start_date, params.end_date, book_id),
        repository.response_latencies(params.start_date, params.end_date, book_id),
        repository.average_confidence(params.start_date, params.end_date, book_id),
        repository.feedback_rates(params.start_date, params.end_date, book_id),
        repository.query_texts(params.start_date, params.end_date, book_id),
    );

    let total_queries = total_queries?;
    let distinct_users = distinct_users?;
    let latencies = latencies?;
    let average_confidence = average_confidence?;
    let (responded, helpful) = feedback?;
    let query_texts = query_texts?;

    let helpful_rate = if responded > 0 {
        helpful as f64 / responded as f64
    } else {
        0.0
    };

    let summary = AnalyticsSummary {
        total_queries,
        distinct_users,
        latency: LatencyPercentiles {
            p50_ms: percentile(&latencies, 50.0),
            p95_ms: percentile(&latencies, 95.0),
            p99_ms: percentile(&latencies, 99.0),
        },
        feedback: FeedbackRates {
            responded,
            helpful,
            helpful_rate,
        },
        average_confidence,
        top_topics: top_topics(&query_texts, 10),
        estimated_minutes_saved: estimated_minutes_saved(total_queries),
    };

    state.analytics_cache.set(cache_key, &summary);

    Ok(Json(summary))
}
