//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions for the query pipeline.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all BookRAG metrics
pub const METRICS_PREFIX: &str = "bookrag";

/// SLO-aligned histogram buckets for end-to-end query latency (seconds).
/// Target: p95 < 3s.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.050, 0.100, 0.250, 0.500, 1.000, 1.500, 2.000, 3.000, 5.000, 10.00,
];

/// Buckets for upstream provider latency (embedding/generation), typically slower.
pub const PROVIDER_BUCKETS: &[f64] = &[
    0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 15.00, 30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of queries submitted"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end query latency in seconds"
    );

    describe_counter!(
        format!("{}_refusals_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of refused queries, labeled by reason"
    );

    describe_counter!(
        format!("{}_rate_limit_rejections_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of requests rejected by the rate limiter"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding provider latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding provider errors"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Generation provider latency in seconds"
    );

    describe_counter!(
        format!("{}_generation_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total generation provider errors"
    );

    describe_gauge!(
        format!("{}_circuit_breaker_open", METRICS_PREFIX),
        Unit::Count,
        "1 if the generator circuit breaker is open, 0 otherwise"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Vector index retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of chunks returned from retrieval"
    );

    describe_counter!(
        format!("{}_analytics_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total analytics summary cache hits"
    );

    describe_counter!(
        format!("{}_analytics_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total analytics summary cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record end-to-end query metrics
pub struct QueryMetrics {
    start: Instant,
}

impl QueryMetrics {
    pub fn start() -> Self {
        counter!(format!("{}_queries_total", METRICS_PREFIX)).increment(1);
        Self {
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed().as_secs_f64();
        histogram!(format!("{}_query_duration_seconds", METRICS_PREFIX)).record(duration);
    }
}

/// Record a refusal, labeled by reason.
pub fn record_refusal(reason: &str) {
    counter!(
        format!("{}_refusals_total", METRICS_PREFIX),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a rate-limit rejection.
pub fn record_rate_limit_rejection() {
    counter!(format!("{}_rate_limit_rejections_total", METRICS_PREFIX)).increment(1);
}

/// Record embedding provider call outcome.
pub fn record_embedding(duration_secs: f64, success: bool) {
    if success {
        histogram!(format!("{}_embedding_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    } else {
        counter!(format!("{}_embedding_errors_total", METRICS_PREFIX)).increment(1);
    }
}

/// Record generation provider call outcome.
pub fn record_generation(duration_secs: f64, success: bool) {
    if success {
        histogram!(format!("{}_generation_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    } else {
        counter!(format!("{}_generation_errors_total", METRICS_PREFIX)).increment(1);
    }
}

/// Record the generator circuit-breaker state.
pub fn record_circuit_state(open: bool) {
    gauge!(format!("{}_circuit_breaker_open", METRICS_PREFIX)).set(if open { 1.0 } else { 0.0 });
}

/// Record a retrieval call.
pub fn record_retrieval(duration_secs: f64, result_count: usize) {
    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    gauge!(format!("{}_retrieval_results_count", METRICS_PREFIX)).set(result_count as f64);
}

/// Record an analytics cache lookup.
pub fn record_analytics_cache(hit: bool) {
    if hit {
        counter!(format!("{}_analytics_cache_hits_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_analytics_cache_misses_total", METRICS_PREFIX)).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
        assert!(LATENCY_BUCKETS.contains(&3.000));
    }

    #[test]
    fn test_query_metrics_runs() {
        let metrics = QueryMetrics::start();
        std::thread::sleep(std::time::Duration::from_millis(5));
        metrics.finish();
    }
}
