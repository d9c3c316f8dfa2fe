//! BookRAG Query Gateway
//!
//! The entry point for the RAG query pipeline. Handles:
//! - Request routing and validation
//! - Per-user rate limiting
//! - Observability (structured logging, metrics, tracing)

mod analytics;
mod handlers;
mod rate_limiter;
mod state;

use axum::{
    routing::{get, post},
    Router,
};
use bookrag_common::cache::AnalyticsCache;
use bookrag_common::config::AppConfig;
use bookrag_common::db::{DbPool, Repository};
use bookrag_common::embeddings::create_embedder;
use bookrag_common::metrics;
use bookrag_generation::create_generator;
use bookrag_retrieval::{Retriever, VectorIndexClient};
use metrics_exporter_prometheus::PrometheusBuilder;
use rate_limiter::RateLimiter;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting BookRAG query gateway v{}", bookrag_common::VERSION);

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "failed to load configuration");
        e
    })?;
    let config = Arc::new(config);

    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    info!("Metrics exposed on {}", metrics_addr);
    metrics::register_metrics();

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let repository = Repository::new(db);

    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;

    let vector_client = VectorIndexClient::new(repository.clone());
    vector_client.ensure_collection(embedder.dimension()).await?;
    let retriever = Retriever::new(vector_client);
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.requests_per_hour));
    let analytics_cache = Arc::new(AnalyticsCache::default());

    let state = AppState {
        config: config.clone(),
        repository,
        embedder,
        generator,
        retriever,
        rate_limiter: rate_limiter.clone(),
        analytics_cache,
    };

    spawn_rate_limiter_sweeper(rate_limiter, config.rate_limit.sweep_interval_secs);

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .route("/query", post(handlers::query::submit_query))
        .route("/feedback", post(handlers::feedback::submit_feedback))
        .route("/analytics/summary", get(handlers::analytics::get_analytics_summary));

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Periodically evicts idle rate-limit entries so the map stays bounded
/// under steady load. Housekeeping only, not part of the request path.
fn spawn_rate_limiter_sweeper(rate_limiter: Arc<RateLimiter>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            rate_limiter.sweep();
            tracing::debug!(tracked_users = rate_limiter.tracked_users(), "rate limiter sweep complete");
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("received SIGTERM, starting shutdown..."),
    }
}
