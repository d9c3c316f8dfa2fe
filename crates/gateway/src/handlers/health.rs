//! Health check handler

use crate::state::AppState;
use axum::{extract::State, Json};
use bookrag_common::config::ProviderKey;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct Services {
    pub database: ServiceStatus,
    pub vector_db: ServiceStatus,
    pub llm: ServiceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub services: Services,
    pub version: String,
    pub timestamp: chrono::DateTime<Utc>,
}

/// The vector collection and the relational tables share one Postgres pool
/// in this deployment, so `database` and `vector_db` share one ping.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.repository.ping().await {
        Ok(_) => ServiceStatus::Healthy,
        Err(_) => ServiceStatus::Unhealthy,
    };

    let llm = match state.config.generation.provider_key {
        ProviderKey::Mock => ServiceStatus::Healthy,
        _ if state.config.generation.api_key.is_some() => ServiceStatus::Healthy,
        _ => ServiceStatus::Degraded,
    };

    let status = if database == ServiceStatus::Unhealthy {
        ServiceStatus::Unhealthy
    } else if llm != ServiceStatus::Healthy {
        ServiceStatus::Degraded
    } else {
        ServiceStatus::Healthy
    };

    Json(HealthResponse {
        status,
        services: Services {
            database,
            vector_db: database,
            llm,
        },
        version: bookrag_common::VERSION.to_string(),
        timestamp: Utc::now(),
    })
}
