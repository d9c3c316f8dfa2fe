//! Configuration management for the BookRAG query service
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub vector: VectorConfig,
    pub rate_limit: RateLimitConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Total per-request deadline enforced by the orchestrator (>=5s recommended).
    #[serde(default = "default_query_deadline")]
    pub query_deadline_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

/// Which embedder/generator pair is active. Two provider stacks exist
/// side by side (a migration artifact); exactly one is selected at startup.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKey {
    CohereStyle,
    GoogleStyle,
    Mock,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider_key")]
    pub provider_key: ProviderKey,

    pub api_key: Option<String>,
    pub api_base: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_provider_key")]
    pub provider_key: ProviderKey,

    pub api_key: Option<String>,
    pub api_base: Option<String>,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,

    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,

    #[serde(default = "default_circuit_reset_secs")]
    pub circuit_reset_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,

    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_per_hour")]
    pub requests_per_hour: u32,

    #[serde(default = "default_rate_limit_sweep_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_query_deadline() -> u64 {
    5
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    300
}
fn default_provider_key() -> ProviderKey {
    ProviderKey::Mock
}
fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}
fn default_embedding_timeout() -> u64 {
    10
}
fn default_embedding_retries() -> u32 {
    3
}
fn default_generation_model() -> String {
    "command-r".to_string()
}
fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.0
}
fn default_generation_timeout() -> u64 {
    15
}
fn default_generation_retries() -> u32 {
    3
}
fn default_circuit_failure_threshold() -> u32 {
    5
}
fn default_circuit_reset_secs() -> u64 {
    60
}
fn default_collection_name() -> String {
    "book_chunks_v1".to_string()
}
fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.7
}
fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_rate_limit_per_hour() -> u32 {
    60
}
fn default_rate_limit_sweep_secs() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_json_logging() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_service_name() -> String {
    "bookrag".to_string()
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    pub fn query_deadline(&self) -> Duration {
        Duration::from_secs(self.server.query_deadline_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
                query_deadline_secs: default_query_deadline(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/bookrag".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            embedding: EmbeddingConfig {
                provider_key: default_provider_key(),
                api_key: None,
                api_base: None,
                model: default_embedding_model(),
                timeout_secs: default_embedding_timeout(),
                max_retries: default_embedding_retries(),
            },
            generation: GenerationConfig {
                provider_key: default_provider_key(),
                api_key: None,
                api_base: None,
                model: default_generation_model(),
                max_tokens: default_max_tokens(),
                temperature: default_temperature(),
                timeout_secs: default_generation_timeout(),
                max_retries: default_generation_retries(),
                circuit_failure_threshold: default_circuit_failure_threshold(),
                circuit_reset_secs: default_circuit_reset_secs(),
            },
            vector: VectorConfig {
                url: None,
                api_key: None,
                collection_name: default_collection_name(),
                top_k: default_top_k(),
                similarity_threshold: default_similarity_threshold(),
                chunk_size: default_chunk_size(),
                chunk_overlap: default_chunk_overlap(),
            },
            rate_limit: RateLimitConfig {
                requests_per_hour: default_rate_limit_per_hour(),
                sweep_interval_secs: default_rate_limit_sweep_secs(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.vector.top_k, 5);
        assert_eq!(config.vector.similarity_threshold, 0.7);
        assert_eq!(config.rate_limit.requests_per_hour, 60);
    }

    #[test]
    fn test_generation_defaults_match_contract() {
        let config = AppConfig::default();
        assert_eq!(config.generation.max_tokens, 500);
        assert_eq!(config.generation.temperature, 0.0);
        assert_eq!(config.generation.circuit_failure_threshold, 5);
        assert_eq!(config.generation.circuit_reset_secs, 60);
    }
}
