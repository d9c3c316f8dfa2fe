//! Error types for the BookRAG query service
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    InvalidFormat,
    PayloadTooLarge,

    // Resource errors (4xxx)
    NotFound,
    ResponseNotFound,

    // Rate limiting (6xxx)
    RateLimitExceeded,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    EmbeddingFailed,
    EmbeddingRateLimited,
    EmbeddingAuth,
    RetrievalFailed,
    GenerationFailed,
    CircuitBreakerOpen,
    CacheError,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::PayloadTooLarge => 1004,

            ErrorCode::NotFound => 4001,
            ErrorCode::ResponseNotFound => 4002,

            ErrorCode::RateLimitExceeded => 6001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::EmbeddingFailed => 8001,
            ErrorCode::EmbeddingRateLimited => 8002,
            ErrorCode::EmbeddingAuth => 8003,
            ErrorCode::RetrievalFailed => 8004,
            ErrorCode::GenerationFailed => 8005,
            ErrorCode::CircuitBreakerOpen => 8006,
            ErrorCode::CacheError => 8007,
            ErrorCode::UpstreamError => 8008,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Response not found: {id}")]
    ResponseNotFound { id: String },

    #[error("Rate limit exceeded: {limit} requests per hour")]
    RateLimited { limit: u32 },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Embedding rate limited: {message}")]
    EmbeddingRateLimited { message: String },

    #[error("Embedding authentication failed: {message}")]
    EmbeddingAuth { message: String },

    #[error("Retrieval failed: {message}")]
    RetrievalError { message: String },

    #[error("Generation failed: {message}")]
    GenerationError { message: String },

    #[error("Circuit breaker open for service: {service}")]
    CircuitBreakerOpen { service: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::ResponseNotFound { .. } => ErrorCode::ResponseNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimitExceeded,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingFailed,
            AppError::EmbeddingRateLimited { .. } => ErrorCode::EmbeddingRateLimited,
            AppError::EmbeddingAuth { .. } => ErrorCode::EmbeddingAuth,
            AppError::RetrievalError { .. } => ErrorCode::RetrievalFailed,
            AppError::GenerationError { .. } => ErrorCode::GenerationFailed,
            AppError::CircuitBreakerOpen { .. } => ErrorCode::CircuitBreakerOpen,
            AppError::CacheError { .. } => ErrorCode::CacheError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            AppError::NotFound { .. } | AppError::ResponseNotFound { .. } => {
                StatusCode::NOT_FOUND
            }

            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            AppError::EmbeddingAuth { .. } => StatusCode::BAD_GATEWAY,

            AppError::EmbeddingError { .. }
            | AppError::EmbeddingRateLimited { .. }
            | AppError::RetrievalError { .. }
            | AppError::GenerationError { .. }
            | AppError::CircuitBreakerOpen { .. }
            | AppError::CacheError { .. }
            | AppError::HttpClient(_)
            | AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable string code carried in the HTTP body, per the external contract.
    pub fn body_code(&self) -> &'static str {
        match self {
            AppError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::EmbeddingError { .. }
            | AppError::EmbeddingRateLimited { .. }
            | AppError::EmbeddingAuth { .. } => "EMBEDDING_FAILED",
            AppError::RetrievalError { .. } => "RETRIEVAL_FAILED",
            AppError::GenerationError { .. } => "GENERATION_FAILED",
            AppError::CircuitBreakerOpen { .. } => "SERVICE_UNAVAILABLE",
            AppError::Validation { .. } | AppError::MissingField { .. } | AppError::InvalidFormat { .. } => {
                "VALIDATION_ERROR"
            }
            _ => "INTERNAL_ERROR",
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "request failed"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "request rejected"
            );
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("error").to_string(),
            message,
            code: self.body_code().to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::RetrievalError {
            message: "index down".into(),
        };
        assert_eq!(err.code(), ErrorCode::RetrievalFailed);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.body_code(), "RETRIEVAL_FAILED");
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "query too short".into(),
            field: Some("query".into()),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_rate_limited_error() {
        let err = AppError::RateLimited { limit: 60 };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.body_code(), "RATE_LIMIT_EXCEEDED");
    }

    #[test]
    fn test_circuit_breaker_maps_to_service_unavailable() {
        let err = AppError::CircuitBreakerOpen {
            service: "generator".into(),
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.body_code(), "SERVICE_UNAVAILABLE");
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "unexpected".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
