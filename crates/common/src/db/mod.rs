//! Database layer for the query pipeline
//!
//! Provides:
//! - SeaORM entity models for the audit trail (queries, retrieved contexts,
//!   responses, feedback)
//! - Repository pattern for data access, including the raw-SQL pgvector
//!   similarity search
//! - Connection pool management

pub mod models;
mod repository;

pub use repository::{ChunkResult, Repository};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pub primary: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(true);

        let primary = Database::connect(opts).await.map_err(|e| AppError::DatabaseConnection {
            message: format!("Failed to connect to database: {}", e),
        })?;

        info!("Database connection established");

        Ok(Self { primary })
    }

    /// Get the connection for reads.
    pub fn read(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Get the connection for writes.
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity.
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Database ping failed: {}", e),
            })?;

        Ok(())
    }
}
