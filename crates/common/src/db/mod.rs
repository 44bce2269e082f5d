//! Metadata store for Compendium
//!
//! Provides:
//! - SeaORM entity model for papers
//! - The `MetadataStore` capability used by the pipelines
//! - A Postgres-backed repository and an in-memory store
//! - Connection pool management

mod memory;
pub mod models;
mod repository;

pub use memory::MemoryMetadataStore;
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::db::models::Paper;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Relational store holding one row per uploaded paper
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a fully formed paper row
    async fn insert_paper(&self, paper: Paper) -> Result<()>;

    /// All papers, newest upload first
    async fn list_papers(&self) -> Result<Vec<Paper>>;

    /// Papers whose filename is one of `filenames` (single batched lookup)
    async fn find_by_filenames(&self, filenames: &[String]) -> Result<Vec<Paper>>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Database::connect(connect_options(&config.url, config))
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to primary: {}", e),
            })?;

        // Connect to replica if configured
        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");

            let replica_conn = Database::connect(connect_options(read_url, config))
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Failed to connect to replica: {}", e),
                })?;

            Some(replica_conn)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }
}

fn connect_options(url: &str, config: &DatabaseConfig) -> ConnectOptions {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);
    opts
}

/// Create a metadata store based on configuration
pub async fn create_metadata_store(config: &DatabaseConfig) -> Result<Arc<dyn MetadataStore>> {
    match config.backend.as_str() {
        "postgres" => {
            let repo = Repository::new(DbPool::new(config).await?);
            repo.ensure_schema().await?;
            Ok(Arc::new(repo))
        }
        "memory" => {
            tracing::warn!("Using in-memory metadata store; papers are lost on restart");
            Ok(Arc::new(MemoryMetadataStore::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown database backend: {}", other),
        }),
    }
}
