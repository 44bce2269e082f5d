//! Compendium Common Library
//!
//! Shared code for the Compendium paper library service including:
//! - Paper model and metadata store (relational)
//! - Blob store abstraction for uploaded documents
//! - Managed RAG search client
//! - Bearer token authorization
//! - Upload and search pipelines
//! - Error types, configuration and metrics

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod search;
pub mod services;
pub mod storage;

// Re-export commonly used types
pub use auth::{AuthorizedPrincipal, Authorizer, TokenVerifier};
pub use config::AppConfig;
pub use db::{MetadataStore, Repository};
pub use errors::{AppError, Result};
pub use search::SearchService;
pub use storage::BlobStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The only document type accepted for upload
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Default upload size limit (50 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Default reranking model for the managed search service
pub const DEFAULT_RERANKING_MODEL: &str = "@cf/baai/bge-reranker-base";
