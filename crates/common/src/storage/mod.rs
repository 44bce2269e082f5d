//! Blob storage for uploaded documents
//!
//! Provides:
//! - The `BlobStore` capability (head/put/get by key)
//! - An S3-compatible implementation (AWS S3, Cloudflare R2, MinIO)
//! - An in-memory implementation

mod memory;
mod s3;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use std::sync::Arc;

/// Metadata of a stored object, obtainable without fetching the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMetadata {
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// A stored object. The body is streamed from the store as it is read.
pub struct BlobObject {
    pub metadata: BlobMetadata,
    pub body: Body,
}

/// Keyed binary object storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Metadata-only existence check
    async fn head(&self, key: &str) -> Result<Option<BlobMetadata>>;

    /// Store `body` under `key`, recording its content type
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;

    /// Fetch an object; `None` when absent
    async fn get(&self, key: &str) -> Result<Option<BlobObject>>;
}

/// Create a blob store based on configuration
pub async fn create_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend.as_str() {
        "s3" => Ok(Arc::new(S3BlobStore::from_config(config).await?)),
        "memory" => {
            tracing::warn!("Using in-memory blob store; files are lost on restart");
            Ok(Arc::new(MemoryBlobStore::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown storage backend: {}", other),
        }),
    }
}
