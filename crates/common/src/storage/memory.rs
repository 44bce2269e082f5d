//! In-memory blob store

use super::{BlobMetadata, BlobObject, BlobStore};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Blob store kept in process memory. ETags are the quoted hex SHA-256
/// of the content.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, StoredBlob>>,
    fail_heads: AtomicBool,
    fail_puts: AtomicBool,
    puts: AtomicUsize,
}

struct StoredBlob {
    metadata: BlobMetadata,
    bytes: Bytes,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent existence check fail
    pub fn set_fail_heads(&self, fail: bool) {
        self.fail_heads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent put fail
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    /// Stored content of `key`, read without going through `get`
    pub async fn bytes(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|blob| blob.bytes.clone())
    }
}

fn content_etag(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("\"{}\"", hex::encode(hasher.finalize()))
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn head(&self, key: &str) -> Result<Option<BlobMetadata>> {
        if self.fail_heads.load(Ordering::SeqCst) {
            return Err(AppError::BlobStore {
                message: format!("head {} failed: store unavailable", key),
            });
        }

        Ok(self
            .objects
            .read()
            .await
            .get(key)
            .map(|blob| blob.metadata.clone()))
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(AppError::BlobStore {
                message: format!("put {} failed: store unavailable", key),
            });
        }

        let metadata = BlobMetadata {
            key: key.to_string(),
            size: body.len() as u64,
            content_type: Some(content_type.to_string()),
            etag: Some(content_etag(&body)),
        };

        self.objects
            .write()
            .await
            .insert(key.to_string(), StoredBlob { metadata, bytes: body });
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<BlobObject>> {
        Ok(self.objects.read().await.get(key).map(|blob| BlobObject {
            metadata: blob.metadata.clone(),
            body: Body::from(blob.bytes.clone()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_head_get() {
        let store = MemoryBlobStore::new();
        assert!(store.head("paper.pdf").await.unwrap().is_none());

        store
            .put("paper.pdf", Bytes::from_static(b"%PDF-1.7"), "application/pdf")
            .await
            .unwrap();

        let head = store.head("paper.pdf").await.unwrap().unwrap();
        assert_eq!(head.size, 8);
        assert_eq!(head.content_type.as_deref(), Some("application/pdf"));

        let object = store.get("paper.pdf").await.unwrap().unwrap();
        assert_eq!(object.metadata.etag, head.etag);
        assert_eq!(object.metadata.size, 8);
        let body = axum::body::to_bytes(object.body, usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"%PDF-1.7");
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_etag_tracks_content() {
        let store = MemoryBlobStore::new();
        store.put("a.pdf", Bytes::from_static(b"one"), "application/pdf").await.unwrap();
        store.put("b.pdf", Bytes::from_static(b"two"), "application/pdf").await.unwrap();

        let a = store.head("a.pdf").await.unwrap().unwrap().etag.unwrap();
        let b = store.head("b.pdf").await.unwrap().unwrap().etag.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with('"') && a.ends_with('"'));
    }

    #[tokio::test]
    async fn test_failing_put_stores_nothing() {
        let store = MemoryBlobStore::new();
        store.set_fail_puts(true);
        let result = store.put("a.pdf", Bytes::from_static(b"x"), "application/pdf").await;
        assert!(result.is_err());
        assert!(!store.contains("a.pdf").await);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_head() {
        let store = MemoryBlobStore::new();
        store.put("a.pdf", Bytes::from_static(b"x"), "application/pdf").await.unwrap();
        store.set_fail_heads(true);
        assert!(store.head("a.pdf").await.is_err());
        assert_eq!(store.bytes("a.pdf").await.as_deref(), Some(&b"x"[..]));
    }
}
