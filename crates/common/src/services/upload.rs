//! Upload pipeline: validate, store the blob, then record the paper

use super::validation::{validate_submission, UploadPolicy, UploadSubmission};
use crate::auth::AuthorizedPrincipal;
use crate::db::models::Paper;
use crate::db::MetadataStore;
use crate::errors::{AppError, Result};
use crate::storage::BlobStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Receives the running byte count while an upload body is read
pub trait UploadObserver: Send + Sync {
    fn on_progress(&self, bytes_received: u64);
}

/// Accumulates chunk sizes and reports the running total
pub struct ProgressTracker<'a> {
    observer: &'a dyn UploadObserver,
    received: u64,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(observer: &'a dyn UploadObserver) -> Self {
        Self {
            observer,
            received: 0,
        }
    }

    /// Add a chunk. Empty chunks are not reported.
    pub fn advance(&mut self, chunk_len: usize) -> u64 {
        if chunk_len > 0 {
            self.received += chunk_len as u64;
            self.observer.on_progress(self.received);
        }
        self.received
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

/// Successful upload response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub success: bool,
    pub id: Uuid,
    pub filename: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Stores an authorized upload: blob first, then the metadata row
pub struct UploadPipeline {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    policy: UploadPolicy,
}

impl UploadPipeline {
    pub fn new(blobs: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>, policy: UploadPolicy) -> Self {
        Self {
            blobs,
            metadata,
            policy,
        }
    }

    /// Run the upload for an already authorized principal
    pub async fn upload(
        &self,
        principal: &AuthorizedPrincipal,
        submission: UploadSubmission,
    ) -> Result<UploadReceipt> {
        let start = Instant::now();
        let result = self.store(principal, submission).await;
        let elapsed = start.elapsed().as_secs_f64();

        match &result {
            Ok(receipt) => crate::metrics::record_upload("stored", receipt.size, elapsed),
            Err(e) => crate::metrics::record_upload(outcome_label(e), 0, elapsed),
        }

        result
    }

    async fn store(
        &self,
        principal: &AuthorizedPrincipal,
        submission: UploadSubmission,
    ) -> Result<UploadReceipt> {
        let upload = validate_submission(submission, &self.policy)?;
        let filename = upload.filename;
        let size = upload.bytes.len() as u64;

        // Existence check and write are not atomic; concurrent uploads of
        // one filename may both pass here.
        if self.blobs.head(&filename).await?.is_some() {
            tracing::warn!(filename = %filename, email = %principal.email, "Duplicate filename rejected");
            return Err(AppError::Duplicate {
                message: "A file with this name already exists".to_string(),
            });
        }

        self.blobs
            .put(&filename, upload.bytes, &upload.content_type)
            .await
            .inspect_err(|e| tracing::error!(filename = %filename, error = %e, "Blob write failed"))?;

        let uploaded_at = Utc::now();
        let paper = Paper {
            id: Uuid::new_v4(),
            title: upload.title,
            source_url: upload.source_url,
            filename: Some(filename.clone()),
            authors: upload.authors,
            publish_date: upload.publish_date,
            uploaded_at: uploaded_at.fixed_offset(),
            file_size: Some(size as i64),
        };
        let id = paper.id;

        if let Err(e) = self.metadata.insert_paper(paper).await {
            tracing::error!(
                filename = %filename,
                error = %e,
                "Metadata insert failed after blob write; blob is orphaned"
            );
            return Err(e);
        }

        tracing::info!(
            paper_id = %id,
            filename = %filename,
            size,
            email = %principal.email,
            "Paper uploaded"
        );

        Ok(UploadReceipt {
            success: true,
            id,
            filename,
            size,
            uploaded_at,
        })
    }
}

fn outcome_label(err: &AppError) -> &'static str {
    match err {
        AppError::Duplicate { .. } => "duplicate",
        e if e.is_client_error() => "rejected",
        _ => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryMetadataStore;
    use crate::services::validation::UploadedFile;
    use crate::storage::MemoryBlobStore;
    use bytes::Bytes;
    use std::sync::Mutex;

    struct Fixture {
        blobs: Arc<MemoryBlobStore>,
        metadata: Arc<MemoryMetadataStore>,
        pipeline: UploadPipeline,
    }

    fn fixture() -> Fixture {
        let blobs = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        let pipeline = UploadPipeline::new(blobs.clone(), metadata.clone(), UploadPolicy::default());
        Fixture {
            blobs,
            metadata,
            pipeline,
        }
    }

    fn principal() -> AuthorizedPrincipal {
        AuthorizedPrincipal {
            email: "ada@example.com".to_string(),
        }
    }

    fn submission(filename: &str, body: &'static [u8]) -> UploadSubmission {
        UploadSubmission {
            title: Some("On Computable Numbers".to_string()),
            source_url: Some("https://example.com/turing".to_string()),
            authors: Some("A. Turing".to_string()),
            publish_date: Some("1936".to_string()),
            file: Some(UploadedFile {
                filename: filename.to_string(),
                content_type: Some("application/pdf".to_string()),
                bytes: Bytes::from_static(body),
            }),
        }
    }

    #[tokio::test]
    async fn test_upload_stores_blob_and_row() {
        let f = fixture();
        let receipt = tokio_test::assert_ok!(
            f.pipeline
                .upload(&principal(), submission("turing.pdf", b"%PDF-1.4 body"))
                .await
        );

        assert!(receipt.success);
        assert_eq!(receipt.filename, "turing.pdf");
        assert_eq!(receipt.size, 13);

        let stored = f.blobs.head("turing.pdf").await.unwrap().unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(f.blobs.bytes("turing.pdf").await.as_deref(), Some(&b"%PDF-1.4 body"[..]));

        let papers = f.metadata.list_papers().await.unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].id, receipt.id);
        assert_eq!(papers[0].file_size, Some(13));
        assert_eq!(papers[0].publish_date.as_deref(), Some("1936"));
    }

    #[tokio::test]
    async fn test_invalid_submission_writes_nothing() {
        let f = fixture();
        let mut sub = submission("turing.pdf", b"x");
        sub.title = None;

        let err = f.pipeline.upload(&principal(), sub).await.unwrap_err();
        assert_eq!(err.field(), Some("title"));
        assert_eq!(f.blobs.put_count(), 0);
        assert!(f.metadata.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_filename_conflicts() {
        let f = fixture();
        f.pipeline
            .upload(&principal(), submission("turing.pdf", b"first"))
            .await
            .unwrap();

        let err = f
            .pipeline
            .upload(&principal(), submission("turing.pdf", b"second"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Duplicate { .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
        assert_eq!(f.metadata.len().await, 1);

        assert_eq!(f.blobs.bytes("turing.pdf").await.as_deref(), Some(&b"first"[..]));
    }

    #[tokio::test]
    async fn test_failed_blob_write_creates_no_row() {
        let f = fixture();
        f.blobs.set_fail_puts(true);

        let err = tokio_test::assert_err!(
            f.pipeline
                .upload(&principal(), submission("turing.pdf", b"x"))
                .await
        );

        assert!(err.is_server_error());
        assert!(f.metadata.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_existence_check_writes_nothing() {
        let f = fixture();
        f.blobs.set_fail_heads(true);

        let err = tokio_test::assert_err!(
            f.pipeline
                .upload(&principal(), submission("turing.pdf", b"x"))
                .await
        );

        assert!(err.is_server_error());
        assert_eq!(f.blobs.put_count(), 0);
        assert!(f.metadata.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_orphan_blob() {
        let f = fixture();
        f.metadata.set_fail_inserts(true);

        let err = f
            .pipeline
            .upload(&principal(), submission("turing.pdf", b"x"))
            .await
            .unwrap_err();

        assert!(err.is_server_error());
        assert!(f.blobs.contains("turing.pdf").await);
        assert!(f.metadata.is_empty().await);
    }

    struct Recording(Mutex<Vec<u64>>);

    impl UploadObserver for Recording {
        fn on_progress(&self, bytes_received: u64) {
            self.0.lock().unwrap().push(bytes_received);
        }
    }

    #[test]
    fn test_progress_is_monotonic() {
        let observer = Recording(Mutex::new(Vec::new()));
        let mut tracker = ProgressTracker::new(&observer);
        for chunk in [10, 0, 4096, 1, 300] {
            tracker.advance(chunk);
        }
        assert_eq!(tracker.received(), 4407);

        let seen = observer.0.lock().unwrap();
        assert_eq!(*seen, vec![10, 4106, 4107, 4407]);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(&AppError::Duplicate { message: String::new() }), "duplicate");
        assert_eq!(outcome_label(&AppError::invalid_field("file", "x")), "rejected");
        assert_eq!(outcome_label(&AppError::BlobStore { message: String::new() }), "failed");
    }
}
