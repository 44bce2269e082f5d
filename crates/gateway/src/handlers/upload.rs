//! Paper upload handler

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    Json,
};
use bytes::BytesMut;

use crate::AppState;
use compendium_common::{
    auth::AuthorizedPrincipal,
    errors::{AppError, Result},
    services::{ProgressTracker, UploadObserver, UploadReceipt, UploadSubmission, UploadedFile},
};

/// Logs read progress of the file part at debug level
struct TracingObserver;

impl UploadObserver for TracingObserver {
    fn on_progress(&self, bytes_received: u64) {
        tracing::debug!(bytes_received, "Upload progress");
    }
}

/// Store an uploaded PDF and its metadata.
///
/// The principal is extracted before the multipart body, so unauthorized
/// requests are rejected without reading the upload.
pub async fn upload(
    State(state): State<AppState>,
    principal: AuthorizedPrincipal,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadReceipt>> {
    let mut multipart = multipart.map_err(|e| AppError::Validation {
        message: format!("Expected a multipart form: {}", e.body_text()),
        field: None,
    })?;

    let submission = read_submission(&mut multipart, &TracingObserver).await?;

    let receipt = state
        .uploads
        .upload(&principal, submission)
        .await
        .map_err(|e| e.context("Upload failed"))?;

    Ok(Json(receipt))
}

/// Collect the form fields. Unknown parts are skipped.
pub async fn read_submission(
    multipart: &mut Multipart,
    observer: &dyn UploadObserver,
) -> Result<UploadSubmission> {
    let mut submission = UploadSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => submission.file = read_file(field, observer).await?,
            "title" => submission.title = Some(field.text().await.map_err(malformed)?),
            "sourceUrl" => submission.source_url = Some(field.text().await.map_err(malformed)?),
            "authors" => submission.authors = Some(field.text().await.map_err(malformed)?),
            "publishDate" => submission.publish_date = Some(field.text().await.map_err(malformed)?),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(submission)
}

/// Read the file part chunk by chunk. An empty part with no filename is
/// what browsers send when nothing was chosen; treat it as absent.
async fn read_file(mut field: Field<'_>, observer: &dyn UploadObserver) -> Result<Option<UploadedFile>> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(String::from);

    let mut tracker = ProgressTracker::new(observer);
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        tracker.advance(chunk.len());
        buffer.extend_from_slice(&chunk);
    }

    if filename.is_empty() && buffer.is_empty() {
        return Ok(None);
    }

    Ok(Some(UploadedFile {
        filename,
        content_type,
        bytes: buffer.freeze(),
    }))
}

fn malformed(err: MultipartError) -> AppError {
    AppError::Validation {
        message: format!("Malformed multipart body: {}", err.body_text()),
        field: None,
    }
}
