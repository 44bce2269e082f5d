//! Stored file retrieval

use axum::{
    extract::{Path, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG},
        HeaderMap, HeaderValue,
    },
    response::{IntoResponse, Response},
};

use crate::AppState;
use compendium_common::errors::{AppError, Result};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Stream a stored file with its recorded content type
pub async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let object = state
        .blobs
        .get(&filename)
        .await
        .map_err(|e| e.context("Failed to retrieve file"))?
        .ok_or_else(|| AppError::NotFound {
            resource_type: "File".to_string(),
            id: filename.clone(),
        })?;

    let mut headers = HeaderMap::new();
    let content_type = object
        .metadata
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(object.metadata.size));
    if let Some(etag) = object
        .metadata
        .etag
        .as_deref()
        .and_then(|etag| HeaderValue::from_str(etag).ok())
    {
        headers.insert(ETAG, etag);
    }

    tracing::debug!(filename = %filename, size = object.metadata.size, "Serving file");

    Ok((headers, object.body).into_response())
}
