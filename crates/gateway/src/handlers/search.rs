//! AI search handler

use axum::{body::Bytes, extract::State, Json};

use crate::AppState;
use compendium_common::{
    errors::{AppError, Result},
    services::{extract_query, SearchResult},
};

/// Answer a natural-language query with cited, enriched sources.
///
/// The body is parsed here rather than by the `Json` extractor so that
/// malformed input gets the same JSON error shape as every other failure.
pub async fn ai_search(State(state): State<AppState>, body: Bytes) -> Result<Json<SearchResult>> {
    let body: serde_json::Value = serde_json::from_slice(&body).map_err(|e| AppError::Validation {
        message: format!("Request body must be JSON: {}", e),
        field: None,
    })?;

    let query = extract_query(&body)?;

    tracing::info!(query_len = query.chars().count(), "AI search request");

    let result = state.search.search(&query).await?;
    Ok(Json(result))
}
