//! Paper listing handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use compendium_common::{db::models::Paper, errors::Result};

/// Response for listing papers
#[derive(Serialize)]
pub struct PaperListResponse {
    pub papers: Vec<Paper>,
    pub count: usize,
}

/// List every paper, newest upload first
pub async fn list_papers(State(state): State<AppState>) -> Result<Json<PaperListResponse>> {
    let papers = state
        .metadata
        .list_papers()
        .await
        .map_err(|e| e.context("Failed to retrieve papers"))?;

    tracing::debug!(count = papers.len(), "Listed papers");

    Ok(Json(PaperListResponse {
        count: papers.len(),
        papers,
    }))
}
