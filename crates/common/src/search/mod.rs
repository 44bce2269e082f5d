//! Managed RAG search abstraction
//!
//! Provides a unified interface over the retrieval-augmented search
//! capability:
//! - Cloudflare AutoRAG (`ai-search` REST endpoint)
//! - A static implementation for development and tests

mod autorag;

pub use autorag::AutoRagSearchService;

use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fixed parameters of a search call
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub rewrite_query: bool,
    pub max_num_results: u32,
    pub score_threshold: f64,
    /// Reranking is enabled iff a model is set
    pub reranking_model: Option<String>,
}

/// One source document referenced by an answer. Only `filename` is
/// interpreted; every other upstream field is carried through as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub filename: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Citation {
    pub fn score(&self) -> Option<f64> {
        self.fields.get("score").and_then(Value::as_f64)
    }
}

/// Answer object returned by the search service, kept in its upstream
/// shape (`search_query`, `response`, `has_more`, `next_page`, ...).
/// Citations in `data` keep their ranked order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchAnswer {
    #[serde(default)]
    pub data: Vec<Citation>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SearchAnswer {
    /// The query as executed (possibly rewritten)
    pub fn search_query(&self) -> Option<&str> {
        self.fields.get("search_query").and_then(Value::as_str)
    }

    pub fn has_more(&self) -> bool {
        self.fields
            .get("has_more")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Retrieval-augmented search capability
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Run one search; no pagination
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchAnswer>;
}

/// Search service returning a preset answer (or failure) for every query
pub struct StaticSearchService {
    outcome: std::result::Result<SearchAnswer, String>,
    calls: AtomicUsize,
}

impl StaticSearchService {
    pub fn answering(answer: SearchAnswer) -> Self {
        Self {
            outcome: Ok(answer),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Empty answer with no citations
    pub fn empty() -> Self {
        Self::answering(SearchAnswer::default())
    }

    /// Number of search calls received
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchService for StaticSearchService {
    async fn search(&self, query: &str, _options: &SearchOptions) -> Result<SearchAnswer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(answer) => {
                let mut answer = answer.clone();
                answer
                    .fields
                    .entry("search_query")
                    .or_insert_with(|| Value::String(query.to_string()));
                Ok(answer)
            }
            Err(message) => Err(AppError::SearchUpstream {
                message: message.clone(),
            }),
        }
    }
}

/// Create a search service based on configuration
pub fn create_search_service(config: &SearchConfig) -> Result<Arc<dyn SearchService>> {
    match config.backend.as_str() {
        "autorag" => Ok(Arc::new(AutoRagSearchService::from_config(config)?)),
        "mock" => {
            tracing::warn!("Using mock search service; every search returns an empty answer");
            Ok(Arc::new(StaticSearchService::empty()))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown search backend: {}", other),
        }),
    }
}
