//! Search pipeline: delegate to the managed RAG service, then enrich
//! citations with stored paper metadata

use crate::db::models::Paper;
use crate::db::MetadataStore;
use crate::errors::Result;
use crate::search::{Citation, SearchAnswer, SearchOptions, SearchService};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// A citation with the matching stored paper, when one exists
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedCitation {
    #[serde(flatten)]
    pub citation: Citation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper: Option<Paper>,
}

/// Search response body: the upstream answer with its citations enriched
/// and the distinct matched papers added alongside.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Caller-supplied query text
    pub query: String,
    #[serde(flatten)]
    pub answer: Map<String, Value>,
    pub data: Vec<EnrichedCitation>,
    pub papers: Vec<Paper>,
}

pub struct SearchPipeline {
    search: Arc<dyn SearchService>,
    metadata: Arc<dyn MetadataStore>,
    options: SearchOptions,
}

impl SearchPipeline {
    pub fn new(search: Arc<dyn SearchService>, metadata: Arc<dyn MetadataStore>, options: SearchOptions) -> Self {
        Self {
            search,
            metadata,
            options,
        }
    }

    /// Run one search for an already validated query
    pub async fn search(&self, query: &str) -> Result<SearchResult> {
        let start = Instant::now();

        let answer = match self.search.search(query, &self.options).await {
            Ok(answer) => answer,
            Err(e) => {
                crate::metrics::record_search(start.elapsed().as_secs_f64(), "error", 0);
                tracing::error!(error = %e, "AI search failed");
                return Err(e);
            }
        };

        let has_more = answer.has_more();
        let SearchAnswer { data: citations, fields } = answer;
        let top_score = citations.first().and_then(Citation::score);

        let filenames = distinct_filenames(&citations);
        let papers = self.lookup(&filenames).await;

        let data: Vec<EnrichedCitation> = citations
            .into_iter()
            .map(|citation| {
                let paper = papers
                    .iter()
                    .find(|p| p.filename.as_deref() == Some(citation.filename.as_str()))
                    .cloned();
                EnrichedCitation { citation, paper }
            })
            .collect();

        let duration = start.elapsed();
        crate::metrics::record_search(duration.as_secs_f64(), "success", data.len());
        tracing::info!(
            citations = data.len(),
            matched_papers = papers.len(),
            has_more,
            top_score,
            latency_ms = duration.as_millis() as u64,
            "Search completed"
        );

        Ok(SearchResult {
            query: query.to_string(),
            answer: fields,
            data,
            papers,
        })
    }

    /// Batched metadata lookup. Failures degrade to no enrichment.
    async fn lookup(&self, filenames: &[String]) -> Vec<Paper> {
        if filenames.is_empty() {
            return Vec::new();
        }

        match self.metadata.find_by_filenames(filenames).await {
            Ok(papers) => papers,
            Err(e) => {
                crate::metrics::record_enrichment_failure();
                tracing::warn!(error = %e, filenames = filenames.len(), "Citation enrichment skipped");
                Vec::new()
            }
        }
    }
}

/// Cited filenames in first-appearance order, without repeats
fn distinct_filenames(citations: &[Citation]) -> Vec<String> {
    let mut seen = HashSet::new();
    citations
        .iter()
        .filter(|c| seen.insert(c.filename.as_str()))
        .map(|c| c.filename.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryMetadataStore;
    use crate::errors::AppError;
    use crate::search::StaticSearchService;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn citation(filename: &str, score: f64) -> Citation {
        serde_json::from_value(json!({
            "file_id": format!("id-{}", filename),
            "filename": filename,
            "score": score,
            "attributes": {"folder": "papers/"},
            "content": [{"type": "text", "text": format!("excerpt from {}", filename)}],
        }))
        .unwrap()
    }

    fn answer(citations: Vec<Citation>) -> SearchAnswer {
        let mut answer: SearchAnswer = serde_json::from_value(json!({
            "object": "vector_store.search_results.page",
            "search_query": "rewritten query",
            "response": "An answer.",
            "has_more": false,
            "next_page": null,
        }))
        .unwrap();
        answer.data = citations;
        answer
    }

    fn paper(filename: &str) -> Paper {
        Paper {
            id: Uuid::new_v4(),
            title: format!("Paper {}", filename),
            source_url: "https://example.com".to_string(),
            filename: Some(filename.to_string()),
            authors: None,
            publish_date: None,
            uploaded_at: Utc::now().fixed_offset(),
            file_size: Some(1),
        }
    }

    fn options() -> SearchOptions {
        crate::config::AppConfig::default().search_options()
    }

    #[test]
    fn test_distinct_filenames_keep_first_order() {
        let citations = vec![citation("b.pdf", 0.9), citation("a.pdf", 0.8), citation("b.pdf", 0.5)];
        assert_eq!(distinct_filenames(&citations), vec!["b.pdf", "a.pdf"]);
    }

    #[tokio::test]
    async fn test_enriches_only_stored_papers() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        metadata.insert_paper(paper("a.pdf")).await.unwrap();

        let search = Arc::new(StaticSearchService::answering(answer(vec![
            citation("a.pdf", 0.9),
            citation("b.pdf", 0.7),
            citation("a.pdf", 0.4),
        ])));
        let pipeline = SearchPipeline::new(search, metadata.clone(), options());

        let result = pipeline.search("attention").await.unwrap();
        assert_eq!(result.query, "attention");
        assert_eq!(result.answer["search_query"], "rewritten query");
        assert_eq!(result.data.len(), 3);
        assert_eq!(
            result.data[0].paper.as_ref().and_then(|p| p.filename.as_deref()),
            Some("a.pdf")
        );
        assert!(result.data[1].paper.is_none());
        assert!(result.data[2].paper.is_some());
        assert_eq!(result.papers.len(), 1);
        assert_eq!(metadata.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_no_citations_skips_lookup() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let search = Arc::new(StaticSearchService::answering(answer(vec![])));
        let pipeline = SearchPipeline::new(search, metadata.clone(), options());

        let result = pipeline.search("nothing").await.unwrap();
        assert!(result.data.is_empty());
        assert!(result.papers.is_empty());
        assert_eq!(metadata.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        metadata.insert_paper(paper("a.pdf")).await.unwrap();
        metadata.set_fail_reads(true);

        let search = Arc::new(StaticSearchService::answering(answer(vec![citation("a.pdf", 0.9)])));
        let pipeline = SearchPipeline::new(search, metadata, options());

        let result = pipeline.search("attention").await.unwrap();
        assert_eq!(result.data.len(), 1);
        assert!(result.data[0].paper.is_none());
        assert!(result.papers.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let search = Arc::new(StaticSearchService::failing("API error 503"));
        let pipeline = SearchPipeline::new(search, metadata.clone(), options());

        let err = pipeline.search("attention").await.unwrap_err();
        assert!(matches!(err, AppError::SearchUpstream { .. }));
        assert_eq!(metadata.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_response_keeps_upstream_shape() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        metadata.insert_paper(paper("a.pdf")).await.unwrap();
        let search = Arc::new(StaticSearchService::answering(answer(vec![
            citation("a.pdf", 0.9),
            citation("b.pdf", 0.5),
        ])));
        let pipeline = SearchPipeline::new(search, metadata, options());

        let result = pipeline.search("attention").await.unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["query"], "attention");
        assert_eq!(json["object"], "vector_store.search_results.page");
        assert_eq!(json["search_query"], "rewritten query");
        assert_eq!(json["response"], "An answer.");
        assert_eq!(json["has_more"], false);
        assert!(json["next_page"].is_null());

        let first = &json["data"][0];
        assert_eq!(first["filename"], "a.pdf");
        assert_eq!(first["file_id"], "id-a.pdf");
        assert_eq!(first["score"], 0.9);
        assert_eq!(first["attributes"]["folder"], "papers/");
        assert_eq!(first["content"][0]["text"], "excerpt from a.pdf");
        assert_eq!(first["paper"]["filename"], "a.pdf");
        assert!(json["data"][1].get("paper").is_none());
        assert_eq!(json["papers"].as_array().unwrap().len(), 1);
    }
}
