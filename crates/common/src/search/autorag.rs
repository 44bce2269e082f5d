//! Cloudflare AutoRAG client
//!
//! Calls `POST {api_base}/accounts/{account}/autorag/rags/{name}/ai-search`
//! once per query. No retries, no pagination.

use super::{SearchAnswer, SearchOptions, SearchService};
use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct AutoRagSearchService {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
}

#[derive(Serialize)]
struct AiSearchRequest<'a> {
    query: &'a str,
    rewrite_query: bool,
    max_num_results: u32,
    ranking_options: RankingOptions,
    reranking: Reranking<'a>,
    stream: bool,
}

#[derive(Serialize)]
struct RankingOptions {
    score_threshold: f64,
}

#[derive(Serialize)]
struct Reranking<'a> {
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    success: bool,
    result: Option<SearchAnswer>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

impl AutoRagSearchService {
    /// Create a new client for one AutoRAG instance
    pub fn new(
        api_base: &str,
        account_id: &str,
        rag_name: &str,
        api_token: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/accounts/{}/autorag/rags/{}/ai-search",
                api_base.trim_end_matches('/'),
                account_id,
                rag_name
            ),
            api_token,
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let account_id = config.account_id.as_deref().ok_or_else(|| AppError::Configuration {
            message: "search.account_id is required for the autorag backend".to_string(),
        })?;
        let api_token = config.api_token.clone().ok_or_else(|| AppError::Configuration {
            message: "search.api_token is required for the autorag backend".to_string(),
        })?;

        Self::new(
            &config.api_base,
            account_id,
            &config.rag_name,
            api_token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn build_request<'a>(query: &'a str, options: &'a SearchOptions) -> AiSearchRequest<'a> {
    AiSearchRequest {
        query,
        rewrite_query: options.rewrite_query,
        max_num_results: options.max_num_results,
        ranking_options: RankingOptions {
            score_threshold: options.score_threshold,
        },
        reranking: Reranking {
            enabled: options.reranking_model.is_some(),
            model: options.reranking_model.as_deref(),
        },
        stream: false,
    }
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "unknown error".to_string();
    }
    errors
        .iter()
        .map(|e| match e.code {
            Some(code) => format!("{} ({})", e.message, code),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl SearchService for AutoRagSearchService {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchAnswer> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&build_request(query, options))
            .send()
            .await
            .map_err(|e| AppError::SearchUpstream {
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AppError::SearchUpstream {
            message: format!("Failed to read response: {}", e),
        })?;

        let envelope: ApiEnvelope = serde_json::from_str(&body).map_err(|e| {
            AppError::SearchUpstream {
                message: if status.is_success() {
                    format!("Failed to parse response: {}", e)
                } else {
                    format!("API error {}: {}", status, body)
                },
            }
        })?;

        if !status.is_success() || !envelope.success {
            return Err(AppError::SearchUpstream {
                message: format!("API error {}: {}", status, describe_errors(&envelope.errors)),
            });
        }

        envelope.result.ok_or_else(|| AppError::SearchUpstream {
            message: "Response carried no result".to_string(),
        })
    }
}
