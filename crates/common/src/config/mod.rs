//! Configuration management for Compendium services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::search::SearchOptions;
use crate::services::validation::UploadPolicy;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Relational metadata store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Blob store configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Managed search service configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Upload limits
    #[serde(default)]
    pub upload: UploadConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Backend: postgres, memory
    #[serde(default = "default_database_backend")]
    pub backend: String,

    /// Primary database URL (for writes)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Backend: s3, memory
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Bucket holding uploaded documents
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Region (use "auto" for Cloudflare R2)
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible stores (R2, MinIO)
    pub endpoint: Option<String>,

    /// Static credentials; falls back to the default AWS provider chain
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Backend: autorag, mock
    #[serde(default = "default_search_backend")]
    pub backend: String,

    /// Cloudflare account owning the AutoRAG instance
    pub account_id: Option<String>,

    /// AutoRAG instance name
    #[serde(default = "default_rag_name")]
    pub rag_name: String,

    /// API token for the search service
    pub api_token: Option<String>,

    /// API base URL
    #[serde(default = "default_search_api_base")]
    pub api_base: String,

    /// Let the service rewrite the query before retrieval
    #[serde(default = "default_enabled")]
    pub rewrite_query: bool,

    /// Result cap
    #[serde(default = "default_max_num_results")]
    pub max_num_results: u32,

    /// Minimum relevance score for a citation
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,

    /// Reranking model; reranking is disabled when unset
    #[serde(default = "default_reranking_model")]
    pub reranking_model: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// OAuth client id; tokens must carry it as audience
    #[serde(default)]
    pub google_client_id: String,

    /// Comma-separated approved email domains
    #[serde(default)]
    pub approved_domains: String,

    /// Token introspection endpoint
    #[serde(default = "default_tokeninfo_url")]
    pub tokeninfo_url: String,

    /// Introspection request timeout in seconds
    #[serde(default = "default_tokeninfo_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Exact content type accepted for uploads
    #[serde(default = "default_allowed_content_type")]
    pub allowed_content_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 120 }
fn default_database_backend() -> String { "postgres".to_string() }
fn default_database_url() -> String { "postgres://localhost/compendium".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_storage_backend() -> String { "s3".to_string() }
fn default_bucket() -> String { "compendium-papers".to_string() }
fn default_region() -> String { "auto".to_string() }
fn default_search_backend() -> String { "autorag".to_string() }
fn default_rag_name() -> String { "ai-compendium".to_string() }
fn default_search_api_base() -> String { "https://api.cloudflare.com/client/v4".to_string() }
fn default_max_num_results() -> u32 { 10 }
fn default_score_threshold() -> f64 { 0.3 }
fn default_reranking_model() -> Option<String> { Some(crate::DEFAULT_RERANKING_MODEL.to_string()) }
fn default_search_timeout() -> u64 { 60 }
fn default_tokeninfo_url() -> String { "https://oauth2.googleapis.com/tokeninfo".to_string() }
fn default_tokeninfo_timeout() -> u64 { 10 }
fn default_max_file_size() -> u64 { crate::DEFAULT_MAX_UPLOAD_BYTES }
fn default_allowed_content_type() -> String { crate::PDF_CONTENT_TYPE.to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__AUTH__APPROVED_DOMAINS=example.com,lab.org
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Upload policy enforced by the upload pipeline
    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_file_size_bytes: self.upload.max_file_size_bytes,
            allowed_content_type: self.upload.allowed_content_type.clone(),
        }
    }

    /// Fixed parameters sent with every search
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            rewrite_query: self.search.rewrite_query,
            max_num_results: self.search.max_num_results,
            score_threshold: self.search.score_threshold,
            reranking_model: self.search.reranking_model.clone(),
        }
    }
}

impl AuthConfig {
    /// Approved domains, trimmed and lower-cased, empty entries dropped
    pub fn approved_domain_list(&self) -> Vec<String> {
        parse_domain_list(&self.approved_domains)
    }
}

/// Parse a comma-separated domain allow list
pub fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_database_backend(),
            url: default_database_url(),
            read_url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: default_search_backend(),
            account_id: None,
            rag_name: default_rag_name(),
            api_token: None,
            api_base: default_search_api_base(),
            rewrite_query: default_enabled(),
            max_num_results: default_max_num_results(),
            score_threshold: default_score_threshold(),
            reranking_model: default_reranking_model(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            google_client_id: String::new(),
            approved_domains: String::new(),
            tokeninfo_url: default_tokeninfo_url(),
            timeout_secs: default_tokeninfo_timeout(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            allowed_content_type: default_allowed_content_type(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            search: SearchConfig::default(),
            auth: AuthConfig::default(),
            upload: UploadConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
