//! Error types for Compendium services
//!
//! Provides a single error taxonomy with:
//! - Distinct variants for auth, validation, conflict, not-found and upstream failures
//! - HTTP status code mapping
//! - Structured JSON error bodies with a top-level `error` message
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    PayloadTooLarge,
    RequestTimeout,

    // Authentication errors (2xxx)
    Unauthorized,

    // Authorization errors (3xxx)
    Forbidden,

    // Resource errors (4xxx)
    NotFound,

    // Conflict errors (5xxx)
    Conflict,

    // Storage errors (7xxx)
    DatabaseError,
    ConnectionError,
    BlobStoreError,

    // External service errors (8xxx)
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("File size {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // Resource errors
    #[error("{resource_type} not found: {id}")]
    NotFound { resource_type: String, id: String },

    // Conflict errors
    #[error("Duplicate resource: {message}")]
    Duplicate { message: String },

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Blob store error: {message}")]
    BlobStore { message: String },

    // External service errors
    #[error("Search service error: {message}")]
    SearchUpstream { message: String },

    #[error("Identity provider error: {message}")]
    IdentityProvider { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A server error with the message an endpoint shows for it
    #[error("{public}: {source}")]
    Failed {
        public: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Attach the endpoint's public message to a server error.
    /// Client errors pass through unchanged.
    pub fn context(self, public: impl Into<String>) -> Self {
        if self.is_server_error() {
            AppError::Failed {
                public: public.into(),
                source: Box::new(self),
            }
        } else {
            self
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Failed { source, .. } => source.code(),
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Timeout { .. } => ErrorCode::RequestTimeout,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::Duplicate { .. } => ErrorCode::Conflict,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::BlobStore { .. } => ErrorCode::BlobStoreError,
            AppError::SearchUpstream { .. } | AppError::IdentityProvider { .. } => {
                ErrorCode::UpstreamError
            }
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request (oversize uploads included)
            AppError::Validation { .. } | AppError::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,

            // 408 Request Timeout
            AppError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,

            // 401 Unauthorized
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Duplicate { .. } => StatusCode::CONFLICT,

            AppError::Failed { source, .. } => source.status_code(),

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::BlobStore { .. }
            | AppError::SearchUpstream { .. }
            | AppError::IdentityProvider { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Field the client should correct, when known
    pub fn field(&self) -> Option<&str> {
        match self {
            AppError::Validation { field, .. } => field.as_deref(),
            AppError::PayloadTooLarge { .. } => Some("file"),
            _ => None,
        }
    }

    /// Message safe to show to callers. Server errors never expose
    /// upstream internals here; those go to the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::DatabaseConnection { .. } => {
                "Database operation failed".to_string()
            }
            AppError::BlobStore { .. } => "Storage operation failed".to_string(),
            AppError::SearchUpstream { .. } => "AI Search failed".to_string(),
            AppError::Failed { public, .. } => public.clone(),
            AppError::NotFound { resource_type, .. } => format!("{} not found", resource_type),
            AppError::IdentityProvider { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Extra detail returned alongside the message. Only the search
    /// upstream failure surfaces its upstream message.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::SearchUpstream { message } => Some(serde_json::Value::String(message.clone())),
            AppError::Failed { source, .. } => source.details(),
            AppError::PayloadTooLarge { size, limit } => Some(serde_json::json!({
                "size": size,
                "limit": limit,
            })),
            _ => None,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            error: err.public_message(),
            code: err.code(),
            field: err.field().map(String::from),
            details: err.details(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        // Report a single field, in form order, so the client knows what to fix.
        let field = ["title", "source_url", "query"]
            .into_iter()
            .find(|name| field_errors.contains_key(*name))
            .map(|name| match name {
                "source_url" => "sourceUrl".to_string(),
                other => other.to_string(),
            });

        AppError::Validation {
            message: errors.to_string(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::NotFound {
            resource_type: "File".into(),
            id: "paper.pdf".into(),
        };
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "File not found");
        assert_eq!(err.to_string(), "File not found: paper.pdf");
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::invalid_field("title", "Title is required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.field(), Some("title"));
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_oversize_is_bad_request() {
        let err = AppError::PayloadTooLarge { size: 10, limit: 5 };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.field(), Some("file"));
    }

    #[test]
    fn test_auth_statuses() {
        let missing = AppError::Unauthorized { message: "missing token".into() };
        let domain = AppError::Forbidden { message: "domain not approved".into() };
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(domain.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_server_error_hides_upstream_detail() {
        let err = AppError::BlobStore {
            message: "dispatch failure: connection refused to 10.0.0.3".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());

        let body = ErrorResponse::from(&err);
        assert_eq!(body.error, "Storage operation failed");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_search_failure_surfaces_details() {
        let err = AppError::SearchUpstream {
            message: "AutoRAG API error 503".into(),
        };
        let body = ErrorResponse::from(&err);
        assert_eq!(body.error, "AI Search failed");
        assert_eq!(body.details, Some(serde_json::json!("AutoRAG API error 503")));
    }

    #[test]
    fn test_context_wraps_server_errors_only() {
        let err = AppError::BlobStore { message: "timeout".into() }.context("Upload failed");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), ErrorCode::BlobStoreError);
        assert_eq!(err.public_message(), "Upload failed");
        assert!(err.to_string().contains("timeout"));

        let err = AppError::invalid_field("title", "Title is required").context("Upload failed");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.field(), Some("title"));
    }

    #[test]
    fn test_timeout_body() {
        let err = AppError::Timeout { seconds: 120 };
        assert_eq!(err.status_code(), StatusCode::REQUEST_TIMEOUT);
        let json = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(json["error"], "Request timed out after 120s");
        assert_eq!(json["code"], "REQUEST_TIMEOUT");
    }

    #[test]
    fn test_error_body_shape() {
        let err = AppError::Duplicate {
            message: "A file with this name already exists".into(),
        };
        let json = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(json["code"], "CONFLICT");
        assert!(json["error"].as_str().unwrap().contains("already exists"));
        assert!(json.get("field").is_none());
    }
}
