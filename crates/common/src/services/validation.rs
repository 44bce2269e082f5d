//! Request validation for uploads and searches

use crate::errors::{AppError, Result};
use bytes::Bytes;
use validator::Validate;

/// Limits applied to uploaded documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_file_size_bytes: u64,
    pub allowed_content_type: String,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size_bytes: crate::DEFAULT_MAX_UPLOAD_BYTES,
            allowed_content_type: crate::PDF_CONTENT_TYPE.to_string(),
        }
    }
}

/// The binary part of an upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Raw upload form as received, before any checks
#[derive(Debug, Clone, Default)]
pub struct UploadSubmission {
    pub title: Option<String>,
    pub source_url: Option<String>,
    pub authors: Option<String>,
    pub publish_date: Option<String>,
    pub file: Option<UploadedFile>,
}

/// An upload that passed every local check
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub title: String,
    pub source_url: String,
    pub authors: Option<String>,
    pub publish_date: Option<String>,
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Validate)]
struct PaperFields<'a> {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    title: &'a str,

    #[validate(url(message = "Source URL must be a valid absolute URL"))]
    source_url: &'a str,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check an upload in order: file present, required text fields,
/// content type, size, filename shape. The first failure wins.
pub fn validate_submission(submission: UploadSubmission, policy: &UploadPolicy) -> Result<ValidatedUpload> {
    let file = submission
        .file
        .ok_or_else(|| AppError::invalid_field("file", "No file provided"))?;

    let title = non_empty(submission.title)
        .ok_or_else(|| AppError::invalid_field("title", "Title is required"))?;
    let source_url = non_empty(submission.source_url)
        .ok_or_else(|| AppError::invalid_field("sourceUrl", "Source URL is required"))?;

    PaperFields {
        title: &title,
        source_url: &source_url,
    }
    .validate()?;

    let content_type = file.content_type.unwrap_or_default();
    if content_type != policy.allowed_content_type {
        return Err(AppError::invalid_field(
            "file",
            format!("Only {} files are allowed", policy.allowed_content_type),
        ));
    }

    let size = file.bytes.len() as u64;
    if size > policy.max_file_size_bytes {
        return Err(AppError::PayloadTooLarge {
            size,
            limit: policy.max_file_size_bytes,
        });
    }

    let filename = validate_filename(&file.filename)?;

    Ok(ValidatedUpload {
        title,
        source_url,
        authors: non_empty(submission.authors),
        publish_date: non_empty(submission.publish_date),
        filename,
        content_type,
        bytes: file.bytes,
    })
}

/// Filenames are blob keys and are stored exactly as submitted: non-empty,
/// no surrounding whitespace, no path separators
pub fn validate_filename(filename: &str) -> Result<String> {
    if filename.trim().is_empty() {
        return Err(AppError::invalid_field("file", "Filename is required"));
    }
    if filename.trim() != filename {
        return Err(AppError::invalid_field(
            "file",
            "Filename must not begin or end with whitespace",
        ));
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(AppError::invalid_field(
            "file",
            "Filename must not contain path separators",
        ));
    }
    Ok(filename.to_string())
}

/// Pull the search query out of a request body
pub fn extract_query(body: &serde_json::Value) -> Result<String> {
    let query = body
        .get("query")
        .and_then(|q| q.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::invalid_field("query", "Query is required"))?;

    Ok(query.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pdf(name: &str, len: usize) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: Some("application/pdf".to_string()),
            bytes: Bytes::from(vec![b'%'; len]),
        }
    }

    fn submission() -> UploadSubmission {
        UploadSubmission {
            title: Some("Attention Is All You Need".to_string()),
            source_url: Some("https://arxiv.org/abs/1706.03762".to_string()),
            authors: Some("Vaswani et al.".to_string()),
            publish_date: Some("  ".to_string()),
            file: Some(pdf("attention.pdf", 16)),
        }
    }

    fn field_of(err: AppError) -> Option<String> {
        err.field().map(String::from)
    }

    #[test]
    fn test_valid_submission() {
        let upload = validate_submission(submission(), &UploadPolicy::default()).unwrap();
        assert_eq!(upload.filename, "attention.pdf");
        assert_eq!(upload.authors.as_deref(), Some("Vaswani et al."));
        assert!(upload.publish_date.is_none());
        assert_eq!(upload.bytes.len(), 16);
    }

    #[test]
    fn test_missing_file_checked_first() {
        let sub = UploadSubmission {
            file: None,
            title: None,
            ..submission()
        };
        let err = validate_submission(sub, &UploadPolicy::default()).unwrap_err();
        assert_eq!(err.public_message(), "Validation failed: No file provided");
        assert_eq!(field_of(err).as_deref(), Some("file"));
    }

    #[test]
    fn test_blank_title_and_url() {
        let sub = UploadSubmission {
            title: Some("   ".to_string()),
            ..submission()
        };
        let err = validate_submission(sub, &UploadPolicy::default()).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("title"));

        let sub = UploadSubmission {
            source_url: None,
            ..submission()
        };
        let err = validate_submission(sub, &UploadPolicy::default()).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("sourceUrl"));
    }

    #[test]
    fn test_unparseable_url() {
        let sub = UploadSubmission {
            source_url: Some("not a url".to_string()),
            ..submission()
        };
        let err = validate_submission(sub, &UploadPolicy::default()).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(field_of(err).as_deref(), Some("sourceUrl"));
    }

    #[test]
    fn test_long_title() {
        let sub = UploadSubmission {
            title: Some("x".repeat(201)),
            ..submission()
        };
        let err = validate_submission(sub, &UploadPolicy::default()).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("title"));

        let sub = UploadSubmission {
            title: Some("é".repeat(200)),
            ..submission()
        };
        assert!(validate_submission(sub, &UploadPolicy::default()).is_ok());
    }

    #[test]
    fn test_wrong_content_type() {
        let mut file = pdf("notes.txt", 4);
        file.content_type = Some("text/plain".to_string());
        let sub = UploadSubmission {
            file: Some(file),
            ..submission()
        };
        let err = validate_submission(sub, &UploadPolicy::default()).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("file"));

        let mut file = pdf("a.pdf", 4);
        file.content_type = None;
        let sub = UploadSubmission {
            file: Some(file),
            ..submission()
        };
        assert!(validate_submission(sub, &UploadPolicy::default()).is_err());
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let policy = UploadPolicy {
            max_file_size_bytes: 16,
            ..UploadPolicy::default()
        };
        assert!(validate_submission(submission(), &policy).is_ok());

        let sub = UploadSubmission {
            file: Some(pdf("big.pdf", 17)),
            ..submission()
        };
        let err = validate_submission(sub, &policy).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { size: 17, limit: 16 }));
    }

    #[test]
    fn test_filename_rules() {
        assert_eq!(validate_filename("paper v2.pdf").unwrap(), "paper v2.pdf");
        assert!(validate_filename("").is_err());
        assert!(validate_filename("   ").is_err());
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("dir\\paper.pdf").is_err());
    }

    #[test]
    fn test_extract_query() {
        assert_eq!(extract_query(&json!({"query": "  transformers "})).unwrap(), "transformers");
        assert!(extract_query(&json!({})).is_err());
        assert!(extract_query(&json!({"query": "   "})).is_err());
        assert!(extract_query(&json!({"query": 42})).is_err());
        assert_eq!(extract_query(&json!({"query": "q".repeat(5000)})).unwrap().len(), 5000);

        let err = extract_query(&json!({})).unwrap_err();
        assert_eq!(err.field(), Some("query"));
    }

    #[test]
    fn test_padded_filename_rejected_not_rewritten() {
        for name in [" paper.pdf", "paper.pdf ", "\tpaper.pdf"] {
            let err = validate_filename(name).unwrap_err();
            assert_eq!(err.field(), Some("file"), "{:?}", name);
        }

        let sub = UploadSubmission {
            file: Some(pdf(" attention.pdf", 16)),
            ..submission()
        };
        let err = validate_submission(sub, &UploadPolicy::default()).unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("file"));
    }
}
