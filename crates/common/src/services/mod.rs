//! Request pipelines shared by the HTTP layer
//!
//! - `validation`: upload form and search query checks
//! - `upload`: authorized document upload (blob, then metadata)
//! - `search`: managed RAG search with citation enrichment

pub mod search;
pub mod upload;
pub mod validation;

pub use search::{EnrichedCitation, SearchPipeline, SearchResult};
pub use upload::{ProgressTracker, UploadObserver, UploadPipeline, UploadReceipt};
pub use validation::{extract_query, UploadPolicy, UploadSubmission, UploadedFile};
