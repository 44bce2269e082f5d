//! Compendium API Gateway
//!
//! HTTP surface of the paper library:
//! - Authorized PDF upload
//! - Paper listing and file retrieval
//! - AI search with citation enrichment
//! - Health and readiness probes

pub mod handlers;
pub mod middleware;

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::{DefaultBodyLimit, FromRef},
    http::Request,
    routing::{get, post},
    Router,
};
use compendium_common::{
    auth::{Authorizer, TokenVerifier},
    config::AppConfig,
    db::MetadataStore,
    search::SearchService,
    services::{SearchPipeline, UploadPipeline},
    storage::BlobStore,
};
use std::sync::Arc;
use std::time::Duration;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Room for the text fields of an upload form on top of the file limit
pub const MULTIPART_HEADROOM_BYTES: u64 = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub authorizer: Arc<Authorizer>,
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub uploads: Arc<UploadPipeline>,
    pub search: Arc<SearchPipeline>,
}

impl AppState {
    /// Wire the pipelines from their collaborators
    pub fn new(
        config: AppConfig,
        verifier: Arc<dyn TokenVerifier>,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        search: Arc<dyn SearchService>,
    ) -> Self {
        let authorizer = Authorizer::new(
            verifier,
            config.auth.google_client_id.clone(),
            config.auth.approved_domain_list(),
        );
        let uploads = UploadPipeline::new(blobs.clone(), metadata.clone(), config.upload_policy());
        let search = SearchPipeline::new(search, metadata.clone(), config.search_options());

        Self {
            config: Arc::new(config),
            authorizer: Arc::new(authorizer),
            blobs,
            metadata,
            uploads: Arc::new(uploads),
            search: Arc::new(search),
        }
    }
}

impl FromRef<AppState> for Arc<Authorizer> {
    fn from_ref(state: &AppState) -> Self {
        state.authorizer.clone()
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Oversize files up to the headroom still reach validation and get a 400
    let upload_limit = state
        .config
        .upload
        .max_file_size_bytes
        .saturating_add(MULTIPART_HEADROOM_BYTES);
    let upload_limit = usize::try_from(upload_limit).unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route(
            "/upload",
            post(handlers::upload::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/{filename}", get(handlers::files::get_file))
        .route("/papers", get(handlers::papers::list_papers))
        .route("/ai-search", post(handlers::search::ai_search));

    let timeout = state.config.request_timeout();

    let router = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes);

    with_timeout(router, timeout)
        .layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(
            // Outermost first: the id is set before tracing sees the request
            // and copied onto the response on the way out
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
        .with_state(state)
}

/// Bound handler time; an elapsed request gets a JSON 408
pub fn with_timeout<S>(router: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(middleware::timeout_error(timeout)))
            .layer(TimeoutLayer::new(timeout)),
    )
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id,
    )
}
