//! Router-wide middleware: request metrics and timeout handling

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    BoxError,
};
use compendium_common::{errors::AppError, metrics::RequestMetrics};
use std::future::{ready, Ready};
use std::time::Duration;

/// Count and time every routed request by method, route template and status
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let metrics = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());
    response
}

/// Turn a failure from the timeout layer into the usual JSON error body
pub fn timeout_error(limit: Duration) -> impl Fn(BoxError) -> Ready<Response> + Clone + Send + 'static {
    move |err: BoxError| {
        let response = if err.is::<tower::timeout::error::Elapsed>() {
            AppError::Timeout {
                seconds: limit.as_secs(),
            }
            .into_response()
        } else {
            AppError::Internal {
                message: format!("Unhandled middleware error: {}", err),
            }
            .into_response()
        };
        ready(response)
    }
}
