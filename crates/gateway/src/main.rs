//! Compendium API Gateway
//!
//! The entry point for all external API requests.
//! Handles:
//! - Backend selection from configuration
//! - Request routing
//! - Observability (logging, metrics, tracing)

use compendium_common::{
    auth::GoogleTokenVerifier,
    config::{AppConfig, ObservabilityConfig},
    db::create_metadata_store,
    metrics,
    search::create_search_service,
    storage::create_blob_store,
};
use compendium_gateway::{create_router, AppState};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting Compendium API Gateway v{}", compendium_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(Matcher::Suffix("request_duration_seconds".to_string()), metrics::LATENCY_BUCKETS)?
            .set_buckets_for_metric(Matcher::Suffix("upload_duration_seconds".to_string()), metrics::LATENCY_BUCKETS)?
            .set_buckets_for_metric(Matcher::Suffix("search_duration_seconds".to_string()), metrics::SEARCH_BUCKETS)?
            .install()?;
        info!("Metrics exporter listening on {}", addr);
    }
    metrics::register_metrics();

    // Initialize collaborators
    info!(backend = %config.database.backend, "Initializing metadata store...");
    let metadata = create_metadata_store(&config.database).await?;

    info!(backend = %config.storage.backend, "Initializing blob store...");
    let blobs = create_blob_store(&config.storage).await?;

    info!(backend = %config.search.backend, "Initializing search service...");
    let search = create_search_service(&config.search)?;

    let verifier = GoogleTokenVerifier::new(
        config.auth.tokeninfo_url.clone(),
        Duration::from_secs(config.auth.timeout_secs),
    )?;

    if config.auth.approved_domain_list().is_empty() {
        tracing::warn!("No approved domains configured; every upload will be rejected");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Create app state
    let state = AppState::new(config, Arc::new(verifier), blobs, metadata, search);

    // Build the router
    let app = create_router(state);

    // Start the server
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` overrides the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
