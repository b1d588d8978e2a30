use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use detection_orchestrator::app_state::AppState;
use detection_orchestrator::config::AppConfig;
use detection_orchestrator::routes;
use detection_orchestrator::services::{
    detector::{Detector, RemoteDetector},
    storage::StorageManager,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing detection server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    metrics::describe_histogram!(
        "detection_processing_seconds",
        "Time spent running the detector for one job"
    );
    metrics::describe_counter!("detection_jobs_total", "Total detection jobs submitted");
    metrics::describe_counter!("detection_jobs_completed", "Total detection jobs completed");
    metrics::describe_counter!("detection_jobs_failed", "Total detection jobs that failed");
    metrics::describe_gauge!(
        "detection_queue_depth",
        "Jobs waiting for a free detection worker"
    );

    // Upload folder
    let storage = StorageManager::new(&config.upload_dir).expect("Failed to prepare upload folder");
    tracing::info!(path = %config.upload_dir, "Upload folder ready");

    // Detector sidecar
    let timeout = Duration::from_secs(config.detection_timeout_secs);
    let detector: Arc<dyn Detector> = match &config.detector_url {
        Some(url) => {
            tracing::info!(url = %url, "Connecting to detection model");
            Arc::new(
                RemoteDetector::connect(url, timeout)
                    .await
                    .expect("Failed to build detector client"),
            )
        }
        None => {
            tracing::warn!("DETECTOR_URL not set, uploads will be refused");
            Arc::new(RemoteDetector::unavailable())
        }
    };

    // Shared state and worker pool
    let state = AppState::new(
        storage,
        detector,
        config.dispatch_settings(),
        config.max_queued_jobs,
    );

    let app = routes::router(state, config.max_upload_bytes).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
