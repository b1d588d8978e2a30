use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub model_loaded: bool,
    pub model_path: Option<String>,
    pub active_jobs: usize,
    pub total_jobs: usize,
    pub queued_jobs: usize,
    pub in_flight: usize,
    pub workers: usize,
}

/// GET /health — liveness plus current detection load.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let counts = state.jobs.counts().await;
    let model = state.detector.model_info();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        model_loaded: model.is_some(),
        model_path: model.map(|m| m.model_path),
        active_jobs: counts.active(),
        total_jobs: counts.total(),
        queued_jobs: state.dispatcher.backlog(),
        in_flight: state.dispatcher.in_flight(),
        workers: state.dispatcher.workers(),
    })
}

/// GET / — service description and endpoint index.
pub async fn service_info(State(state): State<AppState>) -> Json<Value> {
    let model = state.detector.model_info();
    let model_status = if model.is_some() { "loaded" } else { "not loaded" };
    let supported_classes = model
        .as_ref()
        .map(|m| m.supported_classes())
        .unwrap_or_default();

    Json(json!({
        "message": "Object detection job server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/api/upload": "POST - Upload an image for detection",
            "/api/result/{job_id}": "GET - Poll a detection result",
            "/api/jobs": "GET - List all jobs",
            "/api/model/info": "GET - Model information",
            "/api/files": "GET - List uploaded files",
            "/api/files/cleanup": "POST - Delete old files",
            "/api/files/storage": "GET - Storage information",
            "/health": "GET - Health check",
            "/metrics": "GET - Prometheus metrics",
        },
        "model_status": model_status,
        "supported_classes": supported_classes,
        "model_path": model.map(|m| m.model_path),
    }))
}
