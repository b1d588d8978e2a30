pub mod files;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod model;
pub mod upload;

use axum::extract::multipart::MultipartError;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::services::intake::IntakeError;
use crate::services::reader::ReadError;
use crate::services::storage::StorageError;

/// Build the HTTP API over `state`.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(health::service_info))
        .route("/health", get(health::health_check))
        .route("/api/upload", post(upload::submit_upload))
        .route("/api/result/{job_id}", get(jobs::get_result))
        .route("/api/jobs", get(jobs::list_jobs))
        .route("/api/model/info", get(model::model_info))
        .route("/api/files", get(files::list_files))
        .route("/api/files/cleanup", post(files::cleanup_files))
        .route("/api/files/storage", get(files::storage_info))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}

/// Error returned by any handler, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Detection model is not available")]
    ModelUnavailable,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Intake(e) => match e {
                IntakeError::MissingFile | IntakeError::UnsupportedFileType(_) => {
                    StatusCode::BAD_REQUEST
                }
                IntakeError::DetectorUnavailable | IntakeError::QueueFull(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                IntakeError::Storage(_) | IntakeError::Dispatch(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Read(ReadError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Multipart(e) => e.status(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %self, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
