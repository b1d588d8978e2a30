use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::{
    CleanupRequest, CleanupResponse, DiskUsage, FileListResponse, StorageInfoResponse,
};
use crate::routes::ApiError;

const DEFAULT_CLEANUP_DAYS: u32 = 7;
const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// GET /api/files — stored images, newest first.
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FileListResponse>, ApiError> {
    let files = state.storage.list().await?;
    Ok(Json(FileListResponse {
        total_files: files.len(),
        files,
        upload_folder: state.storage.root().display().to_string(),
    }))
}

/// POST /api/files/cleanup — delete files older than `days` (default 7).
///
/// The JSON body is optional.
pub async fn cleanup_files(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CleanupResponse>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CleanupRequest::default()
    } else {
        serde_json::from_slice::<CleanupRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid cleanup request: {}", e)))?
    };
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Invalid cleanup request: {}", e)))?;

    let days_old = request.days.unwrap_or(DEFAULT_CLEANUP_DAYS);
    let deleted_files = state.storage.cleanup(days_old).await?;
    tracing::info!(days_old, deleted = deleted_files.len(), "Cleaned up upload folder");

    Ok(Json(CleanupResponse {
        status: "success".to_string(),
        deleted_count: deleted_files.len(),
        deleted_files,
        days_old,
    }))
}

/// GET /api/files/storage — upload folder size and disk usage.
pub async fn storage_info(
    State(state): State<AppState>,
) -> Result<Json<StorageInfoResponse>, ApiError> {
    let usage = state.storage.usage().await?;
    let total = usage.disk_total_bytes as f64;
    let free = usage.disk_free_bytes as f64;
    let used = total - free;

    Ok(Json(StorageInfoResponse {
        upload_folder: state.storage.root().display().to_string(),
        total_files: usage.total_files,
        total_size_bytes: usage.total_size_bytes,
        total_size_mb: round_to(usage.total_size_bytes as f64 / MB, 2),
        disk_usage: DiskUsage {
            total_gb: round_to(total / GB, 2),
            used_gb: round_to(used / GB, 2),
            free_gb: round_to(free / GB, 2),
            usage_percent: if total > 0.0 {
                round_to(used / total * 100.0, 1)
            } else {
                0.0
            },
        },
    }))
}
