use axum::extract::{Path, State};
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::{JobListResponse, JobView};
use crate::models::job::{JobStatus, StatusCounts};
use crate::routes::ApiError;

/// GET /api/result/{job_id} — poll a detection job.
pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let view = state.reader.read(&job_id).await?;
    if view.status == JobStatus::Completed {
        tracing::debug!(
            job_id = %view.job_id,
            results = ?view.results,
            "Returning detection result"
        );
    }
    Ok(Json(view))
}

/// GET /api/jobs — every job with per-status counts.
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobListResponse> {
    let jobs = state.jobs.list().await;

    let mut counts = StatusCounts::default();
    for job in &jobs {
        counts.record(job.status);
    }

    Json(JobListResponse {
        total_jobs: jobs.len(),
        active_jobs: counts.active(),
        completed_jobs: counts.completed,
        error_jobs: counts.error,
        jobs,
    })
}
