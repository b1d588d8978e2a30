use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::detection::{BoundingBox, ModelInfo};
use crate::models::job::{JobStatus, JobSummary};
use crate::services::storage::StoredFile;

/// Response after an image is accepted for detection.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub message: String,
    pub job_id: Uuid,
    pub filename: String,
    pub confidence_threshold: f64,
}

/// Caller-facing projection of a job.
///
/// `hasil` is always present and empty until the job completes. The other result fields
/// only appear once the job has completed, `error` only once it failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub filename: String,
    pub confidence_threshold: f64,
    pub timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_objects: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_objects: Option<usize>,
    /// Distinct labels found, under the key existing clients read.
    #[serde(rename = "hasil", default)]
    pub results: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_detected_labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidences: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boxes: Option<Vec<BoundingBox>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response for `GET /api/jobs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobListResponse {
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub completed_jobs: usize,
    pub error_jobs: usize,
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_loaded: bool,
    pub model_info: ModelInfo,
    pub supported_classes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub total_files: usize,
    pub files: Vec<StoredFile>,
    pub upload_folder: String,
}

/// Body of `POST /api/files/cleanup`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CleanupRequest {
    #[garde(range(max = 36500))]
    pub days: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub status: String,
    pub deleted_files: Vec<String>,
    pub deleted_count: usize,
    pub days_old: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StorageInfoResponse {
    pub upload_folder: String,
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub disk_usage: DiskUsage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub usage_percent: f64,
}
