use std::sync::Arc;

use uuid::Uuid;

use crate::models::api::JobView;
use crate::models::job::{DetectionJob, JobStatus};
use crate::services::job_store::JobStore;

/// Renders stored jobs for pollers.
#[derive(Clone)]
pub struct ResultReader {
    store: Arc<JobStore>,
}

impl ResultReader {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    /// Current view of the job named by `job_id`.
    ///
    /// Ids that do not parse as a UUID are reported as not found.
    pub async fn read(&self, job_id: &str) -> Result<JobView, ReadError> {
        let id = Uuid::parse_str(job_id).map_err(|_| ReadError::NotFound(job_id.to_string()))?;
        let job = self
            .store
            .get(id)
            .await
            .map_err(|_| ReadError::NotFound(job_id.to_string()))?;
        Ok(project(&job))
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Project a job snapshot into its caller-facing view.
pub fn project(job: &DetectionJob) -> JobView {
    let mut view = JobView {
        job_id: job.id,
        status: job.status,
        filename: job.filename.clone(),
        confidence_threshold: job.confidence_threshold,
        timestamp: job.created_at,
        updated_at: job.updated_at,
        total_objects: None,
        unique_objects: None,
        results: Vec::new(),
        all_detected_labels: None,
        confidences: None,
        average_confidence: None,
        boxes: None,
        error: None,
    };

    match job.status {
        JobStatus::Completed => {
            if let Some(result) = &job.result {
                view.total_objects = Some(result.total_objects);
                view.unique_objects = Some(result.unique_objects());
                view.results = result.unique_labels.clone();
                view.all_detected_labels = Some(result.labels.clone());
                view.confidences = Some(result.confidences.clone());
                view.average_confidence = Some(round3(result.average_confidence));
                view.boxes = Some(result.boxes.clone());
            }
        }
        JobStatus::Error => {
            view.total_objects = Some(0);
            view.unique_objects = Some(0);
            view.error = Some(
                job.error_message
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            );
        }
        JobStatus::Queued | JobStatus::Processing => {}
    }

    view
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Job ID not found: {0}")]
    NotFound(String),
}
