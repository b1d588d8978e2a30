use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::services::detector::Detector;
use crate::services::dispatcher::{DetectionDispatcher, DispatchError};
use crate::services::job_store::JobStore;
use crate::services::storage::{image_extension, StorageError, StorageManager};

pub const MIN_CONFIDENCE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 1.0;
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Confidence threshold for a new job: the requested value when it lies in
/// `[0.1, 1.0]`, otherwise `0.5`.
pub fn resolve_confidence(requested: Option<f64>) -> f64 {
    match requested {
        Some(value) if (MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&value) => value,
        _ => DEFAULT_CONFIDENCE,
    }
}

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`.
///
/// Path separators and whitespace become `_`, everything else outside the safe set is
/// dropped and leading/trailing `.` or `_` are trimmed. Returns `None` when nothing
/// usable with the original image extension is left.
pub fn sanitize_filename(original: &str) -> Option<String> {
    let spaced = original.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    match trimmed.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() && image_extension(trimmed).is_some() => {
            Some(trimmed.to_string())
        }
        _ => None,
    }
}

/// Name under which an upload is stored: creation timestamp plus the sanitized name.
pub fn stored_filename(original: &str, extension: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
    let name = sanitize_filename(original).unwrap_or_else(|| format!("image.{}", extension));
    format!("{}_{}", timestamp, name)
}

/// A registered upload.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub job_id: Uuid,
    pub filename: String,
    pub confidence_threshold: f64,
}

/// Turns an uploaded file into a stored image and a queued detection job.
pub struct UploadIntake {
    store: Arc<JobStore>,
    storage: Arc<StorageManager>,
    detector: Arc<dyn Detector>,
    dispatcher: DetectionDispatcher,
    max_queued_jobs: usize,
}

impl UploadIntake {
    pub fn new(
        store: Arc<JobStore>,
        storage: Arc<StorageManager>,
        detector: Arc<dyn Detector>,
        dispatcher: DetectionDispatcher,
        max_queued_jobs: usize,
    ) -> Self {
        Self {
            store,
            storage,
            detector,
            dispatcher,
            max_queued_jobs,
        }
    }

    /// Validate, store and register an upload, then queue it for detection.
    ///
    /// Returns as soon as the job is registered; detection outcome is only visible by
    /// polling the job.
    pub async fn accept(
        &self,
        file_bytes: &[u8],
        original_name: &str,
        requested_confidence: Option<f64>,
    ) -> Result<Accepted, IntakeError> {
        if !self.detector.is_available() {
            return Err(IntakeError::DetectorUnavailable);
        }
        if file_bytes.is_empty() || original_name.trim().is_empty() {
            return Err(IntakeError::MissingFile);
        }
        let extension = image_extension(original_name)
            .ok_or_else(|| IntakeError::UnsupportedFileType(original_name.to_string()))?;
        let slot = self
            .dispatcher
            .try_reserve(self.max_queued_jobs)
            .map_err(|_| IntakeError::QueueFull(self.max_queued_jobs))?;

        let confidence_threshold = resolve_confidence(requested_confidence);
        let filename = self
            .storage
            .persist(&stored_filename(original_name, &extension), file_bytes)
            .await?;
        tracing::info!(filename = %filename, bytes = file_bytes.len(), "Stored upload");

        let job_id = self.store.create(&filename, confidence_threshold).await;
        metrics::counter!("detection_jobs_total").increment(1);
        slot.dispatch(job_id)?;

        tracing::info!(
            job_id = %job_id,
            filename = %filename,
            confidence_threshold,
            "Detection job queued"
        );

        Ok(Accepted {
            job_id,
            filename,
            confidence_threshold,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("No image file provided")]
    MissingFile,

    #[error("File type not allowed: {0}")]
    UnsupportedFileType(String),

    #[error("Detection model is not available")]
    DetectorUnavailable,

    #[error("Detection queue is full ({0} jobs waiting)")]
    QueueFull(usize),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
