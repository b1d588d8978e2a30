use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::detection::DetectionSummary;

/// Status of a detection job.
///
/// Jobs only move forward: `Queued -> Processing -> {Completed | Error}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Whether `next` is a forward edge of the job state machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// A state change together with the payload that belongs to it.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    Processing,
    Completed(DetectionSummary),
    Failed(String),
}

impl JobUpdate {
    pub fn status(&self) -> JobStatus {
        match self {
            JobUpdate::Processing => JobStatus::Processing,
            JobUpdate::Completed(_) => JobStatus::Completed,
            JobUpdate::Failed(_) => JobStatus::Error,
        }
    }
}

/// One unit of asynchronous detection work tied to one uploaded image.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub filename: String,
    pub confidence_threshold: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<DetectionSummary>,
    pub error_message: Option<String>,
}

impl DetectionJob {
    pub fn new(id: Uuid, filename: String, confidence_threshold: f64) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            filename,
            confidence_threshold,
            created_at: now,
            updated_at: now,
            result: None,
            error_message: None,
        }
    }

    /// Merge an update into the job, leaving the immutable fields untouched.
    pub(crate) fn apply(&mut self, update: JobUpdate) {
        self.status = update.status();
        self.updated_at = Utc::now();
        match update {
            JobUpdate::Processing => {}
            JobUpdate::Completed(summary) => self.result = Some(summary),
            JobUpdate::Failed(message) => self.error_message = Some(message),
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id,
            status: self.status,
            filename: self.filename.clone(),
            timestamp: self.created_at,
            total_objects: self.result.as_ref().map_or(0, |r| r.total_objects),
        }
    }
}

/// Listing entry for a job; omits the result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub total_objects: usize,
}

/// Number of jobs per status at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Error => self.error += 1,
        }
    }

    pub fn active(&self) -> usize {
        self.queued + self.processing
    }

    pub fn total(&self) -> usize {
        self.active() + self.completed + self.error
    }
}
