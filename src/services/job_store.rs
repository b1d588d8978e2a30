use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::job::{DetectionJob, JobStatus, JobSummary, JobUpdate, StatusCounts};

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, DetectionJob>,
    order: Vec<Uuid>,
}

/// In-memory, authoritative record of every detection job.
///
/// Built once in [`AppState`](crate::app_state::AppState) and kept for the life of the
/// process; job records are never removed. Every read and write goes through one
/// `RwLock`, so a reader always sees a status together with its payload.
#[derive(Default)]
pub struct JobStore {
    inner: RwLock<Inner>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new `Queued` job and return its id.
    pub async fn create(&self, filename: &str, confidence_threshold: f64) -> Uuid {
        let mut inner = self.inner.write().await;
        let mut id = Uuid::new_v4();
        while inner.jobs.contains_key(&id) {
            id = Uuid::new_v4();
        }
        inner
            .jobs
            .insert(id, DetectionJob::new(id, filename.to_string(), confidence_threshold));
        inner.order.push(id);
        id
    }

    /// Snapshot of the job's current state.
    pub async fn get(&self, id: Uuid) -> Result<DetectionJob, StoreError> {
        self.inner
            .read()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Move a job forward along the state machine, storing the update's payload.
    ///
    /// This is the only way a stored job changes.
    pub async fn transition(
        &self,
        id: Uuid,
        update: JobUpdate,
    ) -> Result<DetectionJob, StoreError> {
        let mut inner = self.inner.write().await;
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        let next = update.status();
        if !job.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                id,
                from: job.status,
                to: next,
            });
        }

        job.apply(update);
        Ok(job.clone())
    }

    /// All jobs in creation order, without result payloads.
    pub async fn list(&self) -> Vec<JobSummary> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .map(DetectionJob::summary)
            .collect()
    }

    pub async fn counts(&self) -> StatusCounts {
        let inner = self.inner.read().await;
        let mut counts = StatusCounts::default();
        for job in inner.jobs.values() {
            counts.record(job.status);
        }
        counts
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::detection::{DetectionResult, DetectionSummary};
    use std::collections::HashSet;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn empty_summary() -> DetectionSummary {
        DetectionSummary::from_result(DetectionResult::default(), 0.5)
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = JobStore::new();
        let id = store.create("20240101_120000_000_cat.jpg", 0.6).await;

        let job = assert_ok!(store.get(id).await);
        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.confidence_threshold, 0.6);
        assert!(job.result.is_none());
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let store = JobStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(store.get(missing).await, Err(StoreError::NotFound(id)) if id == missing));
        assert!(matches!(
            store.transition(missing, JobUpdate::Processing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let store = JobStore::new();
        let id = store.create("a.png", 0.5).await;

        let processing = assert_ok!(store.transition(id, JobUpdate::Processing).await);
        assert_eq!(processing.status, JobStatus::Processing);
        assert!(processing.result.is_none());

        let done = assert_ok!(store.transition(id, JobUpdate::Completed(empty_summary())).await);
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.result.is_some());
        assert!(done.error_message.is_none());
        assert_eq!(done.confidence_threshold, 0.5);
    }

    #[tokio::test]
    async fn test_rejects_skipping_processing() {
        let store = JobStore::new();
        let id = store.create("a.png", 0.5).await;

        let err = assert_err!(store.transition(id, JobUpdate::Completed(empty_summary())).await);
        assert!(matches!(
            err,
            StoreError::InvalidTransition { from: JobStatus::Queued, to: JobStatus::Completed, .. }
        ));
        assert_eq!(store.get(id).await.unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let store = JobStore::new();
        let id = store.create("a.png", 0.5).await;
        store.transition(id, JobUpdate::Processing).await.unwrap();
        store.transition(id, JobUpdate::Failed("model crashed".into())).await.unwrap();

        assert_err!(store.transition(id, JobUpdate::Processing).await);
        assert_err!(store.transition(id, JobUpdate::Completed(empty_summary())).await);
        assert_err!(store.transition(id, JobUpdate::Failed("again".into())).await);

        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error_message.as_deref(), Some("model crashed"));
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let store = JobStore::new();
        let first = store.create("1.jpg", 0.5).await;
        let second = store.create("2.jpg", 0.5).await;
        let third = store.create("3.jpg", 0.5).await;
        store.transition(second, JobUpdate::Processing).await.unwrap();

        let listed: Vec<Uuid> = store.list().await.iter().map(|s| s.job_id).collect();
        assert_eq!(listed, vec![first, second, third]);

        let counts = store.counts().await;
        assert_eq!(counts.queued, 2);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_are_distinct() {
        let store = Arc::new(JobStore::new());
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.create(&format!("{i}.jpg"), 0.5).await })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 50);
        assert_eq!(store.list().await.len(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_transitions_apply_once() {
        let store = Arc::new(JobStore::new());
        let id = store.create("a.png", 0.5).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(
                    async move { store.transition(id, JobUpdate::Processing).await.is_ok() },
                )
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
