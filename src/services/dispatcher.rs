use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::models::detection::DetectionSummary;
use crate::models::job::JobUpdate;
use crate::services::detector::Detector;
use crate::services::job_store::JobStore;
use crate::services::storage::StorageManager;

/// Input size passed to the detector unless configured otherwise.
pub const DEFAULT_TARGET_SIZE: u32 = 640;

/// Worker pool settings.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub workers: usize,
    pub detection_timeout: Duration,
    pub target_size: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            detection_timeout: Duration::from_secs(120),
            target_size: DEFAULT_TARGET_SIZE,
        }
    }
}

struct WorkerContext {
    store: Arc<JobStore>,
    detector: Arc<dyn Detector>,
    storage: Arc<StorageManager>,
    settings: DispatchSettings,
    backlog: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
}

/// Runs queued jobs through the detector on a fixed pool of worker tasks.
///
/// At most `settings.workers` detections run at once; further jobs wait in the queue
/// and stay `Queued` until a worker picks them up. Failed detections are recorded on
/// the job and never retried.
#[derive(Clone)]
pub struct DetectionDispatcher {
    sender: mpsc::UnboundedSender<Uuid>,
    backlog: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    workers: usize,
}

impl DetectionDispatcher {
    /// Spawn the worker pool on the current runtime.
    pub fn start(
        store: Arc<JobStore>,
        detector: Arc<dyn Detector>,
        storage: Arc<StorageManager>,
        settings: DispatchSettings,
    ) -> Self {
        let workers = settings.workers.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let backlog = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let context = Arc::new(WorkerContext {
            store,
            detector,
            storage,
            settings,
            backlog: backlog.clone(),
            in_flight: in_flight.clone(),
        });

        for worker_id in 0..workers {
            let context = context.clone();
            let receiver = receiver.clone();
            tokio::spawn(async move {
                tracing::debug!(worker_id, "Detection worker started");
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(job_id) = next else { break };
                    context.backlog.fetch_sub(1, Ordering::SeqCst);
                    metrics::gauge!("detection_queue_depth")
                        .set(context.backlog.load(Ordering::SeqCst) as f64);
                    run_job(&context, job_id).await;
                }
                tracing::debug!(worker_id, "Detection worker stopped");
            });
        }

        tracing::info!(
            workers,
            timeout_secs = settings.detection_timeout.as_secs(),
            "Detection worker pool started"
        );

        Self {
            sender,
            backlog,
            in_flight,
            workers,
        }
    }

    /// Reserve a place in the queue unless `limit` jobs are already waiting.
    ///
    /// The place is held from before the upload is stored until the job is queued;
    /// dropping the slot without dispatching gives it back.
    pub fn try_reserve(&self, limit: usize) -> Result<BacklogSlot, DispatchError> {
        self.backlog
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |waiting| {
                (waiting < limit).then_some(waiting + 1)
            })
            .map_err(|_| DispatchError::QueueFull(limit))?;
        Ok(BacklogSlot {
            dispatcher: self.clone(),
            armed: true,
        })
    }

    /// Queue a job for detection without waiting for it to run.
    pub fn dispatch(&self, job_id: Uuid) -> Result<(), DispatchError> {
        self.backlog.fetch_add(1, Ordering::SeqCst);
        BacklogSlot {
            dispatcher: self.clone(),
            armed: true,
        }
        .dispatch(job_id)
    }

    /// Jobs waiting for a free worker.
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::SeqCst)
    }

    /// Detections currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

/// A reserved place in the detection queue.
pub struct BacklogSlot {
    dispatcher: DetectionDispatcher,
    armed: bool,
}

impl BacklogSlot {
    /// Hand `job_id` to the worker pool, using this slot.
    pub fn dispatch(mut self, job_id: Uuid) -> Result<(), DispatchError> {
        if self.dispatcher.sender.send(job_id).is_err() {
            return Err(DispatchError::Stopped(job_id));
        }
        self.armed = false;
        metrics::gauge!("detection_queue_depth").set(self.dispatcher.backlog() as f64);
        Ok(())
    }
}

impl Drop for BacklogSlot {
    fn drop(&mut self) {
        if self.armed {
            self.dispatcher.backlog.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

async fn run_job(context: &WorkerContext, job_id: Uuid) {
    let job = match context.store.transition(job_id, JobUpdate::Processing).await {
        Ok(job) => job,
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Skipping job that cannot start");
            return;
        }
    };

    tracing::info!(job_id = %job_id, filename = %job.filename, "Starting detection");
    context.in_flight.fetch_add(1, Ordering::SeqCst);
    let started = Instant::now();

    let update = detect(context, job.filename.as_str(), job.confidence_threshold).await;

    context.in_flight.fetch_sub(1, Ordering::SeqCst);
    metrics::histogram!("detection_processing_seconds").record(started.elapsed().as_secs_f64());

    match &update {
        JobUpdate::Completed(summary) => {
            metrics::counter!("detection_jobs_completed").increment(1);
            tracing::info!(
                job_id = %job_id,
                total_objects = summary.total_objects,
                unique_labels = ?summary.unique_labels,
                "Detection completed"
            );
        }
        JobUpdate::Failed(message) => {
            metrics::counter!("detection_jobs_failed").increment(1);
            tracing::error!(job_id = %job_id, error = %message, "Detection failed");
        }
        JobUpdate::Processing => {}
    }

    if let Err(e) = context.store.transition(job_id, update).await {
        tracing::error!(job_id = %job_id, error = %e, "Failed to record detection outcome");
    }
}

async fn detect(context: &WorkerContext, filename: &str, confidence_threshold: f64) -> JobUpdate {
    let detector = context.detector.clone();
    let image_path = context.storage.path_for(filename);
    let target_size = context.settings.target_size;
    let timeout = context.settings.detection_timeout;

    let mut task = tokio::spawn(async move {
        detector
            .detect(&image_path, confidence_threshold, target_size)
            .await
    });

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(Ok(result))) => {
            JobUpdate::Completed(DetectionSummary::from_result(result, confidence_threshold))
        }
        Ok(Ok(Err(e))) => JobUpdate::Failed(e.to_string()),
        Ok(Err(join_error)) => JobUpdate::Failed(format!("Detector panicked: {}", join_error)),
        Err(_) => {
            // A detector that blocks ignores the abort; keep the worker until it returns.
            task.abort();
            let _ = (&mut task).await;
            JobUpdate::Failed(format!(
                "Detection timed out after {}s",
                timeout.as_secs_f64()
            ))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Detection workers have stopped; job {0} was not queued")]
    Stopped(Uuid),

    #[error("Detection queue is full ({0} jobs waiting)")]
    QueueFull(usize),
}
