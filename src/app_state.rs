use std::sync::Arc;

use crate::services::{
    detector::Detector,
    dispatcher::{DetectionDispatcher, DispatchSettings},
    intake::UploadIntake,
    job_store::JobStore,
    reader::ResultReader,
    storage::StorageManager,
};

/// Shared application state passed to all route handlers.
///
/// Owns the single [`JobStore`] for the life of the process.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub storage: Arc<StorageManager>,
    pub detector: Arc<dyn Detector>,
    pub dispatcher: DetectionDispatcher,
    pub intake: Arc<UploadIntake>,
    pub reader: ResultReader,
}

impl AppState {
    /// Wire the core together and start the detection worker pool.
    pub fn new(
        storage: StorageManager,
        detector: Arc<dyn Detector>,
        settings: DispatchSettings,
        max_queued_jobs: usize,
    ) -> Self {
        let jobs = Arc::new(JobStore::new());
        let storage = Arc::new(storage);
        let dispatcher =
            DetectionDispatcher::start(jobs.clone(), detector.clone(), storage.clone(), settings);
        let intake = UploadIntake::new(
            jobs.clone(),
            storage.clone(),
            detector.clone(),
            dispatcher.clone(),
            max_queued_jobs,
        );

        Self {
            reader: ResultReader::new(jobs.clone()),
            intake: Arc::new(intake),
            jobs,
            storage,
            detector,
            dispatcher,
        }
    }
}
