use std::time::Duration;

use serde::Deserialize;

use crate::services::dispatcher::DispatchSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:5000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory holding uploaded images
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Base URL of the inference sidecar. Unset means no model is loaded.
    #[serde(default)]
    pub detector_url: Option<String>,

    /// Number of detections allowed to run at once
    #[serde(default = "default_detection_workers")]
    pub detection_workers: usize,

    /// Upper bound on a single detection before the job is failed
    #[serde(default = "default_detection_timeout_secs")]
    pub detection_timeout_secs: u64,

    /// Jobs allowed to wait for a worker before uploads are refused
    #[serde(default = "default_max_queued_jobs")]
    pub max_queued_jobs: usize,

    /// Request body limit for uploads, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Square input size passed to the detector
    #[serde(default = "default_target_size")]
    pub target_size: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_detection_workers() -> usize {
    2
}

fn default_detection_timeout_secs() -> u64 {
    120
}

fn default_max_queued_jobs() -> usize {
    256
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_target_size() -> u32 {
    640
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            workers: self.detection_workers,
            detection_timeout: Duration::from_secs(self.detection_timeout_secs),
            target_size: self.target_size,
        }
    }
}
