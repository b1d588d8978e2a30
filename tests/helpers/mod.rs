//! Test helpers: an in-process server backed by a scripted detector

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde_json::Value;
use tempfile::TempDir;
use tokio::time::sleep;

use detection_orchestrator::app_state::AppState;
use detection_orchestrator::models::detection::{
    BoundingBox, Detection, DetectionResult, ModelInfo,
};
use detection_orchestrator::services::detector::{Detector, DetectorError};
use detection_orchestrator::services::dispatcher::DispatchSettings;
use detection_orchestrator::services::storage::StorageManager;

use crate::fixtures::{BOTTLE_DETECTIONS, BROKEN_MARKER, EMPTY_MARKER, MODEL_CLASSES};

/// Detector whose output depends on markers in the stored file name.
pub struct ScriptedDetector {
    pub available: bool,
    pub delay: Duration,
}

impl ScriptedDetector {
    pub fn ready() -> Self {
        Self {
            available: true,
            delay: Duration::from_millis(20),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            available: true,
            delay,
        }
    }

    pub fn unloaded() -> Self {
        Self {
            available: false,
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    fn is_available(&self) -> bool {
        self.available
    }

    fn model_info(&self) -> Option<ModelInfo> {
        self.available.then(|| ModelInfo {
            model_path: "weights/best.onnx".to_string(),
            model_names: MODEL_CLASSES
                .iter()
                .enumerate()
                .map(|(i, name)| (i as u32, name.to_string()))
                .collect::<BTreeMap<_, _>>(),
            num_classes: MODEL_CLASSES.len(),
        })
    }

    async fn detect(
        &self,
        image_path: &Path,
        _confidence_threshold: f64,
        _target_size: u32,
    ) -> Result<DetectionResult, DetectorError> {
        sleep(self.delay).await;

        if !image_path.exists() {
            return Err(DetectorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "image missing",
            )));
        }

        let name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.contains(BROKEN_MARKER) {
            return Err(DetectorError::Inference("corrupt image data".to_string()));
        }
        if name.contains(EMPTY_MARKER) {
            return Ok(DetectionResult::default());
        }

        Ok(DetectionResult {
            detections: BOTTLE_DETECTIONS
                .iter()
                .map(|(label, confidence)| Detection {
                    label: label.to_string(),
                    confidence: *confidence,
                    bbox: BoundingBox([12.0, 30.0, 96.0, 210.0]),
                })
                .collect(),
        })
    }
}

/// A running server on an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub upload_dir: TempDir,
}

pub async fn spawn_server(detector: ScriptedDetector) -> TestServer {
    spawn_server_with(detector, DispatchSettings::default()).await
}

pub async fn spawn_server_with(
    detector: ScriptedDetector,
    settings: DispatchSettings,
) -> TestServer {
    let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");
    let storage = StorageManager::new(upload_dir.path()).expect("Failed to open storage");
    let state = AppState::new(storage, Arc::new(detector), settings, 256);
    let app = detection_orchestrator::router(state, 16 * 1024 * 1024);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    TestServer {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        upload_dir,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST /api/upload with an `image` part and optional `confidence` field.
    pub async fn upload(
        &self,
        filename: &str,
        bytes: &[u8],
        confidence: Option<&str>,
    ) -> reqwest::Response {
        let mut form = multipart::Form::new().part(
            "image",
            multipart::Part::bytes(bytes.to_vec()).file_name(filename.to_string()),
        );
        if let Some(c) = confidence {
            form = form.text("confidence", c.to_string());
        }

        self.client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// Upload and return the new job id, asserting success.
    pub async fn upload_ok(
        &self,
        filename: &str,
        bytes: &[u8],
        confidence: Option<&str>,
    ) -> String {
        let response = self.upload(filename, bytes, confidence).await;
        assert_eq!(response.status(), 200, "upload of {} failed", filename);
        let body: Value = response.json().await.expect("Invalid upload response");
        body["job_id"].as_str().expect("No job_id").to_string()
    }

    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed");
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// Poll a job until it reaches `completed` or `error`.
    pub async fn wait_for_job(&self, job_id: &str) -> Value {
        for _ in 0..400 {
            let (status, body) = self.get_json(&format!("/api/result/{}", job_id)).await;
            assert_eq!(status, 200, "job {} disappeared", job_id);
            match body["status"].as_str() {
                Some("completed") | Some("error") => return body,
                Some("queued") | Some("processing") => sleep(Duration::from_millis(25)).await,
                other => panic!("Unknown job status: {:?}", other),
            }
        }
        panic!("Job {} did not finish in time", job_id);
    }
}

/// Position of a status along the job state machine.
pub fn status_rank(status: &str) -> u8 {
    match status {
        "queued" => 0,
        "processing" => 1,
        "completed" | "error" => 2,
        other => panic!("Unknown job status: {}", other),
    }
}
