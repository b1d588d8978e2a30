use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::detection::{BoundingBox, Detection, DetectionResult, ModelInfo};

/// Object-detection capability consumed by the dispatcher.
///
/// Whether `detect` may run concurrently is up to the implementation; callers only
/// bound how many invocations they start.
#[async_trait]
pub trait Detector: Send + Sync {
    /// True once a model is loaded and detections can be served.
    fn is_available(&self) -> bool;

    fn model_info(&self) -> Option<ModelInfo>;

    async fn detect(
        &self,
        image_path: &Path,
        confidence_threshold: f64,
        target_size: u32,
    ) -> Result<DetectionResult, DetectorError>;
}

/// Client for an HTTP inference sidecar serving the detection model.
pub struct RemoteDetector {
    http: Client,
    base_url: String,
    info: Option<ModelInfo>,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    image: String,
    mime_type: &'a str,
    conf: f64,
    imgsz: u32,
}

#[derive(Deserialize)]
struct DetectResponse {
    detections: Vec<RawDetection>,
}

#[derive(Deserialize)]
struct RawDetection {
    label: String,
    confidence: f64,
    bbox: [f64; 4],
}

impl RemoteDetector {
    /// Connect to the sidecar and load its model metadata.
    ///
    /// A sidecar that cannot be reached leaves the detector unavailable rather than
    /// failing startup.
    pub async fn connect(base_url: &str, request_timeout: Duration) -> Result<Self, DetectorError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(DetectorError::Http)?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let info = match fetch_model_info(&http, &base_url).await {
            Ok(info) => {
                tracing::info!(
                    model_path = %info.model_path,
                    num_classes = info.num_classes,
                    classes = ?info.supported_classes(),
                    "Detection model loaded"
                );
                Some(info)
            }
            Err(e) => {
                tracing::warn!(url = %base_url, error = %e, "Detection model not available");
                None
            }
        };

        Ok(Self { http, base_url, info })
    }

    /// A detector with no backing model; every upload is refused.
    pub fn unavailable() -> Self {
        Self {
            http: Client::new(),
            base_url: String::new(),
            info: None,
        }
    }
}

async fn fetch_model_info(http: &Client, base_url: &str) -> Result<ModelInfo, DetectorError> {
    let response = http
        .get(format!("{}/info", base_url))
        .send()
        .await
        .map_err(DetectorError::Http)?
        .error_for_status()
        .map_err(DetectorError::Http)?;
    response.json().await.map_err(DetectorError::Http)
}

#[async_trait]
impl Detector for RemoteDetector {
    fn is_available(&self) -> bool {
        self.info.is_some()
    }

    fn model_info(&self) -> Option<ModelInfo> {
        self.info.clone()
    }

    async fn detect(
        &self,
        image_path: &Path,
        confidence_threshold: f64,
        target_size: u32,
    ) -> Result<DetectionResult, DetectorError> {
        if !self.is_available() {
            return Err(DetectorError::Unavailable);
        }

        let bytes = tokio::fs::read(image_path).await.map_err(DetectorError::Io)?;
        let format = image::guess_format(&bytes).map_err(DetectorError::CorruptImage)?;

        let request = DetectRequest {
            image: base64::engine::general_purpose::STANDARD.encode(&bytes),
            mime_type: format.to_mime_type(),
            conf: confidence_threshold,
            imgsz: target_size,
        };

        let response = self
            .http
            .post(format!("{}/detect", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(DetectorError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectorError::Inference(format!("{}: {}", status, body)));
        }

        let parsed: DetectResponse = response.json().await.map_err(DetectorError::Http)?;

        Ok(DetectionResult {
            detections: parsed
                .detections
                .into_iter()
                .map(|d| Detection {
                    label: d.label,
                    confidence: d.confidence,
                    bbox: BoundingBox(d.bbox),
                })
                .collect(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("Detection model is not loaded")]
    Unavailable,

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image could not be decoded: {0}")]
    CorruptImage(#[from] image::ImageError),

    #[error("Detector request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Inference failed: {0}")]
    Inference(String),
}
