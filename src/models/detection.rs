use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Axis-aligned box in source image pixels: `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox(pub [f64; 4]);

/// A single object found by the detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Raw output of one detector invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
}

/// Immutable snapshot of a completed detection, stored on the job.
///
/// `labels` and `confidences` are index-aligned: entry `i` of one belongs to entry `i`
/// of the other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionSummary {
    pub labels: Vec<String>,
    pub confidences: Vec<f64>,
    pub boxes: Vec<BoundingBox>,
    pub unique_labels: Vec<String>,
    pub total_objects: usize,
    pub average_confidence: f64,
}

impl DetectionSummary {
    /// Build the summary from detector output, keeping only detections at or above
    /// `confidence_threshold`.
    pub fn from_result(result: DetectionResult, confidence_threshold: f64) -> Self {
        let kept: Vec<Detection> = result
            .detections
            .into_iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .collect();

        let mut seen = HashSet::new();
        let unique_labels = kept
            .iter()
            .filter(|d| seen.insert(d.label.as_str()))
            .map(|d| d.label.clone())
            .collect();

        let confidences: Vec<f64> = kept.iter().map(|d| d.confidence).collect();
        let average_confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        Self {
            labels: kept.iter().map(|d| d.label.clone()).collect(),
            boxes: kept.iter().map(|d| d.bbox).collect(),
            total_objects: kept.len(),
            confidences,
            unique_labels,
            average_confidence,
        }
    }

    pub fn unique_objects(&self) -> usize {
        self.unique_labels.len()
    }
}

/// Metadata describing the loaded detection model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub model_path: String,
    pub model_names: BTreeMap<u32, String>,
    pub num_classes: usize,
}

impl ModelInfo {
    pub fn supported_classes(&self) -> Vec<String> {
        self.model_names.values().cloned().collect()
    }
}
