//! Canned uploads and detector output used by the API tests

/// Smallest byte prefix the detector stub needs; real decoding is never attempted.
pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

pub const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];

/// Detections returned for every image whose name carries no special marker.
pub const BOTTLE_DETECTIONS: &[(&str, f64)] = &[("botol", 0.81), ("botol", 0.77)];

/// Class names reported by the stub model.
pub const MODEL_CLASSES: &[&str] = &["botol", "kaleng"];

/// Uploaded names containing this marker make the stub detector fail.
pub const BROKEN_MARKER: &str = "broken";

/// Uploaded names containing this marker produce no detections.
pub const EMPTY_MARKER: &str = "empty";
