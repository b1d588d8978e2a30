use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::UploadResponse;
use crate::routes::ApiError;

/// POST /api/upload — submit an image (`image` field, optional `confidence` field).
pub async fn submit_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut original_name = String::new();
    let mut image_data = Bytes::new();
    let mut confidence: Option<f64> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => {
                original_name = field.file_name().unwrap_or_default().to_string();
                image_data = field.bytes().await?;
            }
            Some("confidence") => {
                // Unparseable values fall back to the default threshold.
                confidence = field.text().await?.trim().parse().ok();
            }
            _ => {}
        }
    }

    let accepted = state
        .intake
        .accept(&image_data, &original_name, confidence)
        .await?;

    Ok(Json(UploadResponse {
        status: "success".to_string(),
        message: "File uploaded, detection started".to_string(),
        job_id: accepted.job_id,
        filename: accepted.filename,
        confidence_threshold: accepted.confidence_threshold,
    }))
}
