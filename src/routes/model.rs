use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::ModelInfoResponse;
use crate::routes::ApiError;

/// GET /api/model/info — metadata of the loaded detection model.
pub async fn model_info(
    State(state): State<AppState>,
) -> Result<Json<ModelInfoResponse>, ApiError> {
    let info = state.detector.model_info().ok_or(ApiError::ModelUnavailable)?;
    Ok(Json(ModelInfoResponse {
        model_loaded: true,
        supported_classes: info.supported_classes(),
        model_info: info,
    }))
}
