use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use super::ApiError;
use crate::extractors::ValidJson;
use crate::metrics::RECOGNITION_REQUESTS_TOTAL;
use crate::models::recognition::RecognizeRequest;
use crate::services::AppState;

/// POST /recognize - forwards an ink image to Mathpix.
pub async fn recognize(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<RecognizeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mathpix = state.mathpix.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("Handwriting recognition is not configured".to_string())
    })?;

    match mathpix.recognize(&req.image_base64).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            RECOGNITION_REQUESTS_TOTAL
                .with_label_values(&["upstream_error"])
                .inc();
            tracing::error!("Mathpix recognition failed: {:#}", e);
            Err(ApiError::BadGateway(
                "Handwriting recognition failed".to_string(),
            ))
        }
    }
}
