use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use validator::Validate;

/// JSON body that is also validated. Rejections are JSON with the same
/// `{message, status}` shape as every other API error.
pub struct ValidJson<T>(pub T);

fn reject(status: StatusCode, message: String) -> Response {
    tracing::warn!("{}", message);
    (
        status,
        Json(json!({
            "message": message,
            "status": status.as_u16()
        })),
    )
        .into_response()
}

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: serde::de::DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            reject(
                StatusCode::BAD_REQUEST,
                format!("Failed to parse JSON request body: {}", rejection),
            )
        })?;

        value.validate().map_err(|e| {
            reject(
                StatusCode::BAD_REQUEST,
                format!("Validation error: {}", e),
            )
        })?;

        Ok(ValidJson(value))
    }
}
